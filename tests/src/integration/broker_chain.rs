//! # Broker Chain Scenarios
//!
//! Two relays linked by an outbound feed. Events cross the link once and
//! the duplicate filter stops them from coming back around.
//!
//! ```text
//! author ──→ A ══subscribe feed══→ B ──→ reader
//!                                  ↑
//! author ──(same event again)──────┘   acked as duplicate
//! ```

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use relay_runtime::{RelayConfig, RelayNode};
    use shared_types::PeerRole;
    use vr_01_transport::domain::wire::AckStatus;
    use vr_04_supervisor::{FeedConfig, FeedStatus};

    use crate::integration::support::{eventually, TestPeer, PATIENCE, QUIET};

    const AUTHOR: &str = "ivo://author.test/client";

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    fn config(local_ivo: &str) -> RelayConfig {
        let mut config = RelayConfig::for_testing();
        config.local_ivo = local_ivo.to_string();
        config
    }

    async fn start_with_feed(local_ivo: &str, feed: FeedConfig) -> RelayNode {
        let address = feed.address.clone();
        let mut config = config(local_ivo);
        config.feeds = vec![feed];
        let node = RelayNode::start(config).await.unwrap();
        assert!(
            eventually(PATIENCE, || node.feed_status(&address) == Some(FeedStatus::Active)).await,
            "feed to {address} never became active"
        );
        node
    }

    async fn subscribe(node: &RelayNode, identity: &str) -> TestPeer {
        let before = node.registry().len();
        let peer = TestPeer::connect(
            node.subscriber_addr().unwrap(),
            identity,
            PeerRole::Subscriber,
        )
        .await
        .unwrap();
        assert!(eventually(PATIENCE, || node.registry().len() > before).await);
        peer
    }

    async fn author_at(addr: SocketAddr) -> TestPeer {
        TestPeer::connect(addr, AUTHOR, PeerRole::Author).await.unwrap()
    }

    // =========================================================================
    // SUBSCRIBE FEEDS
    // =========================================================================

    #[tokio::test]
    async fn test_event_crosses_chain_once_and_resubmission_is_duplicate() {
        let upstream = RelayNode::start(config("ivo://upstream.test/broker"))
            .await
            .unwrap();
        let downstream = start_with_feed(
            "ivo://downstream.test/broker",
            FeedConfig::subscribe(upstream.subscriber_addr().unwrap().to_string()),
        )
        .await;

        // The downstream relay is the upstream relay's only subscriber.
        assert!(eventually(PATIENCE, || upstream.registry().len() == 1).await);
        let mut reader = subscribe(&downstream, "ivo://reader.test/one").await;

        let ivorn = "ivo://author.test/grb#100";
        let mut upstream_author = author_at(upstream.author_addr().unwrap()).await;
        let ack = upstream_author.publish(ivorn, "observation").await.unwrap();
        assert_eq!(ack.reason.as_deref(), Some("forwarded"));

        let event = reader.next_event(PATIENCE).await.unwrap();
        assert_eq!(event.ivorn.as_str(), ivorn);

        // The same event pushed straight into the downstream relay.
        let mut downstream_author = author_at(downstream.author_addr().unwrap()).await;
        let ack = downstream_author.publish(ivorn, "observation").await.unwrap();
        assert_eq!(ack.status, AckStatus::Ack);
        assert_eq!(ack.reason.as_deref(), Some("duplicate"));

        assert!(reader.drain_events(QUIET).await.is_empty());

        downstream.shutdown().await;
        upstream.shutdown().await;
    }

    #[tokio::test]
    async fn test_event_received_downstream_is_not_sent_back_upstream() {
        let upstream = RelayNode::start(config("ivo://upstream.test/broker"))
            .await
            .unwrap();
        let downstream = start_with_feed(
            "ivo://downstream.test/broker",
            FeedConfig::subscribe(upstream.subscriber_addr().unwrap().to_string()),
        )
        .await;
        assert!(eventually(PATIENCE, || upstream.registry().len() == 1).await);
        let mut upstream_reader = subscribe(&upstream, "ivo://reader.test/up").await;

        let mut author = author_at(downstream.author_addr().unwrap()).await;
        let ack = author
            .publish("ivo://author.test/grb#101", "observation")
            .await
            .unwrap();
        assert_eq!(ack.reason.as_deref(), Some("forwarded"));

        // A subscribe feed only carries events downstream.
        assert!(upstream_reader.drain_events(QUIET).await.is_empty());
        assert!(upstream.router().duplicate_filter().is_empty());

        downstream.shutdown().await;
        upstream.shutdown().await;
    }

    // =========================================================================
    // PUBLISH FEEDS
    // =========================================================================

    #[tokio::test]
    async fn test_publish_feed_pushes_events_upstream() {
        let upstream = RelayNode::start(config("ivo://upstream.test/broker"))
            .await
            .unwrap();
        let mut upstream_reader = subscribe(&upstream, "ivo://reader.test/up").await;
        let downstream = start_with_feed(
            "ivo://downstream.test/broker",
            FeedConfig::publish(upstream.author_addr().unwrap().to_string()),
        )
        .await;

        let ivorn = "ivo://author.test/grb#102";
        let mut author = author_at(downstream.author_addr().unwrap()).await;
        author.publish(ivorn, "observation").await.unwrap();

        let event = upstream_reader.next_event(PATIENCE).await.unwrap();
        assert_eq!(event.ivorn.as_str(), ivorn);
        assert_eq!(upstream.router().duplicate_filter().len(), 1);

        downstream.shutdown().await;
        upstream.shutdown().await;
    }

    // =========================================================================
    // RECONNECTION
    // =========================================================================

    #[tokio::test]
    async fn test_feed_recovers_after_upstream_restart() {
        let first = RelayNode::start(config("ivo://upstream.test/broker"))
            .await
            .unwrap();
        let addr = first.subscriber_addr().unwrap();
        let downstream = start_with_feed(
            "ivo://downstream.test/broker",
            FeedConfig::subscribe(addr.to_string()),
        )
        .await;
        let address = addr.to_string();

        first.shutdown().await;
        assert!(
            eventually(PATIENCE, || {
                matches!(
                    downstream.feed_status(&address),
                    Some(FeedStatus::BackingOff { .. } | FeedStatus::Connecting)
                )
            })
            .await
        );

        // Bring a relay back on the same subscriber port.
        let mut config = config("ivo://upstream.test/broker");
        config.network.subscriber_addr = Some(addr);
        let second = RelayNode::start(config).await.unwrap();

        assert!(
            eventually(PATIENCE, || {
                downstream.feed_status(&address) == Some(FeedStatus::Active)
            })
            .await
        );
        assert!(eventually(PATIENCE, || second.registry().len() == 1).await);

        downstream.shutdown().await;
        second.shutdown().await;
    }
}
