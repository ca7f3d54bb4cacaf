//! # Subscriber Port Scenarios
//!
//! Subscribers connect, are registered once authorized, and receive every
//! forwarded event until their session ends.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use relay_runtime::{RelayConfig, RelayNode};
    use shared_types::{EventRole, PeerRole};

    use crate::integration::support::{eventually, TestPeer, PATIENCE, QUIET};

    const AUTHOR: &str = "ivo://author.test/client";

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

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

    async fn author(node: &RelayNode) -> TestPeer {
        TestPeer::connect(node.author_addr().unwrap(), AUTHOR, PeerRole::Author)
            .await
            .unwrap()
    }

    // =========================================================================
    // DELIVERY
    // =========================================================================

    #[tokio::test]
    async fn test_every_subscriber_receives_events_in_order() {
        let node = RelayNode::start(RelayConfig::for_testing()).await.unwrap();
        let mut first = subscribe(&node, "ivo://reader.test/one").await;
        let mut second = subscribe(&node, "ivo://reader.test/two").await;
        let mut author = author(&node).await;

        let ivorns = [
            "ivo://author.test/grb#1",
            "ivo://author.test/grb#2",
            "ivo://author.test/grb#3",
        ];
        for ivorn in ivorns {
            author.publish(ivorn, "observation").await.unwrap();
        }

        for peer in [&mut first, &mut second] {
            let mut received = Vec::new();
            while received.len() < ivorns.len() {
                let event = peer.next_event(PATIENCE).await.unwrap();
                received.push(event.ivorn.as_str().to_string());
            }
            assert_eq!(received, ivorns);
            assert!(peer.drain_events(QUIET).await.is_empty());
        }
        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_duplicate_submission_is_delivered_once() {
        let node = RelayNode::start(RelayConfig::for_testing()).await.unwrap();
        let mut reader = subscribe(&node, "ivo://reader.test/one").await;
        let mut author = author(&node).await;

        author.publish("ivo://author.test/grb#9", "observation").await.unwrap();
        author.publish("ivo://author.test/grb#9", "observation").await.unwrap();

        let events = reader.drain_events(Duration::from_millis(500)).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].ivorn.as_str(), "ivo://author.test/grb#9");
        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_role_filter_limits_delivery() {
        let mut config = RelayConfig::for_testing();
        config.handlers.subscriber_roles = vec![EventRole::Observation];
        let node = RelayNode::start(config).await.unwrap();
        let mut reader = subscribe(&node, "ivo://reader.test/one").await;
        let mut author = author(&node).await;

        author.publish("ivo://author.test/drill#1", "test").await.unwrap();
        author.publish("ivo://author.test/grb#1", "observation").await.unwrap();

        let events = reader.drain_events(Duration::from_millis(500)).await;
        let ivorns: Vec<&str> = events.iter().map(|e| e.ivorn.as_str()).collect();
        assert_eq!(ivorns, vec!["ivo://author.test/grb#1"]);
        assert_eq!(events[0].role, EventRole::Observation);
        node.shutdown().await;
    }

    // =========================================================================
    // REGISTRATION LIFECYCLE
    // =========================================================================

    #[tokio::test]
    async fn test_disconnected_subscriber_is_unregistered() {
        let node = RelayNode::start(RelayConfig::for_testing()).await.unwrap();
        let reader = subscribe(&node, "ivo://reader.test/one").await;
        assert_eq!(node.registry().len(), 1);

        drop(reader);
        assert!(eventually(PATIENCE, || node.registry().is_empty()).await);
        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_silent_subscriber_is_dropped_after_idle_timeout() {
        let mut config = RelayConfig::for_testing();
        config.session.idle_timeout = Duration::from_millis(400);
        config.session.keepalive_interval = Duration::from_millis(100);
        let node = RelayNode::start(config).await.unwrap();

        // Never reads, so keep-alive probes go unanswered.
        let _silent = subscribe(&node, "ivo://reader.test/silent").await;
        assert_eq!(node.registry().len(), 1);

        assert!(eventually(PATIENCE, || node.registry().is_empty()).await);
        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_responsive_subscriber_outlives_idle_timeout() {
        let mut config = RelayConfig::for_testing();
        config.session.idle_timeout = Duration::from_millis(400);
        config.session.keepalive_interval = Duration::from_millis(100);
        let node = RelayNode::start(config).await.unwrap();
        let mut reader = subscribe(&node, "ivo://reader.test/one").await;

        // drain_events answers every probe it sees.
        assert!(reader.drain_events(Duration::from_millis(1200)).await.is_empty());
        assert_eq!(node.registry().len(), 1);
        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_closes_subscriber_sessions() {
        let node = RelayNode::start(RelayConfig::for_testing()).await.unwrap();
        let mut reader = subscribe(&node, "ivo://reader.test/one").await;

        let stopping = tokio::spawn(node.shutdown());
        assert!(reader.closed_within(PATIENCE).await);
        stopping.await.unwrap();
    }
}
