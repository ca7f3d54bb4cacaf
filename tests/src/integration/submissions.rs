//! # Author Port Scenarios
//!
//! An author connects, hands over a VOEvent and waits for the verdict:
//!
//! ```text
//! author ──handshake──→ relay
//! author ──VOEvent───→ relay ──→ dedup ──→ handlers ──→ fan-out
//! author ←──ack/nak─── relay
//! ```

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::Arc;

    use relay_runtime::adapters::RegistrationObserver;
    use relay_runtime::listener::Listener;
    use relay_runtime::{RelayConfig, RelayNode};
    use shared_types::{AckToken, Event, EventRole, Ivorn, PeerRole};
    use tokio::sync::watch;
    use vr_01_transport::domain::wire::AckStatus;
    use vr_01_transport::{AllowAllPeers, SessionConfig, SessionContext, SessionRole};
    use vr_02_dedup::{DedupConfig, DuplicateFilter};
    use vr_03_routing::{
        EventHandler, FaultPolicy, HandlerError, HandlerPipeline, HandlerVerdict, Router,
        SubscriptionRegistry,
    };

    use crate::integration::support::{eventually, refused, TestPeer, PATIENCE, QUIET};

    const AUTHOR: &str = "ivo://author.test/client";

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    async fn relay() -> RelayNode {
        RelayNode::start(RelayConfig::for_testing()).await.unwrap()
    }

    async fn author(node: &RelayNode) -> TestPeer {
        TestPeer::connect(node.author_addr().unwrap(), AUTHOR, PeerRole::Author)
            .await
            .unwrap()
    }

    /// Refuses anything marked as a test event.
    struct NoTestEvents;

    impl EventHandler for NoTestEvents {
        fn name(&self) -> &str {
            "no-test-events"
        }

        fn handle(&self, event: &Event) -> Result<HandlerVerdict, HandlerError> {
            if event.role() == EventRole::Test {
                return Ok(HandlerVerdict::Reject("test events are not relayed".into()));
            }
            Ok(HandlerVerdict::Accept)
        }
    }

    /// An author listener whose pipeline vetoes test events.
    async fn vetoing_listener() -> (SocketAddr, watch::Sender<bool>) {
        let registry = Arc::new(SubscriptionRegistry::default());
        let router = Arc::new(Router::new(
            Arc::new(DuplicateFilter::new(DedupConfig::default())),
            HandlerPipeline::new().with_handler(Arc::new(NoTestEvents), FaultPolicy::Continue),
            Arc::clone(&registry),
        ));
        let ctx = Arc::new(SessionContext {
            local_identity: "ivo://veto.test/broker".to_string(),
            config: SessionConfig::for_testing(),
            sink: router,
            authorizer: Arc::new(AllowAllPeers),
            observer: Arc::new(RegistrationObserver::new(registry, None)),
        });

        let listener = Listener::bind(
            SocketAddr::from(([127, 0, 0, 1], 0)),
            SessionRole::AuthorServer,
            None,
            ctx,
        )
        .await
        .unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = watch::channel(false);
        tokio::spawn(listener.run(rx));
        (addr, tx)
    }

    // =========================================================================
    // ACKNOWLEDGEMENTS
    // =========================================================================

    #[tokio::test]
    async fn test_new_event_is_acked_as_forwarded() {
        let node = relay().await;
        let mut author = author(&node).await;
        assert_eq!(author.remote().origin, node.config().local_ivo);
        assert_eq!(author.remote().role, PeerRole::Broker);

        let ivorn = "ivo://author.test/grb#1";
        let ack = author.publish(ivorn, "observation").await.unwrap();

        assert_eq!(ack.status, AckStatus::Ack);
        assert_eq!(ack.reason.as_deref(), Some("forwarded"));
        assert_eq!(ack.token, AckToken::for_ivorn(&Ivorn::new(ivorn).unwrap()));
        assert_eq!(ack.origin, node.config().local_ivo);
        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_resubmission_is_acked_as_duplicate() {
        let node = relay().await;
        let mut first = author(&node).await;
        let mut second = author(&node).await;

        let ivorn = "ivo://author.test/grb#2";
        let ack = first.publish(ivorn, "observation").await.unwrap();
        assert_eq!(ack.reason.as_deref(), Some("forwarded"));

        // Same ivorn from a different session is still the same event.
        let ack = second.publish(ivorn, "observation").await.unwrap();
        assert_eq!(ack.status, AckStatus::Ack);
        assert_eq!(ack.reason.as_deref(), Some("duplicate"));
        assert_eq!(node.router().duplicate_filter().len(), 1);
        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_vetoed_event_is_naked_with_reason() {
        let (addr, shutdown) = vetoing_listener().await;
        let mut author = TestPeer::connect(addr, AUTHOR, PeerRole::Author)
            .await
            .unwrap();

        let ack = author.publish("ivo://author.test/drill#1", "test").await.unwrap();
        assert_eq!(ack.status, AckStatus::Nak);
        assert_eq!(ack.reason.as_deref(), Some("test events are not relayed"));

        let ack = author
            .publish("ivo://author.test/grb#3", "observation")
            .await
            .unwrap();
        assert_eq!(ack.status, AckStatus::Ack);

        // The vetoed ivorn was still seen.
        let ack = author.publish("ivo://author.test/drill#1", "test").await.unwrap();
        assert_eq!(ack.reason.as_deref(), Some("duplicate"));

        shutdown.send(true).unwrap();
    }

    // =========================================================================
    // MALFORMED INPUT
    // =========================================================================

    #[tokio::test]
    async fn test_malformed_frame_is_naked_and_session_survives() {
        let node = relay().await;
        let mut author = author(&node).await;

        author.send_raw("<VOEvent role=\"observation\"").await.unwrap();
        let ack = author.next_ack().await.unwrap();
        assert_eq!(ack.status, AckStatus::Nak);
        assert!(ack.reason.is_some());

        let ack = author
            .publish("ivo://author.test/grb#4", "observation")
            .await
            .unwrap();
        assert_eq!(ack.status, AckStatus::Ack);
        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_streak_of_malformed_frames_ends_session() {
        let node = relay().await;
        let mut author = author(&node).await;
        let limit = node.config().session.max_consecutive_malformed;

        for _ in 0..limit {
            author.send_raw("not xml at all").await.unwrap();
        }
        for _ in 0..limit {
            let ack = author.next_ack().await.unwrap();
            assert_eq!(ack.status, AckStatus::Nak);
        }
        assert!(author.closed_within(PATIENCE).await);
        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_event_without_ivorn_is_naked() {
        let node = relay().await;
        let mut author = author(&node).await;

        author
            .send_raw(r#"<VOEvent role="observation"><What/></VOEvent>"#)
            .await
            .unwrap();
        let ack = author.next_ack().await.unwrap();
        assert_eq!(ack.status, AckStatus::Nak);
        assert!(node.router().duplicate_filter().is_empty());
        node.shutdown().await;
    }

    // =========================================================================
    // ADMISSION
    // =========================================================================

    #[tokio::test]
    async fn test_address_outside_whitelist_is_refused() {
        let mut config = RelayConfig::for_testing();
        config.network.whitelist = vec!["10.0.0.0/8".to_string()];
        let node = RelayNode::start(config).await.unwrap();

        assert!(refused(node.author_addr().unwrap()).await);
        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_unlisted_identity_is_dropped_after_handshake() {
        let mut config = RelayConfig::for_testing();
        config.network.allowed_identities = vec!["ivo://trusted.test/author".to_string()];
        let node = RelayNode::start(config).await.unwrap();

        let mut stranger = author(&node).await;
        assert!(stranger.closed_within(PATIENCE).await);

        let mut trusted = TestPeer::connect(
            node.author_addr().unwrap(),
            "ivo://trusted.test/author",
            PeerRole::Author,
        )
        .await
        .unwrap();
        let ack = trusted
            .publish("ivo://trusted.test/grb#1", "observation")
            .await
            .unwrap();
        assert_eq!(ack.status, AckStatus::Ack);
        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_subscriber_role_is_refused_on_author_port() {
        let node = relay().await;
        let mut peer = TestPeer::connect(
            node.author_addr().unwrap(),
            "ivo://reader.test/client",
            PeerRole::Subscriber,
        )
        .await
        .unwrap();

        assert!(peer.closed_within(PATIENCE).await);
        assert!(peer.next_frame(QUIET).await.is_none());
        node.shutdown().await;
    }

    // =========================================================================
    // LOCAL HANDLERS
    // =========================================================================

    #[tokio::test]
    async fn test_accepted_event_is_saved_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RelayConfig::for_testing();
        config.handlers.save_directory = Some(dir.path().to_path_buf());
        let node = RelayNode::start(config).await.unwrap();
        let mut author = author(&node).await;

        let ack = author
            .publish("ivo://author.test/grb#5", "observation")
            .await
            .unwrap();
        assert_eq!(ack.status, AckStatus::Ack);

        let saved = dir.path().join("ivo__author.test_grb5");
        assert!(eventually(PATIENCE, || saved.exists()).await);
        let body = std::fs::read_to_string(&saved).unwrap();
        assert!(body.contains(r#"ivorn="ivo://author.test/grb#5""#));
        node.shutdown().await;
    }
}
