use std::sync::Arc;

use shared_types::{SessionId, SubscriberLink};
use tracing::debug;
use vr_01_transport::{PeerIdentity, SessionObserver, SessionRole, SessionState};
use vr_03_routing::{EventFilter, SubscriptionRegistry};

/// Registers every authorized session that sends events and removes it
/// again when the session ends.
pub struct RegistrationObserver {
    registry: Arc<SubscriptionRegistry>,
    /// Applied to downstream subscribers only, not to publish feeds.
    subscriber_filter: Option<Arc<dyn EventFilter>>,
}

impl RegistrationObserver {
    pub fn new(
        registry: Arc<SubscriptionRegistry>,
        subscriber_filter: Option<Arc<dyn EventFilter>>,
    ) -> Self {
        Self {
            registry,
            subscriber_filter,
        }
    }
}

impl SessionObserver for RegistrationObserver {
    fn on_authorized(&self, link: Arc<dyn SubscriberLink>, role: SessionRole, peer: &PeerIdentity) {
        if !role.sends_events() {
            return;
        }
        let filter = match role {
            SessionRole::SubscriberServer => self.subscriber_filter.clone(),
            _ => None,
        };
        if self.registry.register(&link, filter) {
            debug!(session = %link.session_id(), role = %role, peer = %peer.origin, "subscriber added");
        }
    }

    fn on_terminated(&self, session: SessionId, _role: SessionRole, _state: SessionState) {
        self.registry.unregister(session);
    }
}
