//! Outbound ports: what a session needs from the rest of the node.

use std::sync::Arc;

use shared_types::{SessionId, SubscriberLink};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::domain::{PeerIdentity, SessionRole, SessionState};

/// Credential check delegated outside the transport.
///
/// Runs after the role checks in the handshake succeed. An `Err` carries the
/// reason logged with the resulting fault.
pub trait PeerAuthorizer: Send + Sync {
    fn authorize(&self, peer: &PeerIdentity, role: SessionRole) -> Result<(), String>;
}

/// Authorizer that admits every peer whose handshake is compatible.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllPeers;

impl PeerAuthorizer for AllowAllPeers {
    fn authorize(&self, _peer: &PeerIdentity, _role: SessionRole) -> Result<(), String> {
        Ok(())
    }
}

/// Lifecycle notifications from session drivers.
pub trait SessionObserver: Send + Sync {
    /// The handshake succeeded. `link` is the session's outbound half.
    fn on_authorized(&self, link: Arc<dyn SubscriberLink>, role: SessionRole, peer: &PeerIdentity);

    /// The session reached CLOSED or FAULTED.
    fn on_terminated(&self, session: SessionId, role: SessionRole, state: SessionState);
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {
    fn on_authorized(
        &self,
        _link: Arc<dyn SubscriberLink>,
        _role: SessionRole,
        _peer: &PeerIdentity,
    ) {
    }

    fn on_terminated(&self, _session: SessionId, _role: SessionRole, _state: SessionState) {}
}

/// Any byte stream a session can run over.
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> AsyncStream for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// Type-erased stream, as handed out by connectors.
pub type BoxedStream = Box<dyn AsyncStream>;
