use chrono::Utc;

use super::{HandshakeResult, LocalEndpoint, PeerIdentity, RejectReason};
use crate::domain::wire::{Handshake, PROTOCOL_VERSION};

/// The handshake this side sends when a session opens.
pub fn local_handshake(local: &LocalEndpoint) -> Handshake {
    Handshake {
        origin: local.identity.clone(),
        destination: local.expected_peer.clone(),
        role: local.role.declared_role(),
        version: PROTOCOL_VERSION.to_string(),
        timestamp: Some(Utc::now()),
    }
}

/// Check a remote handshake against the local endpoint.
///
/// Authorization by an external collaborator happens after this succeeds.
pub fn verify_handshake(local: &LocalEndpoint, remote: &Handshake) -> HandshakeResult {
    let origin = remote.origin.trim();
    if origin.is_empty() {
        return HandshakeResult::Reject(RejectReason::MissingOrigin);
    }

    if major(&remote.version) != major(PROTOCOL_VERSION) {
        return HandshakeResult::Reject(RejectReason::ProtocolMismatch {
            remote: remote.version.clone(),
        });
    }

    if !local.role.accepts(remote.role) {
        return HandshakeResult::Reject(RejectReason::IncompatibleRole {
            local: local.role,
            remote: remote.role,
        });
    }

    if let Some(destination) = remote.destination.as_deref().map(str::trim) {
        if !destination.is_empty() && destination != local.identity {
            return HandshakeResult::Reject(RejectReason::WrongDestination {
                destination: destination.to_string(),
            });
        }
    }

    if let Some(expected) = &local.expected_peer {
        if expected != origin {
            return HandshakeResult::Reject(RejectReason::UnexpectedPeer {
                expected: expected.clone(),
                found: origin.to_string(),
            });
        }
    }

    HandshakeResult::Accept(PeerIdentity {
        origin: origin.to_string(),
        role: remote.role,
    })
}

fn major(version: &str) -> &str {
    version.split('.').next().unwrap_or(version).trim()
}
