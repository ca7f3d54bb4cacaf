//! Handshake data types.

use std::fmt;

use shared_types::PeerRole;

use crate::domain::SessionRole;

/// This side of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEndpoint {
    /// Local broker identity, sent as `Origin`.
    pub identity: String,
    pub role: SessionRole,
    /// For outbound sessions: the identity the remote must present.
    pub expected_peer: Option<String>,
}

impl LocalEndpoint {
    pub fn new(identity: impl Into<String>, role: SessionRole) -> Self {
        Self {
            identity: identity.into(),
            role,
            expected_peer: None,
        }
    }

    #[must_use]
    pub fn with_expected_peer(mut self, peer: Option<String>) -> Self {
        self.expected_peer = peer;
        self
    }
}

/// Who is on the other end, once the handshake succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerIdentity {
    pub origin: String,
    pub role: PeerRole,
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.origin, self.role)
    }
}

/// Result of handshake verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeResult {
    Accept(PeerIdentity),
    Reject(RejectReason),
}

/// Reasons for rejecting a handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Remote sent no `Origin`.
    MissingOrigin,
    /// Major protocol version differs.
    ProtocolMismatch { remote: String },
    /// Remote's declared role cannot hold this session.
    IncompatibleRole { local: SessionRole, remote: PeerRole },
    /// Remote addressed the handshake to someone else.
    WrongDestination { destination: String },
    /// Outbound session reached a different broker than configured.
    UnexpectedPeer { expected: String, found: String },
    /// External authorizer refused the peer.
    Unauthorized(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::MissingOrigin => write!(f, "handshake has no origin"),
            RejectReason::ProtocolMismatch { remote } => {
                write!(f, "unsupported protocol version {remote}")
            }
            RejectReason::IncompatibleRole { local, remote } => {
                write!(f, "role {remote} not accepted on {local} session")
            }
            RejectReason::WrongDestination { destination } => {
                write!(f, "handshake addressed to {destination}")
            }
            RejectReason::UnexpectedPeer { expected, found } => {
                write!(f, "expected peer {expected}, found {found}")
            }
            RejectReason::Unauthorized(why) => write!(f, "peer not authorized: {why}"),
        }
    }
}
