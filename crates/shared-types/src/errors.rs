//! # Error Types
//!
//! Errors shared across subsystems.

use thiserror::Error;

/// Errors raised while parsing identifiers and enumerations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    /// An ivorn must carry at least one non-whitespace character.
    #[error("ivorn is empty")]
    EmptyIvorn,

    /// Event role outside observation/test/utility/confirmation.
    #[error("unknown event role: {0}")]
    UnknownEventRole(String),

    /// Peer role outside author/broker/subscriber.
    #[error("unknown peer role: {0}")]
    UnknownPeerRole(String),
}

/// Failure to hand an event to a subscriber's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LinkError {
    /// The session's outbound queue is full.
    #[error("outbound queue full")]
    QueueFull,

    /// The session is closing or gone.
    #[error("session closed")]
    Closed,
}
