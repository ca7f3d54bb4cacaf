//! Transport error types.

use thiserror::Error;

use crate::domain::SessionState;

/// A frame that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame is not valid UTF-8")]
    NotUtf8,

    #[error("frame contains no root element")]
    Empty,

    #[error("malformed XML: {0}")]
    Xml(String),

    #[error("unexpected root element <{0}>")]
    UnknownRoot(String),

    #[error("unknown transport role {0:?}")]
    UnknownTransportRole(String),

    #[error("missing required element or attribute {0}")]
    Missing(&'static str),

    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// A VOEvent document that is not acceptable as an event.
    #[error("invalid event: {reason}")]
    InvalidEvent {
        ivorn: Option<String>,
        reason: String,
    },
}

impl FrameError {
    /// Ivorn recovered before the failure, used to address the nak.
    pub fn recovered_ivorn(&self) -> Option<&str> {
        match self {
            FrameError::InvalidEvent { ivorn, .. } => ivorn.as_deref(),
            _ => None,
        }
    }
}

/// Operations rejected by the session state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session cannot send events in state {0}")]
    NotReady(SessionState),

    #[error("session role does not send events")]
    WrongDirection,
}

/// Session settings that cannot work.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionConfigError {
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("max_consecutive_malformed must be at least 1")]
    ZeroMalformedLimit,

    #[error("outbound_queue must be at least 1")]
    ZeroQueue,

    #[error("max_frame_bytes must be at least 1")]
    ZeroFrameLimit,
}
