//! Plug-in points: handlers that inspect accepted events and filters that
//! decide which subscribers see them.

use shared_types::Event;
use thiserror::Error;

/// Verdict of a handler on one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerVerdict {
    Accept,
    /// Veto: the event is not forwarded and the sender gets a nak.
    Reject(String),
}

/// A handler failed to do its job. Distinct from a veto.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Failed(String),
}

/// Side effect or validation run on every first-seen event, in order.
///
/// Handlers run synchronously on the submitting session's task before the
/// author is acknowledged. Blocking I/O is allowed; on a multi-threaded
/// runtime the session hands its worker off while the pipeline runs.
pub trait EventHandler: Send + Sync {
    fn name(&self) -> &str;

    fn handle(&self, event: &Event) -> Result<HandlerVerdict, HandlerError>;
}

/// Per-subscriber predicate. Events it rejects are not sent to that subscriber.
pub trait EventFilter: Send + Sync {
    fn matches(&self, event: &Event) -> bool;
}
