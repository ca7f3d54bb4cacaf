//! # Cross-Subsystem Ports
//!
//! The transport crate decodes events and hands them to an [`EventSink`];
//! the routing crate pushes accepted events into [`SubscriberLink`]s.
//! Neither crate depends on the other.
//!
//! ```text
//! ┌──────────────┐  accept(event)   ┌──────────┐  submit(event)  ┌──────────────┐
//! │ session (in) │ ───────────────→ │  router  │ ──────────────→ │ session (out)│
//! └──────────────┘  ← Decision      └──────────┘                 └──────────────┘
//!      EventSink                                    SubscriberLink
//! ```

use crate::entities::{Decision, Event, SessionId};
use crate::errors::LinkError;

/// Accepts decoded events and decides their fate.
///
/// Called from the receiving session's task. Implementations must not block
/// on slow subscribers.
pub trait EventSink: Send + Sync {
    fn accept(&self, event: Event, source: SessionId) -> Decision;
}

/// Outbound half of a session that can receive forwarded events.
pub trait SubscriberLink: Send + Sync {
    fn session_id(&self) -> SessionId;

    /// True once the session is CLOSED or FAULTED.
    fn is_terminal(&self) -> bool;

    /// Queue an event without blocking.
    fn submit(&self, event: Event) -> Result<(), LinkError>;

    /// Ask the session to move to CLOSING.
    fn request_close(&self);
}
