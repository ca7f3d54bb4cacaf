//! Ports for the routing subsystem.

pub mod outbound;

pub use outbound::{EventFilter, EventHandler, HandlerError, HandlerVerdict};
