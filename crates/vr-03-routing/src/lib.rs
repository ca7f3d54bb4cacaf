//! # Routing Subsystem
//!
//! Decides the fate of every decoded event and pushes accepted events to the
//! sessions that subscribe to them.
//!
//! ## Flow
//!
//! ```text
//! accept(event, source)
//!     │
//!     ├─ DuplicateFilter::seen_or_record ── seen ──→ Duplicate
//!     │
//!     ├─ HandlerPipeline::run ── veto / fail-fast fault ──→ Rejected
//!     │
//!     └─ fan_out: registry snapshot, minus source, minus filtered
//!            └─ link.submit(event)  (never blocks; failures isolated)
//!                                                       ──→ Forwarded
//! ```
//!
//! ## Guarantees
//!
//! - A given ivorn reaches the handlers and each subscriber at most once
//!   while the duplicate filter remembers it.
//! - A rejected ivorn stays remembered; later copies are duplicates.
//! - The registry holds weak references only. Session teardown belongs to
//!   whoever owns the session.
//! - Events from one source reach each subscriber in the order received.

pub mod domain;
pub mod ports;
pub mod service;

#[cfg(test)]
mod test_support;

pub use domain::{
    ActiveSubscriber, FaultPolicy, HandlerPipeline, PipelineOutcome, SubscriptionRegistry,
    DEFAULT_MAX_SEND_FAILURES,
};
pub use ports::{EventFilter, EventHandler, HandlerError, HandlerVerdict};
pub use service::{FanOutReport, Router};
