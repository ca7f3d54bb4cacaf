//! Domain layer for routing.
//!
//! - **pipeline**: ordered handlers with per-handler fault policy
//! - **registry**: weak references to sessions that receive forwarded events

mod pipeline;
mod registry;

pub use pipeline::{FaultPolicy, HandlerPipeline, PipelineOutcome};
pub use registry::{ActiveSubscriber, SubscriptionRegistry, DEFAULT_MAX_SEND_FAILURES};
