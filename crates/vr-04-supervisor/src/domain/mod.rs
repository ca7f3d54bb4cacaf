//! Domain layer for the supervisor: retry arithmetic and feed bookkeeping.

mod backoff;
mod feed;

pub use backoff::{BackoffConfig, RetryState};
pub use feed::{FeedConfig, FeedStatus};
