//! # Duplicate Filter Subsystem
//!
//! Remembers which ivorns the broker has already accepted so that an event
//! arriving over several paths is forwarded once.
//!
//! ## Eviction
//!
//! ```text
//!  oldest ───────────────────────────────────────────→ newest
//!  [ivorn a][ivorn b][ivorn c] ... [ivorn n]
//!     ↑ dropped when older than `retention`
//!     ↑ dropped when len > `max_entries`
//! ```
//!
//! Both bounds apply; whichever trips first evicts. An evicted ivorn is
//! treated as first-seen again.

pub mod domain;

pub use domain::{DedupConfig, DedupConfigError, DuplicateFilter};
