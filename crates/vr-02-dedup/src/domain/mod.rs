//! Domain layer for duplicate suppression.
//!
//! - **config**: retention bounds (`DedupConfig`)
//! - **filter**: the atomic check-and-record store (`DuplicateFilter`)

mod config;
mod filter;

pub use config::{DedupConfig, DedupConfigError};
pub use filter::DuplicateFilter;
