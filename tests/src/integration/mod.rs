//! Cross-subsystem scenarios.

pub mod broker_chain;
pub mod submissions;
pub mod subscribers;
pub mod support;
