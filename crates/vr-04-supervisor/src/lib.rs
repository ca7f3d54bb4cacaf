//! # Supervisor Subsystem
//!
//! Keeps outbound feeds connected: upstream brokers this node subscribes to,
//! and remote author ports this node publishes to.
//!
//! ## Feed Lifecycle
//!
//! ```text
//!            ┌──────────── connect failed / session ended ───────────┐
//!            ↓                                                       │
//! Connecting ──→ (handshake ok) ──→ Active ──→ (session ends) ──→ BackingOff
//!     ↑                                                              │
//!     └──────────────────────── delay elapsed ───────────────────────┘
//!
//! PermanentlyFailed: only for feeds disabled in configuration.
//! ```
//!
//! Failures always retry. The delay grows by `multiplier` up to `max` and
//! drops back to `min` after a session that stayed up for `stability`.

pub mod adapters;
pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

pub use adapters::TcpConnector;
pub use domain::{BackoffConfig, FeedConfig, FeedStatus, RetryState};
pub use error::SupervisorError;
pub use ports::Connector;
pub use service::ReconnectionSupervisor;
