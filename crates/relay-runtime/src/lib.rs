//! # Relay Runtime Library
//!
//! This library exposes the internal modules of the relay runtime for
//! testing. The main entry point is the `relay-node` binary.
//!
//! ## Modules
//!
//! - `config`: typed configuration from defaults, TOML and environment
//! - `listener`: inbound TCP accept loops with the author whitelist
//! - `adapters`: handlers, filters, authorizer and registry observer
//! - `node`: wiring and lifecycle of a running relay

pub mod adapters;
pub mod config;
pub mod listener;
pub mod node;

pub use config::{ConfigError, RelayConfig};
pub use node::RelayNode;
