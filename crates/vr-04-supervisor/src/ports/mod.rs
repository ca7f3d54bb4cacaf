//! Ports for the supervisor.

pub mod outbound;

pub use outbound::Connector;
