//! Connector implementations.

mod tcp;

pub use tcp::TcpConnector;
