//! Domain layer for the transport subsystem.
//!
//! - **wire**: frame types and their XML form
//! - **role**: what each local session role may exchange
//! - **handshake**: compatibility checks between local and remote roles
//! - **session**: the per-connection state machine

pub mod handshake;
pub mod role;
pub mod session;
pub mod wire;

pub use handshake::{HandshakeResult, LocalEndpoint, PeerIdentity, RejectReason};
pub use role::{FeedDirection, SessionRole};
pub use session::{SessionAction, SessionConfig, SessionState, TransportSession};
