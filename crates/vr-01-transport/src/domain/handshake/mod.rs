//! # Session Handshakes
//!
//! Each side opens with a handshake naming its identity and role. A session
//! becomes AUTHORIZED only when the remote's declaration is compatible with
//! the local endpoint.

mod types;
mod verify;

pub use types::{HandshakeResult, LocalEndpoint, PeerIdentity, RejectReason};
pub use verify::{local_handshake, verify_handshake};
