//! Ports for the transport subsystem.

pub mod outbound;

pub use outbound::{
    AllowAllPeers, AsyncStream, BoxedStream, NoopObserver, PeerAuthorizer, SessionObserver,
};
