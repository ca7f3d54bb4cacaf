//! # Transport Subsystem
//!
//! VOEvent Transport Protocol sessions: framing, handshake, keepalive,
//! acknowledgement and orderly close, for both inbound and outbound peers.
//!
//! ## Architecture
//!
//! ```text
//!            ┌──────────────────────── SessionDriver ────────────────────────┐
//!  socket ──→│ framing ──→ TransportSession ──→ EventSink (router)           │
//!            │   ↑              │   ↑                                        │
//!  socket ←──│ framing ←── actions  └── SessionLink ←── submit (fan-out)      │
//!            └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! The state machine in [`domain::session`] performs no I/O and reads no
//! clock; every input carries the current instant. [`service`] binds it to a
//! tokio stream.
//!
//! ## Session Roles
//!
//! | Role | Declares | Accepts | Direction |
//! |------|----------|---------|-----------|
//! | author-server | broker | author, broker | receives |
//! | subscriber-server | broker | subscriber, broker | sends |
//! | upstream-client (subscribe) | subscriber | broker, author | receives |
//! | upstream-client (publish) | author | broker | sends |

pub mod adapters;
pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

pub use adapters::{framed, FrameStream, SessionLink};
pub use domain::{
    FeedDirection, LocalEndpoint, PeerIdentity, SessionAction, SessionConfig, SessionRole,
    SessionState, TransportSession,
};
pub use error::{FrameError, SessionConfigError, SessionError};
pub use ports::{
    AllowAllPeers, AsyncStream, BoxedStream, NoopObserver, PeerAuthorizer, SessionObserver,
};
pub use service::{run_session, SessionContext, SessionDriver, SessionOutcome};
