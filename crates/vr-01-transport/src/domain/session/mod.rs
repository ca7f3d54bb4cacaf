//! # Transport Session
//!
//! Sans-IO state machine for one peer connection. The async driver feeds it
//! bytes, clock ticks and outbound events; it answers with the frames to
//! write and whether to drop the connection.

mod config;
mod machine;
mod state;

pub use config::SessionConfig;
pub use machine::{SessionAction, TransportSession};
pub use state::SessionState;
