//! Adapters binding the session machine to tokio I/O.

pub mod framing;
pub mod link;

pub use framing::{framed, FrameStream};
pub use link::SessionLink;
