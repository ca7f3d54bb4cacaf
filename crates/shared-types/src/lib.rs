//! # Shared Types Crate
//!
//! Domain entities and ports used by every relay subsystem.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: `Event`, `Ivorn`, `SessionId` and `Decision`
//!   are defined once, here.
//! - **Immutable events**: an `Event` is never modified after decoding. Clones
//!   share the payload, so fan-out to many subscribers copies pointers only.
//! - **Ports, not wiring**: `EventSink` and `SubscriberLink` let the transport
//!   and routing crates talk without depending on each other.

pub mod entities;
pub mod errors;
pub mod ports;

pub use entities::*;
pub use errors::*;
pub use ports::*;
