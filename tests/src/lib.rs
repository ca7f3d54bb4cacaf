//! # VOEvent Relay Test Suite
//!
//! Scenarios that need more than one subsystem, run against real relay
//! nodes over loopback TCP.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── support.rs        # Scripted peers speaking the transport protocol
//!     ├── submissions.rs    # Author port: acks, naks, whitelist, handlers
//!     ├── subscribers.rs    # Subscriber port: delivery, filters, idle peers
//!     └── broker_chain.rs   # Two relays linked by feeds, duplicate suppression
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p vr-tests
//!
//! # By scenario group
//! cargo test -p vr-tests integration::broker_chain::
//! ```

#![allow(dead_code)]

pub mod integration;
