//! # Wire Format
//!
//! Frames are UTF-8 XML documents. The length prefix lives in
//! `adapters::framing`; this module only deals with one frame body.

mod codec;
mod frame;

pub use codec::{decode, encode};
pub use frame::{
    AckStatus, Acknowledgement, EventDocument, Frame, Handshake, KeepAlive, PROTOCOL_VERSION,
};
