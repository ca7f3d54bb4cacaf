//! Frame types exchanged on a session.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use shared_types::{AckToken, EventRole, Ivorn, PeerRole};

/// Protocol version announced in every handshake.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Identity and role declaration exchanged before anything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub origin: String,
    /// Identity the sender expects to be talking to, if any.
    pub destination: Option<String>,
    pub role: PeerRole,
    pub version: String,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Positive or negative acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckStatus {
    Ack,
    Nak,
}

impl AckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AckStatus::Ack => "ack",
            AckStatus::Nak => "nak",
        }
    }
}

/// Acknowledgement of one event frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgement {
    pub status: AckStatus,
    pub origin: String,
    pub token: AckToken,
    pub reason: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Liveness probe or its reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeepAlive {
    pub origin: String,
    pub timestamp: Option<DateTime<Utc>>,
}

/// A VOEvent document. `raw` is forwarded verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDocument {
    pub ivorn: Ivorn,
    pub role: EventRole,
    pub raw: Arc<str>,
}

/// Every message that can travel on a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Handshake(Handshake),
    Event(EventDocument),
    Ack(Acknowledgement),
    KeepAlive(KeepAlive),
    KeepAliveAck(KeepAlive),
}

impl Frame {
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Handshake(_) => "handshake",
            Frame::Event(_) => "event",
            Frame::Ack(ack) => ack.status.as_str(),
            Frame::KeepAlive(_) => "iamalive",
            Frame::KeepAliveAck(_) => "iamalive-ack",
        }
    }

    pub fn ack(origin: &str, token: AckToken, reason: Option<String>) -> Self {
        Frame::Ack(Acknowledgement {
            status: AckStatus::Ack,
            origin: origin.to_string(),
            token,
            reason,
            timestamp: Some(Utc::now()),
        })
    }

    pub fn nak(origin: &str, token: AckToken, reason: impl Into<String>) -> Self {
        Frame::Ack(Acknowledgement {
            status: AckStatus::Nak,
            origin: origin.to_string(),
            token,
            reason: Some(reason.into()),
            timestamp: Some(Utc::now()),
        })
    }

    pub fn keepalive(origin: &str) -> Self {
        Frame::KeepAlive(KeepAlive {
            origin: origin.to_string(),
            timestamp: Some(Utc::now()),
        })
    }

    pub fn keepalive_ack(origin: &str) -> Self {
        Frame::KeepAliveAck(KeepAlive {
            origin: origin.to_string(),
            timestamp: Some(Utc::now()),
        })
    }
}
