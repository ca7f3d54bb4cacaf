//! # Domain Entities
//!
//! The event notification and the identifiers that travel with it.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::IdentifierError;

/// Globally unique identifier of an event notification.
///
/// Two events are duplicates iff their ivorns are equal; nothing else about
/// the payload is compared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Ivorn(String);

impl Ivorn {
    /// Wrap a raw identifier, rejecting blank values.
    pub fn new(raw: impl Into<String>) -> Result<Self, IdentifierError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(IdentifierError::EmptyIvorn);
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ivorn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Ivorn {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Role an event declares for itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventRole {
    Observation,
    Test,
    Utility,
    Confirmation,
}

impl EventRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventRole::Observation => "observation",
            EventRole::Test => "test",
            EventRole::Utility => "utility",
            EventRole::Confirmation => "confirmation",
        }
    }
}

impl fmt::Display for EventRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventRole {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "observation" => Ok(EventRole::Observation),
            "test" => Ok(EventRole::Test),
            "utility" => Ok(EventRole::Utility),
            "confirmation" => Ok(EventRole::Confirmation),
            other => Err(IdentifierError::UnknownEventRole(other.to_string())),
        }
    }
}

/// Role a peer declares during the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerRole {
    /// Originates events.
    Author,
    /// Relays events in both directions.
    Broker,
    /// Consumes events.
    Subscriber,
}

impl PeerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeerRole::Author => "author",
            PeerRole::Broker => "broker",
            PeerRole::Subscriber => "subscriber",
        }
    }
}

impl fmt::Display for PeerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeerRole {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "author" => Ok(PeerRole::Author),
            "broker" => Ok(PeerRole::Broker),
            "subscriber" => Ok(PeerRole::Subscriber),
            other => Err(IdentifierError::UnknownPeerRole(other.to_string())),
        }
    }
}

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a transport session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(u64);

impl SessionId {
    /// Allocate the next identifier. Never returns the same value twice.
    pub fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

#[derive(Debug)]
struct EventInner {
    ivorn: Ivorn,
    role: EventRole,
    payload: Arc<str>,
    received_at: DateTime<Utc>,
    origin: SessionId,
}

/// A decoded event notification.
///
/// Immutable once built. Cloning is a reference-count bump, so the same
/// event can sit in many subscriber queues at once.
#[derive(Debug, Clone)]
pub struct Event {
    inner: Arc<EventInner>,
}

impl Event {
    pub fn new(
        ivorn: Ivorn,
        role: EventRole,
        payload: impl Into<Arc<str>>,
        received_at: DateTime<Utc>,
        origin: SessionId,
    ) -> Self {
        Self {
            inner: Arc::new(EventInner {
                ivorn,
                role,
                payload: payload.into(),
                received_at,
                origin,
            }),
        }
    }

    pub fn ivorn(&self) -> &Ivorn {
        &self.inner.ivorn
    }

    pub fn role(&self) -> EventRole {
        self.inner.role
    }

    /// The document exactly as it arrived on the wire.
    pub fn payload(&self) -> &str {
        &self.inner.payload
    }

    pub fn shared_payload(&self) -> Arc<str> {
        Arc::clone(&self.inner.payload)
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.inner.received_at
    }

    /// Session the event arrived on. Never receives its own event back.
    pub fn origin(&self) -> SessionId {
        self.inner.origin
    }
}

/// Outcome of offering an event to the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Accepted and queued to every eligible subscriber.
    Forwarded,
    /// The ivorn was already seen inside the retention window.
    Duplicate,
    /// A handler vetoed the event.
    Rejected { reason: String },
}

impl Decision {
    pub fn label(&self) -> &'static str {
        match self {
            Decision::Forwarded => "forwarded",
            Decision::Duplicate => "duplicate",
            Decision::Rejected { .. } => "rejected",
        }
    }

    /// Whether the sender gets a positive acknowledgement.
    pub fn is_positive(&self) -> bool {
        !matches!(self, Decision::Rejected { .. })
    }
}

const TOKEN_HEX_LEN: usize = 16;

/// Transaction token pairing an event frame with its ack or nak.
///
/// Derived from the ivorn so that sender and receiver compute the same value
/// without rewriting the payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AckToken(String);

impl AckToken {
    pub fn for_ivorn(ivorn: &Ivorn) -> Self {
        Self::digest(ivorn.as_str().as_bytes())
    }

    /// Token for a payload whose ivorn could not be recovered.
    pub fn for_bytes(raw: &[u8]) -> Self {
        Self::digest(raw)
    }

    /// Token as read back from a `Response` element.
    pub fn from_wire(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn digest(bytes: &[u8]) -> Self {
        let hash = Sha256::digest(bytes);
        let mut hexed = hex::encode(hash);
        hexed.truncate(TOKEN_HEX_LEN);
        Self(hexed)
    }
}

impl fmt::Display for AckToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ivorn_rejects_blank() {
        assert_eq!(Ivorn::new("  "), Err(IdentifierError::EmptyIvorn));
        assert!(Ivorn::new("ivo://org.example/test#1").is_ok());
    }

    #[test]
    fn test_event_roles_parse() {
        assert_eq!("utility".parse::<EventRole>(), Ok(EventRole::Utility));
        assert!(matches!(
            "prediction".parse::<EventRole>(),
            Err(IdentifierError::UnknownEventRole(_))
        ));
    }

    #[test]
    fn test_event_role_deserializes_lowercase() {
        let roles: Vec<EventRole> = serde_json::from_str(r#"["observation","test"]"#).unwrap();
        assert_eq!(roles, vec![EventRole::Observation, EventRole::Test]);
    }

    #[test]
    fn test_session_ids_are_unique() {
        let a = SessionId::next();
        let b = SessionId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn test_event_clone_shares_payload() {
        let event = Event::new(
            Ivorn::new("ivo://x/y#1").unwrap(),
            EventRole::Observation,
            "<VOEvent/>",
            Utc::now(),
            SessionId::from_raw(7),
        );
        let copy = event.clone();
        assert!(Arc::ptr_eq(&event.shared_payload(), &copy.shared_payload()));
        assert_eq!(copy.origin(), SessionId::from_raw(7));
    }

    #[test]
    fn test_ack_token_is_stable_and_short() {
        let ivorn = Ivorn::new("ivo://x/y#1").unwrap();
        let a = AckToken::for_ivorn(&ivorn);
        let b = AckToken::for_ivorn(&ivorn);
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 16);
        assert_ne!(a, AckToken::for_ivorn(&Ivorn::new("ivo://x/y#2").unwrap()));
    }

    #[test]
    fn test_rejected_decision_is_negative() {
        assert!(Decision::Forwarded.is_positive());
        assert!(Decision::Duplicate.is_positive());
        assert!(!Decision::Rejected {
            reason: "nope".into()
        }
        .is_positive());
    }
}
