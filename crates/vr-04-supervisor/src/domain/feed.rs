use std::fmt;
use std::time::Instant;

use vr_01_transport::FeedDirection;

/// One configured outbound feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    /// `host:port` of the remote broker.
    pub address: String,
    pub direction: FeedDirection,
    /// A disabled feed is never dialled and reports `PermanentlyFailed`.
    pub enabled: bool,
    /// If set, the remote `Origin` must match.
    pub expected_identity: Option<String>,
}

impl FeedConfig {
    pub fn subscribe(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            direction: FeedDirection::Subscribe,
            enabled: true,
            expected_identity: None,
        }
    }

    pub fn publish(address: impl Into<String>) -> Self {
        Self {
            direction: FeedDirection::Publish,
            ..Self::subscribe(address)
        }
    }

    #[must_use]
    pub fn with_expected_identity(mut self, identity: impl Into<String>) -> Self {
        self.expected_identity = Some(identity.into());
        self
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Observable state of one feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    /// Dialling, or handshaking on a fresh connection.
    Connecting,
    /// A session is authorized.
    Active,
    BackingOff { next_attempt_at: Instant },
    /// Disabled by configuration. Never reached through failures.
    PermanentlyFailed,
}

impl FeedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedStatus::Connecting => "connecting",
            FeedStatus::Active => "active",
            FeedStatus::BackingOff { .. } => "backing_off",
            FeedStatus::PermanentlyFailed => "permanently_failed",
        }
    }
}

impl fmt::Display for FeedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
