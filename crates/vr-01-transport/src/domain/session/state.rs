use std::fmt;

/// Lifecycle of one transport session.
///
/// ```text
/// CONNECTING → HANDSHAKING → AUTHORIZED → ACTIVE → CLOSING → CLOSED
///                   │             │          │         │
///                   └─────────────┴──────────┴─────────┴──→ FAULTED
/// ```
///
/// CLOSED and FAULTED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Connecting,
    Handshaking,
    Authorized,
    Active,
    Closing,
    Closed,
    Faulted,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Faulted)
    }

    /// Past the handshake and not yet winding down.
    pub fn is_live(&self) -> bool {
        matches!(self, SessionState::Authorized | SessionState::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Connecting => "CONNECTING",
            SessionState::Handshaking => "HANDSHAKING",
            SessionState::Authorized => "AUTHORIZED",
            SessionState::Active => "ACTIVE",
            SessionState::Closing => "CLOSING",
            SessionState::Closed => "CLOSED",
            SessionState::Faulted => "FAULTED",
        }
    }

    pub(crate) fn as_u8(&self) -> u8 {
        match self {
            SessionState::Connecting => 0,
            SessionState::Handshaking => 1,
            SessionState::Authorized => 2,
            SessionState::Active => 3,
            SessionState::Closing => 4,
            SessionState::Closed => 5,
            SessionState::Faulted => 6,
        }
    }

    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            0 => SessionState::Connecting,
            1 => SessionState::Handshaking,
            2 => SessionState::Authorized,
            3 => SessionState::Active,
            4 => SessionState::Closing,
            5 => SessionState::Closed,
            _ => SessionState::Faulted,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
