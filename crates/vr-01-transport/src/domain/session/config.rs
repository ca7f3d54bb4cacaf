use std::time::Duration;

use crate::error::SessionConfigError;

/// Timers and limits governing one session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Time allowed between opening and receiving the remote handshake.
    pub handshake_timeout: Duration,
    /// Silence after which a keepalive probe is sent.
    pub idle_timeout: Duration,
    /// Time allowed for the peer to answer a probe.
    pub keepalive_interval: Duration,
    /// Time CLOSING waits for outstanding acknowledgements.
    pub close_grace: Duration,
    /// Bound on a single frame write.
    pub write_timeout: Duration,
    /// Unacknowledged events older than this are forgotten.
    pub ack_timeout: Duration,
    /// Consecutive undecodable frames tolerated before faulting.
    pub max_consecutive_malformed: u32,
    /// Capacity of the per-session forward queue.
    pub outbound_queue: usize,
    /// Largest accepted frame body.
    pub max_frame_bytes: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(120),
            keepalive_interval: Duration::from_secs(30),
            close_grace: Duration::from_secs(5),
            write_timeout: Duration::from_secs(10),
            ack_timeout: Duration::from_secs(60),
            max_consecutive_malformed: 3,
            outbound_queue: 1024,
            max_frame_bytes: 1024 * 1024, // 1 MiB
        }
    }
}

impl SessionConfig {
    /// Short timers for tests.
    pub fn for_testing() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(2),
            idle_timeout: Duration::from_secs(5),
            keepalive_interval: Duration::from_secs(1),
            close_grace: Duration::from_secs(1),
            write_timeout: Duration::from_secs(1),
            ack_timeout: Duration::from_secs(10),
            max_consecutive_malformed: 3,
            outbound_queue: 16,
            max_frame_bytes: 64 * 1024,
        }
    }

    pub fn validate(&self) -> Result<(), SessionConfigError> {
        let timers = [
            ("handshake_timeout", self.handshake_timeout),
            ("idle_timeout", self.idle_timeout),
            ("keepalive_interval", self.keepalive_interval),
            ("close_grace", self.close_grace),
            ("write_timeout", self.write_timeout),
            ("ack_timeout", self.ack_timeout),
        ];
        for (name, value) in timers {
            if value.is_zero() {
                return Err(SessionConfigError::ZeroDuration(name));
            }
        }
        if self.max_consecutive_malformed == 0 {
            return Err(SessionConfigError::ZeroMalformedLimit);
        }
        if self.outbound_queue == 0 {
            return Err(SessionConfigError::ZeroQueue);
        }
        if self.max_frame_bytes == 0 {
            return Err(SessionConfigError::ZeroFrameLimit);
        }
        Ok(())
    }
}
