//! Exponential backoff without jitter.
//!
//! ```text
//! attempt:   1     2       3         4 ...
//! delay:    min  min*m  min*m^2  ... capped at max
//! ```
//!
//! A session that stayed authorized for at least `stability` resets the
//! sequence, so the next failure waits `min` again.

use std::time::Duration;

use crate::error::SupervisorError;

/// Backoff bounds shared by every feed.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    pub min: Duration,
    pub max: Duration,
    /// Growth factor per consecutive failure. At least 1.
    pub multiplier: f64,
    /// Connected time after which the delay returns to `min`.
    pub stability: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            min: Duration::from_secs(1),
            max: Duration::from_secs(300),
            multiplier: 2.0,
            stability: Duration::from_secs(60),
        }
    }
}

impl BackoffConfig {
    /// Short delays for tests.
    pub fn for_testing() -> Self {
        Self {
            min: Duration::from_millis(100),
            max: Duration::from_millis(800),
            multiplier: 2.0,
            stability: Duration::from_secs(2),
        }
    }

    pub fn validate(&self) -> Result<(), SupervisorError> {
        if self.min.is_zero() {
            return Err(SupervisorError::InvalidBackoff("min must be positive".into()));
        }
        if self.min > self.max {
            return Err(SupervisorError::InvalidBackoff(format!(
                "min {:?} exceeds max {:?}",
                self.min, self.max
            )));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(SupervisorError::InvalidBackoff(format!(
                "multiplier {} must be at least 1",
                self.multiplier
            )));
        }
        Ok(())
    }
}

/// Retry bookkeeping for one feed.
#[derive(Debug, Clone)]
pub struct RetryState {
    config: BackoffConfig,
    next_delay: Duration,
    consecutive_failures: u32,
}

impl RetryState {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            next_delay: config.min,
            config,
            consecutive_failures: 0,
        }
    }

    /// Record a failed attempt or an ended session and return how long to
    /// wait before the next attempt.
    ///
    /// `connected_for` is how long the ended session stayed authorized, or
    /// `None` if no session got that far.
    pub fn on_failure(&mut self, connected_for: Option<Duration>) -> Duration {
        if connected_for.is_some_and(|d| d >= self.config.stability) {
            self.reset();
        }

        let delay = self.next_delay;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.next_delay = self.grow(delay);
        delay
    }

    pub fn reset(&mut self) {
        self.next_delay = self.config.min;
        self.consecutive_failures = 0;
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Delay the next failure would return, ignoring stability resets.
    pub fn next_delay(&self) -> Duration {
        self.next_delay
    }

    fn grow(&self, delay: Duration) -> Duration {
        let scaled = delay.as_secs_f64() * self.config.multiplier;
        if !scaled.is_finite() || scaled >= self.config.max.as_secs_f64() {
            self.config.max
        } else {
            Duration::from_secs_f64(scaled).max(delay)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_grow_and_cap() {
        let config = BackoffConfig::for_testing();
        let mut retry = RetryState::new(config.clone());

        let delays: Vec<Duration> = (0..8).map(|_| retry.on_failure(None)).collect();
        assert_eq!(delays[0], config.min);
        assert_eq!(delays[1], Duration::from_millis(200));
        assert_eq!(delays[2], Duration::from_millis(400));
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        assert!(delays.iter().all(|d| *d <= config.max));
        assert_eq!(*delays.last().unwrap(), config.max);
        assert_eq!(retry.consecutive_failures(), 8);
    }

    #[test]
    fn test_stable_session_resets_delay() {
        let config = BackoffConfig::for_testing();
        let mut retry = RetryState::new(config.clone());
        for _ in 0..4 {
            retry.on_failure(None);
        }
        assert!(retry.next_delay() > config.min);

        let delay = retry.on_failure(Some(config.stability));
        assert_eq!(delay, config.min);
        assert_eq!(retry.consecutive_failures(), 1);
    }

    #[test]
    fn test_short_session_does_not_reset() {
        let config = BackoffConfig::for_testing();
        let mut retry = RetryState::new(config.clone());
        retry.on_failure(None);
        retry.on_failure(None);

        let delay = retry.on_failure(Some(config.stability / 2));
        assert_eq!(delay, Duration::from_millis(400));
    }

    #[test]
    fn test_unit_multiplier_keeps_min() {
        let mut retry = RetryState::new(BackoffConfig {
            multiplier: 1.0,
            ..BackoffConfig::for_testing()
        });
        for _ in 0..5 {
            assert_eq!(retry.on_failure(None), Duration::from_millis(100));
        }
    }

    #[test]
    fn test_validate() {
        assert!(BackoffConfig::default().validate().is_ok());

        let inverted = BackoffConfig {
            min: Duration::from_secs(10),
            max: Duration::from_secs(1),
            ..BackoffConfig::default()
        };
        assert!(inverted.validate().is_err());

        let shrinking = BackoffConfig {
            multiplier: 0.5,
            ..BackoffConfig::default()
        };
        assert!(shrinking.validate().is_err());

        let zero = BackoffConfig {
            min: Duration::ZERO,
            ..BackoffConfig::default()
        };
        assert!(zero.validate().is_err());
    }
}
