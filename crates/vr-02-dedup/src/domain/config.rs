use std::time::Duration;

use thiserror::Error;

/// Retention bounds for the duplicate filter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DedupConfig {
    /// Hard cap on remembered ivorns.
    pub max_entries: usize,
    /// Entries older than this are forgotten. `None` keeps them until the
    /// count cap pushes them out.
    pub retention: Option<Duration>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            max_entries: 100_000,
            retention: Some(Duration::from_secs(30 * 24 * 60 * 60)),
        }
    }
}

impl DedupConfig {
    /// Create config for testing with a small cap and no age bound.
    #[cfg(test)]
    pub fn for_testing() -> Self {
        Self {
            max_entries: 8,
            retention: None,
        }
    }

    pub fn validate(&self) -> Result<(), DedupConfigError> {
        if self.max_entries == 0 {
            return Err(DedupConfigError::ZeroCapacity);
        }
        if self.retention == Some(Duration::ZERO) {
            return Err(DedupConfigError::ZeroRetention);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DedupConfigError {
    #[error("dedup max_entries must be at least 1")]
    ZeroCapacity,

    #[error("dedup retention must be positive when set")]
    ZeroRetention,
}
