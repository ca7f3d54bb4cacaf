use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SupervisorError {
    #[error("invalid backoff: {0}")]
    InvalidBackoff(String),

    #[error("feed {0} configured more than once")]
    DuplicateFeed(String),

    #[error("feed address must not be empty")]
    EmptyAddress,
}
