//! error.rs
//! Errors raised while creating a token bucket or talking to a stopped one.

use crate::types::Uint;

/// Error type for token bucket construction and handle operations.
///
/// A live bucket never fails a query on its own: the only runtime error a
/// caller can observe is [`BucketError::Stopped`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BucketError {
    /// The requested rate is not a positive integer.
    #[error("Invalid rate {0}: requests per second must be a positive integer")]
    InvalidRate(i64),

    /// No refill schedule fits within the configured interval bound.
    ///
    /// Indicates a configuration defect: with the default bound every
    /// positive rate resolves.
    #[error("No refill schedule for {rps} rps with an interval of at most {max_interval_ms} ms")]
    ResolutionFailure { rps: Uint, max_interval_ms: Uint },

    /// A configuration value is out of range.
    #[error("Configure: {0}")]
    Config(String),

    /// The actor task has terminated and can no longer answer.
    #[error("Token bucket actor has stopped")]
    Stopped,
}

/// Result type used throughout the crate.
pub type Result<T, E = BucketError> = std::result::Result<T, E>;
