//! Creation options for a token bucket actor.
//!
//! Only [`TokenBucketConfig::rps`] affects bucket semantics. The remaining
//! fields tune how the actor is hosted (mailbox size, log label) and how the
//! refill schedule is searched for.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{BucketError, Result};
use crate::schedule::{SternBrocotResolver, DEFAULT_MAX_INTERVAL_MS, DEFAULT_MAX_RELATIVE_ERROR_PPM};
use crate::types::{Rate, Uint};

/// Default number of messages that can wait in an actor's mailbox.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 64;

/// Label used in log lines when no name is configured.
pub const DEFAULT_NAME: &str = "token-bucket";

/// Configuration structure for spawning a token bucket actor.
///
/// # Example
///
/// ```rust
/// use rate_guard_actor::TokenBucketConfig;
///
/// let config = TokenBucketConfig::new(10)
///     .with_name("api")
///     .with_mailbox_capacity(128);
/// assert_eq!(config.label(), "api");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBucketConfig {
    /// Requested rate in requests per second; also the bucket capacity.
    pub rps: i64,
    /// Label used in log lines.
    #[serde(default)]
    pub name: Option<String>,
    /// Bound of the actor's mailbox. Senders wait while it is full.
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,
    #[serde(default)]
    pub resolver: ResolverConfig,
}

fn default_mailbox_capacity() -> usize {
    DEFAULT_MAILBOX_CAPACITY
}

impl TokenBucketConfig {
    /// Creates a configuration for `rps` with default hosting options.
    pub fn new(rps: i64) -> Self {
        Self {
            rps,
            name: None,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            resolver: ResolverConfig::default(),
        }
    }

    /// Sets the log label.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the mailbox bound.
    pub fn with_mailbox_capacity(mut self, mailbox_capacity: usize) -> Self {
        self.mailbox_capacity = mailbox_capacity;
        self
    }

    /// Sets the schedule search tuning.
    pub fn with_resolver(mut self, resolver: ResolverConfig) -> Self {
        self.resolver = resolver;
        self
    }

    /// Configured name, or [`DEFAULT_NAME`] when none is set.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_NAME)
    }

    /// Validates the rate, failing with [`BucketError::InvalidRate`].
    pub fn rate(&self) -> Result<Rate> {
        Rate::new(self.rps).map_err(|e| {
            warn!("{}: {e}", self.label());
            e
        })
    }

    /// Checks the hosting options that do not depend on the resolver.
    pub fn validate(&self) -> Result<()> {
        if self.mailbox_capacity == 0 {
            let msg = format!("{}: mailbox_capacity must be greater than 0", self.label());
            warn!("{msg}");
            return Err(BucketError::Config(msg));
        }
        Ok(())
    }
}

/// Tuning of the Stern–Brocot schedule search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Accepted relative error of `refill_tokens / interval_ms`, in parts per
    /// million. `0` accepts exact fractions only.
    pub max_relative_error_ppm: u32,
    /// Longest refill interval the search may return.
    pub max_interval_ms: Uint,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_relative_error_ppm: DEFAULT_MAX_RELATIVE_ERROR_PPM,
            max_interval_ms: DEFAULT_MAX_INTERVAL_MS,
        }
    }
}

impl ResolverConfig {
    /// Creates a tuning with an explicit tolerance and interval bound.
    pub fn new(max_relative_error_ppm: u32, max_interval_ms: Uint) -> Self {
        Self {
            max_relative_error_ppm,
            max_interval_ms,
        }
    }

    /// Validates the tuning and builds the resolver it describes.
    pub fn build(&self) -> Result<SternBrocotResolver> {
        SternBrocotResolver::new(self.max_relative_error_ppm, self.max_interval_ms)
    }
}

impl TryFrom<ResolverConfig> for SternBrocotResolver {
    type Error = BucketError;

    fn try_from(config: ResolverConfig) -> Result<Self> {
        config.build()
    }
}
