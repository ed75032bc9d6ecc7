//! Integer types shared by the resolver, the bucket state and the actor.
//!
//! Token counts and millisecond intervals are both expressed as [`Uint`].
//! A requested rate is carried as a [`Rate`], which can only hold a positive
//! number of requests per second.

use std::fmt;
use std::num::NonZeroU64;

use crate::error::{BucketError, Result};

/// Alias for the unsigned integer type used for token counts and milliseconds.
///
/// Maps to [`u64`], which leaves plenty of headroom for the `u128`
/// intermediate products computed by the schedule resolver.
pub type Uint = u64;

/// A validated request rate, in requests per second.
///
/// The rate doubles as the bucket capacity: a bucket created for `Rate(10)`
/// holds at most 10 tokens.
///
/// # Example
///
/// ```rust
/// use rate_guard_actor::{BucketError, Rate};
///
/// assert_eq!(Rate::new(10).unwrap().get(), 10);
/// assert_eq!(Rate::new(0), Err(BucketError::InvalidRate(0)));
/// assert_eq!(Rate::new(-5), Err(BucketError::InvalidRate(-5)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rate(NonZeroU64);

impl Rate {
    /// Validates `rps`, rejecting zero and negative values with
    /// [`BucketError::InvalidRate`].
    pub fn new(rps: i64) -> Result<Self> {
        u64::try_from(rps)
            .ok()
            .and_then(NonZeroU64::new)
            .map(Rate)
            .ok_or(BucketError::InvalidRate(rps))
    }

    /// Requests per second.
    #[inline(always)]
    pub fn get(self) -> Uint {
        self.0.get()
    }
}

impl TryFrom<i64> for Rate {
    type Error = BucketError;

    fn try_from(rps: i64) -> Result<Self> {
        Rate::new(rps)
    }
}

impl TryFrom<u64> for Rate {
    type Error = BucketError;

    fn try_from(rps: u64) -> Result<Self> {
        NonZeroU64::new(rps)
            .map(Rate)
            .ok_or(BucketError::InvalidRate(0))
    }
}

impl From<NonZeroU64> for Rate {
    fn from(rps: NonZeroU64) -> Self {
        Rate(rps)
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} rps", self.0)
    }
}
