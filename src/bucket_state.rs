use serde::Serialize;

use crate::schedule::RefillSchedule;
use crate::types::{Rate, Uint};

/// Mutable state of one token bucket.
///
/// The state is owned by exactly one actor task, which applies every
/// [`consume`](BucketState::consume) and [`refill`](BucketState::refill) in
/// the order its mailbox and timer deliver them. Both operations are clamped
/// integer updates, so `0 <= tokens <= max_tokens` holds after each of them.
///
/// # Algorithm Behavior
///
/// - The bucket starts full with `max_tokens` tokens (the requested rate)
/// - Each query consumes one token, saturating at zero
/// - Each refill tick adds `refill_tokens`, capped at `max_tokens`
///
/// # Example
///
/// ```rust
/// use rate_guard_actor::{BucketState, Rate, RefillSchedule};
///
/// let schedule = RefillSchedule::new(1, 100).unwrap();
/// let mut state = BucketState::new(Rate::new(2).unwrap(), schedule);
///
/// assert!(state.consume());
/// assert!(state.consume());
/// assert!(!state.consume());
///
/// state.refill();
/// assert_eq!(state.tokens(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketState {
    /// Capacity ceiling, equal to the requested rate
    max_tokens: Uint,
    /// Tokens currently available
    tokens: Uint,
    /// Refill amount and cadence, fixed at creation
    schedule: RefillSchedule,
    /// Number of refill ticks applied so far
    refills: u64,
}

impl BucketState {
    /// Creates a full bucket for `rate` refilled according to `schedule`.
    pub fn new(rate: Rate, schedule: RefillSchedule) -> Self {
        BucketState {
            max_tokens: rate.get(),
            tokens: rate.get(), // Bucket starts full
            schedule,
            refills: 0,
        }
    }

    /// Consumes one token.
    ///
    /// Returns `true` if a token was available before the call. The counter is
    /// decremented unconditionally and saturates at zero, so an empty bucket
    /// stays empty and answers `false`.
    #[inline]
    pub fn consume(&mut self) -> bool {
        let was_not_empty = self.tokens > 0;
        self.tokens = self.tokens.saturating_sub(1);
        was_not_empty
    }

    /// Applies one refill tick: adds `refill_tokens`, capped at `max_tokens`.
    #[inline]
    pub fn refill(&mut self) {
        self.tokens = self
            .tokens
            .saturating_add(self.schedule.refill_tokens())
            .min(self.max_tokens);
        self.refills = self.refills.wrapping_add(1);
    }

    /// Tokens currently available.
    #[inline(always)]
    pub fn tokens(&self) -> Uint {
        self.tokens
    }

    /// Capacity ceiling, equal to the requested rate.
    #[inline(always)]
    pub fn max_tokens(&self) -> Uint {
        self.max_tokens
    }

    /// Refill schedule fixed at creation.
    #[inline(always)]
    pub fn schedule(&self) -> RefillSchedule {
        self.schedule
    }

    /// Number of refill ticks applied so far.
    #[inline(always)]
    pub fn refills(&self) -> u64 {
        self.refills
    }

    /// Copies the current state for inspection.
    pub fn snapshot(&self) -> BucketSnapshot {
        BucketSnapshot {
            tokens: self.tokens,
            max_tokens: self.max_tokens,
            refill_tokens: self.schedule.refill_tokens(),
            interval_ms: self.schedule.interval_ms(),
            refills: self.refills,
        }
    }
}

/// Point-in-time copy of a bucket's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BucketSnapshot {
    pub tokens: Uint,
    pub max_tokens: Uint,
    pub refill_tokens: Uint,
    pub interval_ms: Uint,
    /// Refill ticks applied since the bucket was created.
    pub refills: u64,
}
