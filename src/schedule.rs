//! Conversion of a request rate into an integer refill schedule.
//!
//! A bucket for `rps` requests per second must gain `rps / 1000` tokens per
//! millisecond. Instead of refilling `rps` tokens once a second, the resolver
//! looks for the simplest fraction `refill_tokens / interval_ms` close to that
//! ratio, so low rates get long intervals and high rates get short ones, with
//! no fractional tokens carried between ticks.
//!
//! The search walks the Stern–Brocot tree with integer arithmetic only.
//! Consecutive moves in the same direction are taken as one batch, which
//! keeps the walk logarithmic even for very large rates.

use std::cmp::Ordering;
use std::time::Duration;

use crate::error::{BucketError, Result};
use crate::types::{Rate, Uint};

/// Tolerance used by [`SternBrocotResolver::default`], in parts per million.
pub const DEFAULT_MAX_RELATIVE_ERROR_PPM: u32 = 1_000;

/// Interval bound used by [`SternBrocotResolver::default`].
///
/// The exact fraction `rps / 1000` never needs a longer interval, so every
/// positive rate resolves under this bound.
pub const DEFAULT_MAX_INTERVAL_MS: Uint = 1_000;

const MILLIS_PER_SECOND: u128 = 1_000;
const PPM: u128 = 1_000_000;

/// Integer refill plan: add `refill_tokens` every `interval_ms` milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RefillSchedule {
    refill_tokens: Uint,
    interval_ms: Uint,
}

impl RefillSchedule {
    /// Creates a schedule, rejecting a zero amount or a zero interval.
    ///
    /// # Example
    ///
    /// ```rust
    /// use rate_guard_actor::RefillSchedule;
    ///
    /// let schedule = RefillSchedule::new(1, 100).unwrap();
    /// assert_eq!(schedule.interval().as_millis(), 100);
    /// assert!(RefillSchedule::new(0, 100).is_err());
    /// ```
    pub fn new(refill_tokens: Uint, interval_ms: Uint) -> Result<Self> {
        if refill_tokens == 0 {
            return Err(BucketError::Config(
                "refill_tokens must be greater than 0".into(),
            ));
        }
        if interval_ms == 0 {
            return Err(BucketError::Config(
                "interval_ms must be greater than 0".into(),
            ));
        }
        Ok(Self {
            refill_tokens,
            interval_ms,
        })
    }

    /// Tokens added per refill tick.
    #[inline(always)]
    pub fn refill_tokens(&self) -> Uint {
        self.refill_tokens
    }

    /// Milliseconds between refill ticks.
    #[inline(always)]
    pub fn interval_ms(&self) -> Uint {
        self.interval_ms
    }

    /// Milliseconds between refill ticks, as a [`Duration`].
    #[inline]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Strategy turning a rate into a refill schedule.
///
/// The actor calls this exactly once, while it is being created.
pub trait ScheduleResolver: Send + Sync {
    /// Returns the schedule for `rate`, or the reason none could be found.
    fn resolve(&self, rate: Rate) -> Result<RefillSchedule>;
}

/// A fixed schedule resolves every rate to itself.
impl ScheduleResolver for RefillSchedule {
    fn resolve(&self, _rate: Rate) -> Result<RefillSchedule> {
        Ok(*self)
    }
}

/// Best rational approximation of `rps / 1000` by a Stern–Brocot walk.
///
/// Returns the fraction with the smallest interval whose relative error is
/// strictly below `max_relative_error_ppm` parts per million (an exact match
/// always qualifies). When the rate is at least 1000 rps the whole-token
/// candidates with a 1 ms interval are compared first and the closer one wins,
/// so multiples of 1000 map to `(rps / 1000, 1)`.
///
/// # Example
///
/// ```rust
/// use rate_guard_actor::{Rate, ScheduleResolver, SternBrocotResolver};
///
/// let resolver = SternBrocotResolver::default();
/// let schedule = resolver.resolve(Rate::new(10).unwrap()).unwrap();
/// assert_eq!((schedule.refill_tokens(), schedule.interval_ms()), (1, 100));
///
/// let schedule = resolver.resolve(Rate::new(1500).unwrap()).unwrap();
/// assert_eq!((schedule.refill_tokens(), schedule.interval_ms()), (3, 2));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SternBrocotResolver {
    max_relative_error_ppm: u32,
    max_interval_ms: Uint,
}

impl Default for SternBrocotResolver {
    fn default() -> Self {
        Self {
            max_relative_error_ppm: DEFAULT_MAX_RELATIVE_ERROR_PPM,
            max_interval_ms: DEFAULT_MAX_INTERVAL_MS,
        }
    }
}

impl SternBrocotResolver {
    /// Creates a resolver with an explicit tolerance and interval bound.
    ///
    /// `max_relative_error_ppm` must be below 1_000_000 and
    /// `max_interval_ms` must be positive.
    pub fn new(max_relative_error_ppm: u32, max_interval_ms: Uint) -> Result<Self> {
        if u128::from(max_relative_error_ppm) >= PPM {
            return Err(BucketError::Config(format!(
                "max_relative_error_ppm must be below {PPM}, got {max_relative_error_ppm}"
            )));
        }
        if max_interval_ms == 0 {
            return Err(BucketError::Config(
                "max_interval_ms must be greater than 0".into(),
            ));
        }
        Ok(Self {
            max_relative_error_ppm,
            max_interval_ms,
        })
    }

    /// Resolver that only accepts the exact reduced fraction of `rps / 1000`.
    pub fn exact() -> Self {
        Self {
            max_relative_error_ppm: 0,
            ..Self::default()
        }
    }

    /// Accepted relative error, in parts per million.
    pub fn max_relative_error_ppm(&self) -> u32 {
        self.max_relative_error_ppm
    }

    /// Longest refill interval this resolver may return.
    pub fn max_interval_ms(&self) -> Uint {
        self.max_interval_ms
    }

    fn schedule(&self, rate: Rate, tokens: u128, interval: u128) -> Result<RefillSchedule> {
        let failure = || BucketError::ResolutionFailure {
            rps: rate.get(),
            max_interval_ms: self.max_interval_ms,
        };
        let interval_ms = Uint::try_from(interval).map_err(|_| failure())?;
        if interval_ms > self.max_interval_ms {
            return Err(failure());
        }
        let refill_tokens = Uint::try_from(tokens).map_err(|_| failure())?;
        RefillSchedule::new(refill_tokens, interval_ms)
    }
}

impl ScheduleResolver for SternBrocotResolver {
    fn resolve(&self, rate: Rate) -> Result<RefillSchedule> {
        let target = Target::new(rate, self.max_relative_error_ppm);
        let (rps, m) = (target.rps, MILLIS_PER_SECOND);

        // Bounds as (numerator, denominator); `lo` stays below the target and
        // `hi` above it.
        let (mut lo, mut hi) = if rps >= m {
            let whole = rps / m;
            if let Some(tokens) = target.nearest_whole(whole) {
                return self.schedule(rate, tokens, 1);
            }
            ((whole, 1), (whole + 1, 1))
        } else {
            ((0, 1), (1, 0))
        };

        loop {
            let (p, q) = (lo.0 + hi.0, lo.1 + hi.1);
            if q > u128::from(self.max_interval_ms) {
                return Err(BucketError::ResolutionFailure {
                    rps: rate.get(),
                    max_interval_ms: self.max_interval_ms,
                });
            }

            match (p * m).cmp(&(rps * q)) {
                Ordering::Equal => return self.schedule(rate, p, q),
                Ordering::Less => {
                    // Mediants lo + k*hi keep approaching from below.
                    let gap = rps * lo.1 - lo.0 * m;
                    let step = hi.0 * m - rps * hi.1;
                    let run = (gap - 1) / step;
                    let k = target.first_within(gap, step, lo.1, hi.1);
                    if k <= run {
                        return self.schedule(rate, lo.0 + k * hi.0, lo.1 + k * hi.1);
                    }
                    lo = (lo.0 + run * hi.0, lo.1 + run * hi.1);
                }
                Ordering::Greater => {
                    // Mediants hi + k*lo keep approaching from above.
                    let gap = hi.0 * m - rps * hi.1;
                    let step = rps * lo.1 - lo.0 * m;
                    let run = (gap - 1) / step;
                    let k = target.first_within(gap, step, hi.1, lo.1);
                    if k <= run {
                        return self.schedule(rate, hi.0 + k * lo.0, hi.1 + k * lo.1);
                    }
                    hi = (hi.0 + run * lo.0, hi.1 + run * lo.1);
                }
            }
        }
    }
}

/// The ratio `rps / 1000` together with the accepted relative error.
struct Target {
    rps: u128,
    tolerance_ppm: u128,
}

impl Target {
    fn new(rate: Rate, tolerance_ppm: u32) -> Self {
        Self {
            rps: u128::from(rate.get()),
            tolerance_ppm: u128::from(tolerance_ppm),
        }
    }

    /// `|p/q - rps/1000|` scaled by `1000 * q`.
    fn error(&self, p: u128, q: u128) -> u128 {
        (p * MILLIS_PER_SECOND).abs_diff(self.rps * q)
    }

    fn within(&self, p: u128, q: u128) -> bool {
        let error = self.error(p, q);
        error == 0 || error * PPM < self.tolerance_ppm * self.rps * q
    }

    /// Closer of `whole/1` and `(whole+1)/1`, if either is within tolerance.
    fn nearest_whole(&self, whole: u128) -> Option<u128> {
        [whole, whole + 1]
            .into_iter()
            .filter(|&p| p > 0 && self.within(p, 1))
            .min_by_key(|&p| self.error(p, 1))
    }

    /// Smallest `k >= 1` for which a candidate with error `gap - k * step`
    /// and interval `q0 + k * dq` is within tolerance.
    fn first_within(&self, gap: u128, step: u128, q0: u128, dq: u128) -> u128 {
        let lhs = gap * PPM;
        let rhs = self.tolerance_ppm * self.rps * q0;
        if lhs <= rhs {
            return 1;
        }
        (lhs - rhs) / (step * PPM + self.tolerance_ppm * self.rps * dq) + 1
    }
}

/// Resolves `rps` with the default [`SternBrocotResolver`].
///
/// # Example
///
/// ```rust
/// use rate_guard_actor::{resolve, BucketError};
///
/// let schedule = resolve(1000).unwrap();
/// assert_eq!((schedule.refill_tokens(), schedule.interval_ms()), (1, 1));
/// assert_eq!(resolve(0), Err(BucketError::InvalidRate(0)));
/// ```
pub fn resolve(rps: i64) -> Result<RefillSchedule> {
    SternBrocotResolver::default().resolve(Rate::new(rps)?)
}
