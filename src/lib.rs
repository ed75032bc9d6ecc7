//! A token bucket rate limiter hosted in its own actor task.
//!
//! Each bucket is a long-lived tokio task that owns a bounded token counter and
//! a single refill timer. Callers hold a cloneable [`TokenBucketHandle`] and ask
//! "may I proceed?"; every query consumes one token and is answered in the
//! order it reached the actor, so no token is ever handed out twice.
//!
//! # Quick Start
//!
//! ```rust
//! use rate_guard_actor::{TokenBucket, TokenBucketConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     // 10 requests per second: the bucket holds 10 tokens and gains one
//!     // every 100 ms.
//!     let bucket = TokenBucket::spawn(TokenBucketConfig::new(10)).unwrap();
//!     assert_eq!(bucket.schedule().refill_tokens(), 1);
//!     assert_eq!(bucket.schedule().interval_ms(), 100);
//!
//!     if bucket.query().await {
//!         println!("Request allowed");
//!     }
//! }
//! ```
//!
//! # Core Concepts
//!
//! ## Refill Schedule
//! The caller only supplies a rate. At creation the actor converts it into an
//! integer pair `(refill_tokens, interval_ms)` approximating `rps / 1000`
//! tokens per millisecond, using a Stern–Brocot search
//! ([`SternBrocotResolver`]). Low rates get long intervals (1 rps refills one
//! token per second), high rates get short ones, and no fractional tokens are
//! carried between ticks. The schedule never changes afterwards; a new rate
//! needs a new bucket.
//!
//! ## Timer Discipline
//! On every tick the actor re-arms its timer `interval_ms` from now before it
//! adds tokens. Exactly one refill is pending at any time, and a delayed tick
//! never turns into a backlog.
//!
//! ## Error Handling
//! Construction returns [`BucketError::InvalidRate`] for a non-positive rate,
//! [`BucketError::ResolutionFailure`] when no schedule fits the configured
//! interval bound, and [`BucketError::Config`] for bad hosting options. A live
//! bucket only ever answers `true` or `false`.
//!
//! ## Thread Safety
//! Handles are `Send + Sync + Clone`. Async callers use
//! [`query`](TokenBucketHandle::query); plain threads use
//! [`blocking_query`](TokenBucketHandle::blocking_query).

pub mod actor;
pub mod bucket_state;
pub mod config;
pub mod error;
pub mod schedule;
pub mod types;

pub use actor::{TokenBucket, TokenBucketHandle};
pub use bucket_state::{BucketSnapshot, BucketState};
pub use config::{ResolverConfig, TokenBucketConfig};
pub use error::{BucketError, Result};
pub use schedule::{resolve, RefillSchedule, ScheduleResolver, SternBrocotResolver};
pub use types::{Rate, Uint};
