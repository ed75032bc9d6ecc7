//! The token bucket actor and the handle used to talk to it.
//!
//! Each bucket lives in its own tokio task. The task owns the
//! [`BucketState`] and a single refill timer, and handles one event at a time:
//! either a message from the mailbox or a timer expiry. That serialization is
//! what makes every query an atomic read-modify-write without a lock.

use std::ops::ControlFlow;
use std::sync::Arc;

use log::{debug, trace, warn};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};

use crate::bucket_state::{BucketSnapshot, BucketState};
use crate::config::TokenBucketConfig;
use crate::error::{BucketError, Result};
use crate::schedule::{RefillSchedule, ScheduleResolver};
use crate::types::Uint;

#[derive(Debug)]
enum BucketMessage {
    Query {
        respond_to: oneshot::Sender<bool>,
    },
    Snapshot {
        respond_to: oneshot::Sender<BucketSnapshot>,
    },
    Stop {
        respond_to: oneshot::Sender<()>,
    },
}

struct TokenBucketActor {
    name: Arc<str>,
    state: BucketState,
    mailbox: mpsc::Receiver<BucketMessage>,
}

impl TokenBucketActor {
    async fn run(mut self, first_refill: Instant) {
        let interval = self.state.schedule().interval();
        let refill = time::sleep_until(first_refill);
        tokio::pin!(refill);

        loop {
            tokio::select! {
                () = &mut refill => {
                    // Re-arm before touching the counter so exactly one tick
                    // is pending, measured from now rather than from the
                    // missed deadline.
                    refill.as_mut().reset(Instant::now() + interval);
                    self.state.refill();
                    trace!(
                        "{}: refill #{} -> {}/{} tokens",
                        self.name,
                        self.state.refills(),
                        self.state.tokens(),
                        self.state.max_tokens()
                    );
                }
                message = self.mailbox.recv() => match message {
                    Some(message) => {
                        if self.handle_message(message).is_break() {
                            break;
                        }
                    }
                    // Every handle has been dropped.
                    None => break,
                },
            }
        }
        debug!("{}: stopped after {} refills", self.name, self.state.refills());
    }

    fn handle_message(&mut self, message: BucketMessage) -> ControlFlow<()> {
        match message {
            BucketMessage::Query { respond_to } => {
                let was_not_empty = self.state.consume();
                trace!(
                    "{}: query -> {was_not_empty}, {} tokens left",
                    self.name,
                    self.state.tokens()
                );
                // The caller may have given up waiting; the token stays consumed.
                let _ = respond_to.send(was_not_empty);
                ControlFlow::Continue(())
            }
            BucketMessage::Snapshot { respond_to } => {
                let _ = respond_to.send(self.state.snapshot());
                ControlFlow::Continue(())
            }
            BucketMessage::Stop { respond_to } => {
                let _ = respond_to.send(());
                ControlFlow::Break(())
            }
        }
    }
}

/// Entry point for creating token bucket actors.
///
/// Creation resolves the refill schedule, fills the bucket, arms the first
/// refill timer and spawns the actor task. Any failure is returned before a
/// task exists, so an `Err` never leaves a running actor behind.
///
/// # Example
///
/// ```rust
/// use rate_guard_actor::{TokenBucket, TokenBucketConfig};
///
/// #[tokio::main]
/// async fn main() {
///     let bucket = TokenBucket::spawn(TokenBucketConfig::new(2)).unwrap();
///
///     assert!(bucket.query().await);
///     assert!(bucket.query().await);
///     assert!(!bucket.query().await);
/// }
/// ```
pub struct TokenBucket;

impl TokenBucket {
    /// Spawns a bucket on the current tokio runtime with the resolver
    /// described by `config.resolver`.
    pub fn spawn(config: TokenBucketConfig) -> Result<TokenBucketHandle> {
        let resolver = config.resolver.build()?;
        Self::spawn_with_resolver_on(config, &resolver, &current_runtime()?)
    }

    /// Spawns a bucket on the given runtime.
    pub fn spawn_on(config: TokenBucketConfig, runtime: &Handle) -> Result<TokenBucketHandle> {
        let resolver = config.resolver.build()?;
        Self::spawn_with_resolver_on(config, &resolver, runtime)
    }

    /// Spawns a bucket on the current tokio runtime with a custom resolver.
    ///
    /// `config.resolver` is ignored.
    pub fn spawn_with_resolver<R>(config: TokenBucketConfig, resolver: &R) -> Result<TokenBucketHandle>
    where
        R: ScheduleResolver + ?Sized,
    {
        Self::spawn_with_resolver_on(config, resolver, &current_runtime()?)
    }

    /// Spawns a bucket on the given runtime with a custom resolver.
    ///
    /// Every other `spawn*` function delegates here. `config.resolver` is ignored.
    pub fn spawn_with_resolver_on<R>(
        config: TokenBucketConfig,
        resolver: &R,
        runtime: &Handle,
    ) -> Result<TokenBucketHandle>
    where
        R: ScheduleResolver + ?Sized,
    {
        let rate = config.rate()?;
        config.validate()?;
        let schedule = resolver.resolve(rate).map_err(|e| {
            warn!("{}: {e}", config.label());
            e
        })?;

        let _guard = runtime.enter();
        let first_refill = Instant::now()
            .checked_add(schedule.interval())
            .ok_or_else(|| {
                BucketError::Config(format!(
                    "{}: refill interval of {} ms is too long",
                    config.label(),
                    schedule.interval_ms()
                ))
            })?;

        let name: Arc<str> = Arc::from(config.label());
        let state = BucketState::new(rate, schedule);
        let (sender, mailbox) = mpsc::channel(config.mailbox_capacity);

        debug!(
            "{name}: spawned for {rate}, refilling {} token(s) every {} ms",
            schedule.refill_tokens(),
            schedule.interval_ms()
        );
        let actor = TokenBucketActor {
            name: name.clone(),
            state,
            mailbox,
        };
        runtime.spawn(actor.run(first_refill));

        Ok(TokenBucketHandle {
            sender,
            name,
            max_tokens: rate.get(),
            schedule,
        })
    }
}

fn current_runtime() -> Result<Handle> {
    Handle::try_current().map_err(|e| BucketError::Config(format!("No tokio runtime: {e}")))
}

/// Cloneable reference to a live token bucket actor.
///
/// Any number of clones may query concurrently; the actor answers them one
/// at a time in arrival order. The actor stops when
/// [`shutdown`](TokenBucketHandle::shutdown) is called or when the last handle
/// is dropped.
#[derive(Debug, Clone)]
pub struct TokenBucketHandle {
    sender: mpsc::Sender<BucketMessage>,
    name: Arc<str>,
    max_tokens: Uint,
    schedule: RefillSchedule,
}

impl TokenBucketHandle {
    /// Consumes a token if one is available.
    ///
    /// Returns `true` when the bucket was not empty. A stopped actor answers
    /// `false`.
    pub async fn query(&self) -> bool {
        self.try_query().await.unwrap_or_else(|e| self.denied(e))
    }

    /// Like [`query`](TokenBucketHandle::query), but reports a stopped actor
    /// as [`BucketError::Stopped`].
    pub async fn try_query(&self) -> Result<bool> {
        self.request(|respond_to| BucketMessage::Query { respond_to })
            .await
    }

    /// Blocking variant of [`query`](TokenBucketHandle::query) for threads
    /// outside the async runtime.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context.
    pub fn blocking_query(&self) -> bool {
        self.try_blocking_query().unwrap_or_else(|e| self.denied(e))
    }

    /// Blocking variant of [`try_query`](TokenBucketHandle::try_query).
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context.
    pub fn try_blocking_query(&self) -> Result<bool> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .blocking_send(BucketMessage::Query { respond_to })
            .map_err(|_| BucketError::Stopped)?;
        response.blocking_recv().map_err(|_| BucketError::Stopped)
    }

    /// Reads the bucket state without consuming a token.
    pub async fn snapshot(&self) -> Result<BucketSnapshot> {
        self.request(|respond_to| BucketMessage::Snapshot { respond_to })
            .await
    }

    /// Stops the actor once the messages queued ahead of this one are handled.
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|respond_to| BucketMessage::Stop { respond_to })
            .await
    }

    /// Returns `true` once the actor task has terminated.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Log label of the bucket.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bucket capacity, equal to the requested rate.
    pub fn max_tokens(&self) -> Uint {
        self.max_tokens
    }

    /// Refill schedule resolved at creation.
    pub fn schedule(&self) -> RefillSchedule {
        self.schedule
    }

    async fn request<T>(&self, message: impl FnOnce(oneshot::Sender<T>) -> BucketMessage) -> Result<T> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(message(respond_to))
            .await
            .map_err(|_| BucketError::Stopped)?;
        response.await.map_err(|_| BucketError::Stopped)
    }

    fn denied(&self, e: BucketError) -> bool {
        warn!("{}: query denied: {e}", self.name);
        false
    }
}
