//! Retrying decorator over one-shot promises.
//!
//! Semantics:
//! - `max_attempts` counts total attempts (initial try + retries) and must be
//!   at least 1; zero is rejected before the factory is ever invoked.
//! - Retries are immediate: no delay, no backoff. Each retry is a brand-new
//!   promise from the factory; a completed attempt is never re-subscribed.
//! - The final outcome is exactly the last attempt's result. Intermediate
//!   failures flow through telemetry, then get discarded.
//! - Attempts run strictly one after another inside a single driver task;
//!   attempt N+1 is not requested until attempt N has completed.
//! - Consumers wait for settlement on the blocking pool, never on a runtime
//!   worker thread.
//!
//! Invariants:
//! - The factory is invoked at most `max_attempts` times, always serially.
//! - The settlement gate opens exactly once per sequence.
//! - Subscribing any number of consumers runs the attempt sequence once in
//!   total.
//!
//! Example
//! ```rust
//! use mulligan::{Promise, Retryable};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let calls = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&calls);
//! let retryable = Retryable::new(
//!     move || {
//!         let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
//!         Promise::from_future(async move {
//!             if attempt < 2 {
//!                 Err(format!("attempt {attempt} failed"))
//!             } else {
//!                 Ok("ready")
//!             }
//!         })
//!     },
//!     3,
//! )
//! .unwrap();
//! assert_eq!(retryable.promise().await.unwrap(), "ready");
//! assert_eq!(calls.load(Ordering::SeqCst), 2);
//! # });
//! ```

use crate::error::RetryError;
use crate::gate::Gate;
use crate::promise::{CachedPromise, Promise, Release, SuccessOnly, Throttle};
use crate::telemetry::{emit_best_effort, LogSink, RetryEvent, TelemetrySink};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::Service;

/// Errors produced while constructing a retryable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// `max_attempts` must be > 0.
    InvalidMaxAttempts(usize),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::InvalidMaxAttempts(n) => {
                write!(f, "max_attempts must be > 0 (got {})", n)
            }
        }
    }
}

impl std::error::Error for BuildError {}

/// A bounded retry sequence over factory-produced promises.
///
/// Construction dispatches the first attempt; the sequence then drives
/// itself to settlement whether or not the handle is kept around. Handles
/// are cheap to clone and every consumer observes the same final outcome.
pub struct Retryable<T, E> {
    gate: Arc<Gate<Result<T, RetryError<E>>>>,
    cancelled: Arc<AtomicBool>,
    max_attempts: usize,
}

impl<T, E> Clone for Retryable<T, E> {
    fn clone(&self) -> Self {
        Self {
            gate: Arc::clone(&self.gate),
            cancelled: Arc::clone(&self.cancelled),
            max_attempts: self.max_attempts,
        }
    }
}

impl<T, E> fmt::Debug for Retryable<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retryable")
            .field("max_attempts", &self.max_attempts)
            .field("settled", &self.gate.is_open())
            .finish()
    }
}

impl<T, E> Retryable<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Start a retry sequence with up to `max_attempts` total attempts.
    ///
    /// The first attempt is requested from `factory` before this returns.
    /// Must be called within a tokio runtime.
    pub fn new<F>(factory: F, max_attempts: usize) -> Result<Self, BuildError>
    where
        F: FnMut() -> Promise<T, E> + Send + 'static,
    {
        Self::builder(factory).max_attempts(max_attempts).start()
    }

    /// Construct a new builder with defaults.
    pub fn builder<F>(factory: F) -> RetryableBuilder<F, LogSink>
    where
        F: FnMut() -> Promise<T, E> + Send + 'static,
    {
        RetryableBuilder { factory, max_attempts: 3, attempt_timeout: None, sink: LogSink }
    }

    /// Whether the sequence has settled.
    pub fn is_settled(&self) -> bool {
        self.gate.is_open()
    }

    /// Configured attempt bound.
    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Suppress further attempts.
    ///
    /// The in-flight attempt still runs to completion; a success still
    /// settles the sequence. Only the dispatch of the next attempt is
    /// preempted, settling with [`RetryError::Cancelled`].
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

impl<T, E> Retryable<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Non-blocking peek at the settled outcome.
    pub fn try_outcome(&self) -> Option<Result<T, RetryError<E>>> {
        self.gate.try_get()
    }

    /// Proxy promise over the final outcome.
    ///
    /// Resolution waits for the sequence to settle (off the runtime worker
    /// threads), then forwards the last attempt's result. Already-settled
    /// sequences resolve without touching the blocking pool.
    pub fn promise(&self) -> Promise<T, RetryError<E>> {
        let gate = Arc::clone(&self.gate);
        Promise::from_future(async move {
            if let Some(settled) = gate.try_get() {
                return settled;
            }
            tokio::task::spawn_blocking(move || gate.wait())
                .await
                .expect("settlement waiter panicked")
        })
    }

    // Operator forwarding: every call mints a fresh proxy over the same
    // gate, so the attempt sequence runs once no matter how many consumers
    // subscribe.

    /// Transform the final value.
    pub fn map<U, F>(&self, transform: F) -> Promise<U, RetryError<E>>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.promise().map(transform)
    }

    /// Continue with another promise produced from the final value.
    pub fn and_then<U, F>(&self, transform: F) -> Promise<U, RetryError<E>>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Promise<U, RetryError<E>> + Send + 'static,
    {
        self.promise().and_then(transform)
    }

    /// Transform the final value on the blocking pool.
    pub fn blocking_map<U, F>(&self, transform: F) -> Promise<U, RetryError<E>>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.promise().blocking_map(transform)
    }

    /// Divert a matching final value into `action`.
    pub fn route<P, A>(&self, predicate: P, action: A) -> Promise<Option<T>, RetryError<E>>
    where
        P: FnOnce(&T) -> bool + Send + 'static,
        A: FnOnce(T) + Send + 'static,
    {
        self.promise().route(predicate, action)
    }

    /// Observe the final outcome without altering it.
    pub fn wiretap<W>(&self, listener: W) -> Promise<T, RetryError<E>>
    where
        W: FnOnce(&Result<T, RetryError<E>>) + Send + 'static,
    {
        self.promise().wiretap(listener)
    }

    /// Run `hook` when a consumer starts awaiting the outcome.
    pub fn on_yield<F>(&self, hook: F) -> Promise<T, RetryError<E>>
    where
        F: FnOnce() + Send + 'static,
    {
        self.promise().on_yield(hook)
    }

    /// Park a consumer until the handed-out [`Release`] fires.
    pub fn defer<F>(&self, releaser: F) -> Promise<T, RetryError<E>>
    where
        F: FnOnce(Release) + Send + 'static,
    {
        self.promise().defer(releaser)
    }

    /// Cap concurrent consumption with a shared [`Throttle`].
    pub fn throttled(&self, throttle: &Throttle) -> Promise<T, RetryError<E>> {
        self.promise().throttled(throttle)
    }

    /// Memoized view of the final outcome.
    pub fn cache(&self) -> CachedPromise<T, RetryError<E>> {
        self.promise().cache()
    }

    /// Split off the failure channel into `handler`; see
    /// [`Promise::on_error`].
    pub fn on_error<H>(&self, handler: H) -> Promise<Option<T>, RetryError<E>, SuccessOnly>
    where
        H: FnOnce(RetryError<E>) + Send + 'static,
    {
        self.promise().on_error(handler)
    }
}

/// Builder for [`Retryable`].
pub struct RetryableBuilder<F, S> {
    factory: F,
    max_attempts: usize,
    attempt_timeout: Option<Duration>,
    sink: S,
}

impl<F, S> RetryableBuilder<F, S> {
    /// Set total attempts (initial + retries). Must be > 0.
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Per-attempt deadline.
    ///
    /// An attempt exceeding the limit counts as a failed attempt and is
    /// retried like any other failure; on the last attempt the timeout is
    /// what gets surfaced. Default: no deadline, so an attempt that never
    /// settles stalls the sequence forever.
    pub fn attempt_timeout(mut self, limit: Duration) -> Self {
        self.attempt_timeout = Some(limit);
        self
    }

    /// Replace the telemetry sink receiving state-transition events.
    pub fn telemetry<S2>(self, sink: S2) -> RetryableBuilder<F, S2> {
        RetryableBuilder {
            factory: self.factory,
            max_attempts: self.max_attempts,
            attempt_timeout: self.attempt_timeout,
            sink,
        }
    }

    /// Validate the configuration, dispatch the first attempt, and hand
    /// back the controller.
    pub fn start<T, E>(self) -> Result<Retryable<T, E>, BuildError>
    where
        T: Send + 'static,
        E: Send + 'static,
        F: FnMut() -> Promise<T, E> + Send + 'static,
        S: TelemetrySink,
        <S as Service<RetryEvent>>::Future: Send + 'static,
    {
        let RetryableBuilder { mut factory, max_attempts, attempt_timeout, sink } = self;
        if max_attempts == 0 {
            return Err(BuildError::InvalidMaxAttempts(0));
        }

        let gate = Arc::new(Gate::new());
        let cancelled = Arc::new(AtomicBool::new(false));

        // Attempt 1 is requested synchronously; retries come out of the
        // driver task.
        let first = factory();
        drive(
            first,
            factory,
            max_attempts,
            attempt_timeout,
            Arc::clone(&gate),
            Arc::clone(&cancelled),
            sink,
        );

        Ok(Retryable { gate, cancelled, max_attempts })
    }
}

fn drive<T, E, F, S>(
    first: Promise<T, E>,
    mut factory: F,
    max_attempts: usize,
    attempt_timeout: Option<Duration>,
    gate: Arc<Gate<Result<T, RetryError<E>>>>,
    cancelled: Arc<AtomicBool>,
    sink: S,
) where
    T: Send + 'static,
    E: Send + 'static,
    F: FnMut() -> Promise<T, E> + Send + 'static,
    S: TelemetrySink,
    <S as Service<RetryEvent>>::Future: Send + 'static,
{
    tokio::spawn(async move {
        let started = Instant::now();
        let mut attempt = first;
        let mut used = 0usize;

        let settled = loop {
            used += 1;
            emit_best_effort(sink.clone(), RetryEvent::Dispatched { attempt: used }).await;

            match run_attempt(attempt, attempt_timeout).await {
                Ok(value) => {
                    emit_best_effort(
                        sink.clone(),
                        RetryEvent::Succeeded { attempts: used, elapsed: started.elapsed() },
                    )
                    .await;
                    break Ok(value);
                }
                Err(failure) => {
                    if used == max_attempts {
                        emit_best_effort(
                            sink.clone(),
                            RetryEvent::Exhausted { attempts: used, elapsed: started.elapsed() },
                        )
                        .await;
                        break Err(failure);
                    }
                    if cancelled.load(Ordering::Acquire) {
                        emit_best_effort(sink.clone(), RetryEvent::Cancelled { attempts: used })
                            .await;
                        break Err(RetryError::Cancelled);
                    }
                    emit_best_effort(sink.clone(), RetryEvent::Retrying { failed_attempt: used })
                        .await;
                    attempt = factory();
                }
            }
        };

        gate.open(settled);
    });
}

async fn run_attempt<T, E>(
    attempt: Promise<T, E>,
    limit: Option<Duration>,
) -> Result<T, RetryError<E>>
where
    T: Send + 'static,
    E: Send + 'static,
{
    match limit {
        Some(limit) => {
            let dispatched = Instant::now();
            match tokio::time::timeout(limit, attempt).await {
                Ok(outcome) => outcome.map_err(RetryError::Attempt),
                Err(_) => {
                    Err(RetryError::Timeout { elapsed: dispatched.elapsed(), timeout: limit })
                }
            }
        }
        None => attempt.await.map_err(RetryError::Attempt),
    }
}
