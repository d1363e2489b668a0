//! One-shot async values with a composable operator surface.
//!
//! A [`Promise`] wraps a single eventually-available `Result<V, Err>`.
//! Subscribing is a move: every operator and the terminal `.await` consume
//! the promise, so a value can be observed at most once per chain.
//!
//! The capability parameter selects the exposed operator subset. `Full`
//! promises carry the whole surface. The [`SuccessOnly`] projection returned
//! by [`Promise::on_error`] drops the failure channel: registering a second
//! failure handler or a second terminal consumer on it is rejected at
//! compile time. Transform operators re-widen to `Full`, so a projection's
//! derived values are ordinary promises again.

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use std::fmt;
use std::future::{Future, IntoFuture};
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::{oneshot, Semaphore};

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Full {}
    impl Sealed for super::SuccessOnly {}
}

/// Marker for the operator subset a promise exposes.
pub trait Capability: sealed::Sealed + Send + Sync + 'static {}

/// Full surface: transforms, error split, and terminal await.
#[derive(Debug, Clone, Copy)]
pub struct Full;

impl Capability for Full {}

/// Success-only projection: transforms only, no further failure handler and
/// no terminal consumer.
#[derive(Debug, Clone, Copy)]
pub struct SuccessOnly;

impl Capability for SuccessOnly {}

/// A single eventually-available `Result<V, Err>`.
pub struct Promise<V, Err, C: Capability = Full> {
    fut: BoxFuture<'static, Result<V, Err>>,
    _cap: PhantomData<fn() -> C>,
}

impl<V, Err, C: Capability> fmt::Debug for Promise<V, Err, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise").field("state", &"<pending>").finish()
    }
}

impl<V, Err> Promise<V, Err>
where
    V: Send + 'static,
    Err: Send + 'static,
{
    /// Lift a fallible future into a promise.
    pub fn from_future<F>(fut: F) -> Self
    where
        F: Future<Output = Result<V, Err>> + Send + 'static,
    {
        Self { fut: Box::pin(fut), _cap: PhantomData }
    }

    /// Promise over an already-settled outcome.
    pub fn settled(outcome: Result<V, Err>) -> Self {
        Self::from_future(std::future::ready(outcome))
    }

    /// Promise that resolves to `value`.
    pub fn value(value: V) -> Self {
        Self::settled(Ok(value))
    }

    /// Promise that fails with `error`.
    pub fn fault(error: Err) -> Self {
        Self::settled(Err(error))
    }

    /// Split off the failure channel.
    ///
    /// A failure is consumed by `handler` and the resulting projection
    /// yields `None` in its place; a success yields `Some(value)`. The
    /// projection exposes no further `on_error` and no terminal await.
    pub fn on_error<H>(self, handler: H) -> Promise<Option<V>, Err, SuccessOnly>
    where
        H: FnOnce(Err) + Send + 'static,
    {
        let fut = self.fut;
        Promise::wrap(async move {
            match fut.await {
                Ok(value) => Ok(Some(value)),
                Err(error) => {
                    handler(error);
                    Ok(None)
                }
            }
        })
    }
}

impl<V, Err, C: Capability> Promise<V, Err, C>
where
    V: Send + 'static,
    Err: Send + 'static,
{
    fn wrap<F>(fut: F) -> Self
    where
        F: Future<Output = Result<V, Err>> + Send + 'static,
    {
        Self { fut: Box::pin(fut), _cap: PhantomData }
    }

    /// Transform the settled value.
    pub fn map<U, F>(self, transform: F) -> Promise<U, Err>
    where
        U: Send + 'static,
        F: FnOnce(V) -> U + Send + 'static,
    {
        let fut = self.fut;
        Promise::wrap(async move { fut.await.map(transform) })
    }

    /// Continue with another promise produced from the settled value.
    pub fn and_then<U, F>(self, transform: F) -> Promise<U, Err>
    where
        U: Send + 'static,
        F: FnOnce(V) -> Promise<U, Err> + Send + 'static,
    {
        let fut = self.fut;
        Promise::wrap(async move {
            match fut.await {
                Ok(value) => transform(value).fut.await,
                Err(error) => Err(error),
            }
        })
    }

    /// Transform the settled value on the blocking pool.
    pub fn blocking_map<U, F>(self, transform: F) -> Promise<U, Err>
    where
        U: Send + 'static,
        F: FnOnce(V) -> U + Send + 'static,
    {
        let fut = self.fut;
        Promise::wrap(async move {
            match fut.await {
                Ok(value) => {
                    let mapped = tokio::task::spawn_blocking(move || transform(value))
                        .await
                        .expect("blocking transform panicked");
                    Ok(mapped)
                }
                Err(error) => Err(error),
            }
        })
    }

    /// Divert values matching `predicate` into `action`.
    ///
    /// A diverted value is consumed by `action` and the resulting promise
    /// yields `None` in its place; unmatched values yield `Some(value)`.
    pub fn route<P, A>(self, predicate: P, action: A) -> Promise<Option<V>, Err>
    where
        P: FnOnce(&V) -> bool + Send + 'static,
        A: FnOnce(V) + Send + 'static,
    {
        let fut = self.fut;
        Promise::wrap(async move {
            match fut.await {
                Ok(value) => {
                    if predicate(&value) {
                        action(value);
                        Ok(None)
                    } else {
                        Ok(Some(value))
                    }
                }
                Err(error) => Err(error),
            }
        })
    }

    /// Observe the settled result without altering it.
    pub fn wiretap<W>(self, listener: W) -> Promise<V, Err>
    where
        W: FnOnce(&Result<V, Err>) + Send + 'static,
    {
        let fut = self.fut;
        Promise::wrap(async move {
            let settled = fut.await;
            listener(&settled);
            settled
        })
    }

    /// Run `hook` when the chain starts executing.
    pub fn on_yield<F>(self, hook: F) -> Promise<V, Err>
    where
        F: FnOnce() + Send + 'static,
    {
        let fut = self.fut;
        Promise::wrap(async move {
            hook();
            fut.await
        })
    }

    /// Park execution until the handed-out [`Release`] fires.
    ///
    /// `releaser` runs when the chain starts executing. Dropping the
    /// `Release` without firing it also releases the promise.
    pub fn defer<F>(self, releaser: F) -> Promise<V, Err>
    where
        F: FnOnce(Release) + Send + 'static,
    {
        let fut = self.fut;
        Promise::wrap(async move {
            let (signal, released) = oneshot::channel();
            releaser(Release { signal });
            let _ = released.await;
            fut.await
        })
    }

    /// Cap concurrent execution with a shared [`Throttle`].
    pub fn throttled(self, throttle: &Throttle) -> Promise<V, Err> {
        let permits = Arc::clone(&throttle.permits);
        let fut = self.fut;
        Promise::wrap(async move {
            let _permit =
                permits.acquire_owned().await.expect("throttle never closes its semaphore");
            fut.await
        })
    }

    /// Memoize the outcome: the computation runs once and every subscriber
    /// gets a clone of the settled result.
    pub fn cache(self) -> CachedPromise<V, Err>
    where
        V: Clone,
        Err: Clone,
    {
        CachedPromise { shared: self.fut.shared() }
    }
}

impl<U, Err, C: Capability> Promise<Option<U>, Err, C>
where
    U: Send + 'static,
    Err: Send + 'static,
{
    /// Null-guard: run `action` when the settled value is absent.
    pub fn on_null<A>(self, action: A) -> Promise<Option<U>, Err>
    where
        A: FnOnce() + Send + 'static,
    {
        let fut = self.fut;
        Promise::wrap(async move {
            match fut.await {
                Ok(None) => {
                    action();
                    Ok(None)
                }
                settled => settled,
            }
        })
    }
}

/// Awaiting is the one-time subscription to a full-capability promise.
impl<V, Err> IntoFuture for Promise<V, Err>
where
    V: Send + 'static,
    Err: Send + 'static,
{
    type Output = Result<V, Err>;
    type IntoFuture = BoxFuture<'static, Result<V, Err>>;

    fn into_future(self) -> Self::IntoFuture {
        self.fut
    }
}

/// A memoized promise backed by a shared future.
pub struct CachedPromise<V, Err> {
    shared: Shared<BoxFuture<'static, Result<V, Err>>>,
}

impl<V, Err> Clone for CachedPromise<V, Err> {
    fn clone(&self) -> Self {
        Self { shared: self.shared.clone() }
    }
}

impl<V, Err> fmt::Debug for CachedPromise<V, Err> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedPromise").finish_non_exhaustive()
    }
}

impl<V, Err> CachedPromise<V, Err>
where
    V: Clone + Send + Sync + 'static,
    Err: Clone + Send + Sync + 'static,
{
    /// Mint a promise over the memoized outcome.
    ///
    /// The `Sync` bounds come from the shared future: the settled outcome is
    /// cloned out to subscribers on arbitrary threads.
    pub fn promise(&self) -> Promise<V, Err> {
        Promise::wrap(self.shared.clone())
    }
}

/// Caps how many throttled promises may execute concurrently.
#[derive(Clone, Debug)]
pub struct Throttle {
    permits: Arc<Semaphore>,
}

impl Throttle {
    /// Throttle admitting `size` concurrent executions.
    pub fn new(size: usize) -> Self {
        Self { permits: Arc::new(Semaphore::new(size)) }
    }

    /// Effectively unbounded: one billion concurrent executions.
    pub fn unlimited() -> Self {
        Self::new(1_000_000_000)
    }
}

/// Handle that releases a deferred promise.
#[derive(Debug)]
pub struct Release {
    signal: oneshot::Sender<()>,
}

impl Release {
    /// Allow the deferred promise to start executing.
    pub fn release(self) {
        let _ = self.signal.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[tokio::test]
    async fn map_transforms_value() {
        let doubled = Promise::<i32, String>::value(21).map(|v| v * 2).await;
        assert_eq!(doubled, Ok(42));
    }

    #[tokio::test]
    async fn map_passes_failure_through() {
        let outcome = Promise::<i32, String>::fault("boom".into()).map(|v| v * 2).await;
        assert_eq!(outcome, Err("boom".to_string()));
    }

    #[tokio::test]
    async fn and_then_chains_promises() {
        let outcome = Promise::<i32, String>::value(3)
            .and_then(|v| Promise::value(v + 4))
            .map(|v| v * 10)
            .await;
        assert_eq!(outcome, Ok(70));
    }

    #[tokio::test]
    async fn and_then_skips_on_failure() {
        let invoked = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&invoked);
        let outcome = Promise::<i32, String>::fault("nope".into())
            .and_then(move |v| {
                flag.store(true, Ordering::SeqCst);
                Promise::value(v)
            })
            .await;
        assert_eq!(outcome, Err("nope".to_string()));
        assert!(!invoked.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn blocking_map_transforms_off_the_runtime() {
        let outcome = Promise::<i32, String>::value(6).blocking_map(|v| v * 7).await;
        assert_eq!(outcome, Ok(42));
    }

    #[tokio::test]
    async fn route_diverts_matching_value() {
        let diverted = Arc::new(Mutex::new(None));
        let capture = Arc::clone(&diverted);
        let outcome = Promise::<i32, String>::value(42)
            .route(|v| *v == 42, move |v| *capture.lock().unwrap() = Some(v))
            .await;
        assert_eq!(outcome, Ok(None));
        assert_eq!(*diverted.lock().unwrap(), Some(42));
    }

    #[tokio::test]
    async fn route_passes_unmatched_value() {
        let outcome = Promise::<i32, String>::value(7)
            .route(|v| *v == 42, |_| panic!("should not divert"))
            .await;
        assert_eq!(outcome, Ok(Some(7)));
    }

    #[tokio::test]
    async fn on_null_observes_missing_value() {
        let observed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&observed);
        let outcome = Promise::<Option<i32>, String>::value(None)
            .on_null(move || flag.store(true, Ordering::SeqCst))
            .await;
        assert_eq!(outcome, Ok(None));
        assert!(observed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn on_null_skips_present_value() {
        let outcome = Promise::<Option<i32>, String>::value(Some(5))
            .on_null(|| panic!("value is present"))
            .await;
        assert_eq!(outcome, Ok(Some(5)));
    }

    #[tokio::test]
    async fn wiretap_sees_settled_success() {
        let seen = Arc::new(Mutex::new(None));
        let tap = Arc::clone(&seen);
        let outcome = Promise::<i32, String>::value(9)
            .wiretap(move |settled| *tap.lock().unwrap() = Some(settled.is_ok()))
            .await;
        assert_eq!(outcome, Ok(9));
        assert_eq!(*seen.lock().unwrap(), Some(true));
    }

    #[tokio::test]
    async fn wiretap_sees_settled_failure() {
        let seen = Arc::new(Mutex::new(None));
        let tap = Arc::clone(&seen);
        let outcome = Promise::<i32, String>::fault("tapped".into())
            .wiretap(move |settled| *tap.lock().unwrap() = settled.as_ref().err().cloned())
            .await;
        assert_eq!(outcome, Err("tapped".to_string()));
        assert_eq!(seen.lock().unwrap().as_deref(), Some("tapped"));
    }

    #[tokio::test]
    async fn on_yield_runs_at_subscription() {
        let yielded = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&yielded);
        let promise =
            Promise::<i32, String>::value(1).on_yield(move || flag.store(true, Ordering::SeqCst));

        // Lazy until awaited.
        assert!(!yielded.load(Ordering::SeqCst));
        assert_eq!(promise.await, Ok(1));
        assert!(yielded.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn defer_parks_until_released() {
        let slot = Arc::new(Mutex::new(None));
        let parked = Arc::clone(&slot);
        let promise = Promise::<i32, Infallible>::value(5)
            .defer(move |release| *parked.lock().unwrap() = Some(release));

        let consumer = tokio::spawn(async move { promise.await });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(!consumer.is_finished());

        slot.lock().unwrap().take().expect("releaser ran").release();
        assert_eq!(consumer.await.expect("join").expect("value"), 5);
    }

    #[tokio::test]
    async fn dropped_release_also_releases() {
        let outcome = Promise::<i32, Infallible>::value(5).defer(drop).await;
        assert_eq!(outcome.expect("value"), 5);
    }

    #[tokio::test]
    async fn throttle_serializes_execution() {
        let throttle = Throttle::new(1);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let overlapped = Arc::new(AtomicBool::new(false));

        let attempt = |n: i32| {
            let in_flight = Arc::clone(&in_flight);
            let overlapped = Arc::clone(&overlapped);
            Promise::<i32, Infallible>::from_future(async move {
                if in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
                    overlapped.store(true, Ordering::SeqCst);
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(n)
            })
            .throttled(&throttle)
        };

        let (a, b) = tokio::join!(
            async { attempt(1).await },
            async { attempt(2).await },
        );
        assert_eq!(a.expect("first"), 1);
        assert_eq!(b.expect("second"), 2);
        assert!(!overlapped.load(Ordering::SeqCst), "throttle of 1 must serialize");
    }

    #[tokio::test]
    async fn unlimited_throttle_admits_immediately() {
        let throttle = Throttle::unlimited();
        let outcome = Promise::<i32, Infallible>::value(3).throttled(&throttle).await;
        assert_eq!(outcome.expect("value"), 3);
    }

    #[tokio::test]
    async fn cache_runs_computation_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let cached = Promise::<i32, String>::from_future(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(7)
        })
        .cache();

        let first = cached.promise().await;
        let second = cached.clone().promise().await;
        assert_eq!(first, Ok(7));
        assert_eq!(second, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn on_error_consumes_failure() {
        let seen = Arc::new(Mutex::new(None));
        let handler = Arc::clone(&seen);
        let outcome = Promise::<i32, String>::fault("boom".into())
            .on_error(move |error| *handler.lock().unwrap() = Some(error))
            .map(|value| value.is_none())
            .await;
        assert_eq!(outcome, Ok(true));
        assert_eq!(seen.lock().unwrap().as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn on_error_passes_value_untouched() {
        let outcome = Promise::<i32, String>::value(3)
            .on_error(|_| panic!("no failure to handle"))
            .map(|value| value)
            .await;
        assert_eq!(outcome, Ok(Some(3)));
    }

    #[tokio::test]
    async fn settled_constructors() {
        assert_eq!(Promise::<i32, String>::settled(Ok(1)).await, Ok(1));
        assert_eq!(
            Promise::<i32, String>::settled(Err("e".into())).await,
            Err("e".to_string())
        );
    }
}
