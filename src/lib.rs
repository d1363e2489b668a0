#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # Mulligan 🏌️
//!
//! Bounded retry for one-shot async values: re-run a promise factory until it
//! succeeds (or the attempt budget runs out), and observe a single settled
//! outcome through a composable promise surface.
//!
//! ## Features
//!
//! - **Bounded, immediate retry** with a fresh computation per attempt
//! - **Single settlement** shared by any number of consumers
//! - **Off-thread settlement waits** that never block a runtime worker
//! - **Operator surface** (`map`, `and_then`, `route`, `wiretap`, `cache`,
//!   `defer`, `throttled`, success-only `on_error`) forwarded to the final
//!   outcome
//! - **Optional per-attempt timeout and cancellation**
//! - **Structured telemetry** through injectable `tower::Service` sinks
//!
//! ## Quick Start
//!
//! ```rust
//! use mulligan::{Promise, Retryable};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let calls = Arc::new(AtomicUsize::new(0));
//!     let counter = Arc::clone(&calls);
//!
//!     let retryable = Retryable::new(
//!         move || {
//!             let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
//!             Promise::from_future(async move {
//!                 if attempt < 3 {
//!                     Err(format!("attempt {attempt} failed"))
//!                 } else {
//!                     Ok("ready")
//!                 }
//!             })
//!         },
//!         5,
//!     )
//!     .expect("at least one attempt");
//!
//!     assert_eq!(retryable.promise().await.unwrap(), "ready");
//!     assert_eq!(calls.load(Ordering::SeqCst), 3);
//! }
//! ```

pub mod error;
mod gate;
pub mod prelude;
pub mod promise;
pub mod retry;
pub mod telemetry;

// Re-exports
pub use error::RetryError;
pub use promise::{CachedPromise, Capability, Full, Promise, Release, SuccessOnly, Throttle};
pub use retry::{BuildError, Retryable, RetryableBuilder};
pub use telemetry::{LogSink, MemorySink, NullSink, RetryEvent, TelemetrySink};
