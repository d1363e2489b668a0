//! Convenient re-exports for common Mulligan types.
pub use crate::{
    error::RetryError,
    promise::{CachedPromise, Capability, Full, Promise, Release, SuccessOnly, Throttle},
    retry::{BuildError, Retryable, RetryableBuilder},
    telemetry::{LogSink, MemorySink, NullSink, RetryEvent, TelemetrySink},
};
