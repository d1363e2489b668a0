//! Telemetry and observability for retry sequences.
//!
//! The driver emits a [`RetryEvent`] at every state transition: dispatch,
//! retry, success, exhaustion, cancellation. Events flow through
//! [`TelemetrySink`] implementations, modeled as a
//! `tower::Service<RetryEvent>` for composability. The default sink logs
//! through `tracing`; tests usually inject a [`MemorySink`].

pub mod events;
pub mod sinks;

pub use events::RetryEvent;
pub use sinks::{emit_best_effort, LogSink, MemorySink, NullSink, TelemetrySink};
