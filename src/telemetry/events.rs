use std::fmt;
use std::time::Duration;

/// Events emitted by a retry sequence at its state transitions.
///
/// Attempt numbers are 1-indexed. Intermediate failures are visible only
/// here; the settled outcome carries just the last one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryEvent {
    /// An attempt has been dispatched.
    Dispatched {
        /// The attempt number
        attempt: usize,
    },
    /// An attempt failed and a fresh one is about to be requested.
    Retrying {
        /// The attempt that just failed
        failed_attempt: usize,
    },
    /// The sequence settled with a success.
    Succeeded {
        /// Total number of attempts made
        attempts: usize,
        /// Time from first dispatch to settlement
        elapsed: Duration,
    },
    /// Attempts are exhausted; the last failure is being surfaced.
    Exhausted {
        /// Total number of attempts made
        attempts: usize,
        /// Time from first dispatch to settlement
        elapsed: Duration,
    },
    /// The sequence was cancelled before the next dispatch.
    Cancelled {
        /// Attempts completed before cancellation
        attempts: usize,
    },
}

impl fmt::Display for RetryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryEvent::Dispatched { attempt } => write!(f, "Dispatched(#{})", attempt),
            RetryEvent::Retrying { failed_attempt } => {
                write!(f, "Retrying(after #{})", failed_attempt)
            }
            RetryEvent::Succeeded { attempts, elapsed } => {
                write!(f, "Succeeded(attempts={}, elapsed={:?})", attempts, elapsed)
            }
            RetryEvent::Exhausted { attempts, elapsed } => {
                write!(f, "Exhausted(attempts={}, elapsed={:?})", attempts, elapsed)
            }
            RetryEvent::Cancelled { attempts } => write!(f, "Cancelled(attempts={})", attempts),
        }
    }
}
