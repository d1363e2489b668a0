//! Error types for retry sequences
use std::fmt;
use std::time::Duration;

/// Final failure of a retry sequence.
///
/// The surfaced failure is exactly the last attempt's result; earlier
/// failures are observable through telemetry while the sequence runs and are
/// then discarded.
#[derive(Debug, Clone)]
pub enum RetryError<E> {
    /// The last attempt failed with the wrapped error.
    Attempt(E),
    /// The last attempt exceeded the configured per-attempt deadline.
    Timeout { elapsed: Duration, timeout: Duration },
    /// The sequence was cancelled before the next attempt was dispatched.
    Cancelled,
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attempt(e) => write!(f, "{}", e),
            Self::Timeout { elapsed, timeout } => {
                write!(f, "attempt timed out after {:?} (limit: {:?})", elapsed, timeout)
            }
            Self::Cancelled => write!(f, "retry sequence cancelled"),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Attempt(e) => Some(e),
            _ => None,
        }
    }
}

impl<E> RetryError<E> {
    /// Check if this failure came out of the attempt itself.
    pub fn is_attempt(&self) -> bool {
        matches!(self, Self::Attempt(_))
    }

    /// Check if this failure is a per-attempt timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Check if the sequence was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Borrow the attempt error if present.
    pub fn as_attempt(&self) -> Option<&E> {
        match self {
            Self::Attempt(e) => Some(e),
            _ => None,
        }
    }

    /// Get the attempt error if this is an Attempt variant.
    pub fn into_attempt(self) -> Option<E> {
        match self {
            Self::Attempt(e) => Some(e),
            _ => None,
        }
    }

    /// Access timeout details as (elapsed, limit).
    pub fn timeout_details(&self) -> Option<(Duration, Duration)> {
        match self {
            Self::Timeout { elapsed, timeout } => Some((*elapsed, *timeout)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::fmt;
    use std::io;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct DummyError(&'static str);

    impl fmt::Display for DummyError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    impl std::error::Error for DummyError {}

    #[test]
    fn attempt_error_displays_inner_verbatim() {
        let err: RetryError<DummyError> = RetryError::Attempt(DummyError("connection reset"));
        assert_eq!(format!("{}", err), "connection reset");
    }

    #[test]
    fn timeout_error_display() {
        let err: RetryError<io::Error> = RetryError::Timeout {
            elapsed: Duration::from_millis(5100),
            timeout: Duration::from_secs(5),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("timed out"));
        assert!(msg.contains("5.1"));
    }

    #[test]
    fn cancelled_display() {
        let err: RetryError<DummyError> = RetryError::Cancelled;
        assert!(format!("{}", err).contains("cancelled"));
    }

    #[test]
    fn source_forwards_to_attempt_error() {
        let err: RetryError<DummyError> = RetryError::Attempt(DummyError("inner"));
        assert_eq!(err.source().unwrap().to_string(), "inner");

        let timeout: RetryError<DummyError> = RetryError::Timeout {
            elapsed: Duration::from_secs(1),
            timeout: Duration::from_secs(1),
        };
        assert!(timeout.source().is_none());
    }

    #[test]
    fn predicates_cover_all_variants() {
        let attempt: RetryError<DummyError> = RetryError::Attempt(DummyError("x"));
        assert!(attempt.is_attempt());
        assert!(!attempt.is_timeout());
        assert!(!attempt.is_cancelled());

        let timeout: RetryError<DummyError> = RetryError::Timeout {
            elapsed: Duration::from_millis(10),
            timeout: Duration::from_millis(20),
        };
        assert!(timeout.is_timeout());
        assert_eq!(
            timeout.timeout_details(),
            Some((Duration::from_millis(10), Duration::from_millis(20)))
        );

        let cancelled: RetryError<DummyError> = RetryError::Cancelled;
        assert!(cancelled.is_cancelled());
        assert!(cancelled.timeout_details().is_none());
    }

    #[test]
    fn accessors_extract_attempt_error() {
        let err = RetryError::Attempt(DummyError("x"));
        assert_eq!(err.as_attempt(), Some(&DummyError("x")));
        assert_eq!(err.into_attempt(), Some(DummyError("x")));

        let cancelled: RetryError<DummyError> = RetryError::Cancelled;
        assert!(cancelled.as_attempt().is_none());
        assert!(cancelled.into_attempt().is_none());
    }
}
