//! Error types for the resilience envelope and the pipeline's external collaborators.

use std::fmt;
use std::time::Duration;

/// Cap the number of stored failures inside `RetryExhausted` to avoid unbounded growth.
pub const MAX_RETRY_FAILURES: usize = 10;

/// Unified error type for the resilience envelope (C2/C3/C4).
#[derive(Debug)]
pub enum ResilienceError<E> {
    /// The bulkhead rejected the operation due to capacity.
    Bulkhead { in_flight: usize, max: usize },
    /// The circuit breaker is open for this dependency.
    CircuitOpen { name: String, failure_count: usize, open_duration: Duration },
    /// All retry attempts were exhausted.
    RetryExhausted { attempts: usize, total_elapsed: Duration, failures: Vec<E> },
    /// Cooperative cancellation fired while the call was in flight or sleeping.
    Cancelled,
    /// The underlying operation failed.
    Inner(E),
}

impl<E: Clone> Clone for ResilienceError<E> {
    fn clone(&self) -> Self {
        match self {
            Self::Bulkhead { in_flight, max } => Self::Bulkhead { in_flight: *in_flight, max: *max },
            Self::CircuitOpen { name, failure_count, open_duration } => Self::CircuitOpen {
                name: name.clone(),
                failure_count: *failure_count,
                open_duration: *open_duration,
            },
            Self::RetryExhausted { attempts, total_elapsed, failures } => Self::RetryExhausted {
                attempts: *attempts,
                total_elapsed: *total_elapsed,
                failures: failures.clone(),
            },
            Self::Cancelled => Self::Cancelled,
            Self::Inner(e) => Self::Inner(e.clone()),
        }
    }
}

impl<E: PartialEq> PartialEq for ResilienceError<E> {
    fn eq(&self, other: &Self) -> bool {
        use ResilienceError::*;
        match (self, other) {
            (Bulkhead { in_flight: a1, max: b1 }, Bulkhead { in_flight: a2, max: b2 }) => {
                a1 == a2 && b1 == b2
            }
            (
                CircuitOpen { name: n1, failure_count: f1, open_duration: d1 },
                CircuitOpen { name: n2, failure_count: f2, open_duration: d2 },
            ) => n1 == n2 && f1 == f2 && d1 == d2,
            (
                RetryExhausted { attempts: a1, failures: f1, .. },
                RetryExhausted { attempts: a2, failures: f2, .. },
            ) => a1 == a2 && f1 == f2,
            (Cancelled, Cancelled) => true,
            (Inner(e1), Inner(e2)) => e1 == e2,
            _ => false,
        }
    }
}

impl<E: Eq> Eq for ResilienceError<E> {}

impl<E: fmt::Display> fmt::Display for ResilienceError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bulkhead { in_flight, max } => {
                write!(f, "bulkhead rejected request ({} in-flight, max {})", in_flight, max)
            }
            Self::CircuitOpen { name, failure_count, open_duration } => write!(
                f,
                "circuit breaker '{}' is open ({} failures, open for {:?}); retry later",
                name, failure_count, open_duration
            ),
            Self::RetryExhausted { attempts, total_elapsed, failures } => {
                let last = failures.last().map(|e| e.to_string()).unwrap_or_default();
                write!(
                    f,
                    "retry exhausted after {} attempts over {:?} ({} failures); retry later; last error: {}",
                    attempts,
                    total_elapsed,
                    failures.len(),
                    last
                )
            }
            Self::Cancelled => write!(f, "operation cancelled"),
            Self::Inner(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for ResilienceError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Inner(e) => Some(e),
            Self::RetryExhausted { failures, .. } => {
                failures.last().map(|e| e as &dyn std::error::Error)
            }
            _ => None,
        }
    }
}

impl<E> ResilienceError<E> {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    pub fn is_bulkhead(&self) -> bool {
        matches!(self, Self::Bulkhead { .. })
    }

    pub fn is_retry_exhausted(&self) -> bool {
        matches!(self, Self::RetryExhausted { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn is_inner(&self) -> bool {
        matches!(self, Self::Inner(_))
    }

    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }

    pub fn failures(&self) -> Option<&[E]> {
        match self {
            Self::RetryExhausted { failures, .. } => Some(failures.as_slice()),
            _ => None,
        }
    }

    pub fn as_inner(&self) -> Option<&E> {
        match self {
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }
}

/// Failure to complete Store Writer preflight. Fatal: aborts the run with no result.
#[derive(Debug, thiserror::Error)]
pub enum PreflightError {
    #[error("destination store unreachable: {0}")]
    StoreUnreachable(String),
    #[error("bucket '{bucket}' does not exist and auto-create is disabled")]
    BucketMissing { bucket: String },
    #[error("failed to create bucket '{bucket}': {source}")]
    BucketCreateFailed { bucket: String, #[source] source: ObjectStoreError },
}

/// Errors surfaced by a `ClusterApi` implementation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClusterApiError {
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("transient cluster API error: {0}")]
    Transient(String),
    #[error("cluster API error: {0}")]
    Other(String),
}

impl ClusterApiError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Errors surfaced by an `ObjectStore` implementation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ObjectStoreError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("bucket or object already exists: {0}")]
    AlreadyExists(String),
    #[error("transient object store error: {0}")]
    Transient(String),
    #[error("object store error: {0}")]
    Other(String),
}

impl ObjectStoreError {
    /// `makeBucket` is retried only on not-found/transient, never on already-exists.
    pub fn retryable_for_make_bucket(&self) -> bool {
        !matches!(self, Self::AlreadyExists(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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
    fn circuit_open_display_mentions_name_and_failures() {
        let err: ResilienceError<io::Error> = ResilienceError::CircuitOpen {
            name: "object-store".into(),
            failure_count: 10,
            open_duration: Duration::from_secs(30),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("object-store"));
        assert!(msg.contains("10"));
    }

    #[test]
    fn retry_exhausted_display_includes_last_error() {
        let err: ResilienceError<DummyError> = ResilienceError::RetryExhausted {
            attempts: 3,
            total_elapsed: Duration::from_millis(300),
            failures: vec![DummyError("first"), DummyError("last")],
        };
        let msg = format!("{}", err);
        assert!(msg.contains("3"));
        assert!(msg.contains("last"));
    }

    #[test]
    fn predicates_cover_all_variants() {
        let bulkhead: ResilienceError<DummyError> = ResilienceError::Bulkhead { in_flight: 1, max: 1 };
        assert!(bulkhead.is_bulkhead());

        let circuit: ResilienceError<DummyError> = ResilienceError::CircuitOpen {
            name: "x".into(),
            failure_count: 1,
            open_duration: Duration::from_secs(1),
        };
        assert!(circuit.is_circuit_open());

        let cancelled: ResilienceError<DummyError> = ResilienceError::Cancelled;
        assert!(cancelled.is_cancelled());

        let retry: ResilienceError<DummyError> = ResilienceError::RetryExhausted {
            attempts: 2,
            total_elapsed: Duration::ZERO,
            failures: vec![],
        };
        assert!(retry.is_retry_exhausted());
    }

    #[test]
    fn make_bucket_retry_filter_excludes_already_exists() {
        assert!(!ObjectStoreError::AlreadyExists("b".into()).retryable_for_make_bucket());
        assert!(ObjectStoreError::NotFound("b".into()).retryable_for_make_bucket());
        assert!(ObjectStoreError::Transient("timeout".into()).retryable_for_make_bucket());
    }
}
