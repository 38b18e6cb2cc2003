//! Engine error taxonomy.
//!
//! Classification drives retry and user-messaging policy: transient
//! I/O is eligible for bounded retry, permanent input errors are not,
//! and everything else is logged and recorded into error analytics.

use minder_adapters::{AutoCoderError, BackendError};
use minder_storage::{DiffStoreError, GoalStoreError, KvError};
use thiserror::Error;

/// Errors that can abort a cycle.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
    #[error("state store error: {0}")]
    Kv(#[from] KvError),
    #[error("goal store error: {0}")]
    Goals(#[from] GoalStoreError),
    #[error("diff store error: {0}")]
    Diffs(#[from] DiffStoreError),
    #[error("auto-coder error: {0}")]
    AutoCoder(#[from] AutoCoderError),
    #[error("cycle already running")]
    AlreadyRunning,
}

/// Error class used for throttling and user messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Network reset, refused connection, timeout: bounded retry.
    Transient,
    /// Not-found, unauthorized, invalid request: never retried.
    PermanentInput,
    /// Everything else: logged and recorded.
    Internal,
}

impl CycleError {
    pub fn class(&self) -> ErrorClass {
        match self {
            CycleError::Backend(e) if e.is_transient() => ErrorClass::Transient,
            CycleError::Backend(BackendError::Unauthorized(_)) => ErrorClass::PermanentInput,
            CycleError::Backend(_) => ErrorClass::PermanentInput,
            CycleError::Kv(_) | CycleError::Diffs(_) | CycleError::Goals(_) => {
                ErrorClass::Internal
            }
            CycleError::AutoCoder(_) => ErrorClass::Internal,
            CycleError::AlreadyRunning => ErrorClass::Internal,
        }
    }
}

/// Classify a free-form error message the way the throttle does for
/// collaborator errors that only surface as strings.
pub fn classify_message(message: &str) -> ErrorClass {
    let lower = message.to_lowercase();
    const TRANSIENT: &[&str] = &[
        "econnreset",
        "connection reset",
        "connection refused",
        "socket hang up",
        "timed out",
        "timeout",
        "exit code",
    ];
    const PERMANENT: &[&str] = &[
        "not found",
        "unauthorized",
        "forbidden",
        "invalid",
        "bad request",
        "logged out",
    ];
    if TRANSIENT.iter().any(|needle| lower.contains(needle)) {
        return ErrorClass::Transient;
    }
    if PERMANENT.iter().any(|needle| lower.contains(needle)) {
        return ErrorClass::PermanentInput;
    }
    ErrorClass::Internal
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
