//! Bounded-latency fetching.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// Result of a fetch that was given a fixed amount of time.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum FetchOutcome<T, E> {
    /// The operation finished in time and succeeded.
    Ok(T),
    /// The time budget elapsed before the operation finished.
    TimedOut,
    /// The operation finished in time and reported a failure.
    Failed(E),
    /// The operation panicked or was cancelled before producing a result.
    Aborted(String),
}

impl<T, E> FetchOutcome<T, E> {
    pub fn is_ok(&self) -> bool {
        matches!(self, FetchOutcome::Ok(_))
    }

    /// The successful value, discarding the failure reason.
    pub fn ok(self) -> Option<T> {
        match self {
            FetchOutcome::Ok(value) => Some(value),
            FetchOutcome::TimedOut | FetchOutcome::Failed(_) | FetchOutcome::Aborted(_) => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FetchOutcome<U, E> {
        match self {
            FetchOutcome::Ok(value) => FetchOutcome::Ok(f(value)),
            FetchOutcome::TimedOut => FetchOutcome::TimedOut,
            FetchOutcome::Failed(err) => FetchOutcome::Failed(err),
            FetchOutcome::Aborted(reason) => FetchOutcome::Aborted(reason),
        }
    }
}

/// Run `operation` with a hard time budget.
///
/// The operation is spawned onto the runtime. When the budget elapses only the
/// wait is abandoned: the task keeps running to completion and whatever side
/// effects it performs (cache fills, invalidation) still happen.
pub async fn fetch_with_timeout<T, E, F>(timeout: Duration, operation: F) -> FetchOutcome<T, E>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    let handle = tokio::spawn(operation);
    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(Ok(value))) => FetchOutcome::Ok(value),
        Ok(Ok(Err(err))) => FetchOutcome::Failed(err),
        Ok(Err(join_err)) => {
            warn!(
                timeout_ms = timeout.as_millis() as u64,
                error = %join_err,
                "bounded fetch aborted"
            );
            FetchOutcome::Aborted(join_err.to_string())
        }
        Err(_) => {
            debug!(
                timeout_ms = timeout.as_millis() as u64,
                "bounded fetch timed out; operation left running"
            );
            FetchOutcome::TimedOut
        }
    }
}
