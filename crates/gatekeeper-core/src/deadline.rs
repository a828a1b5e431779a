//! Deadlines for collaborator calls.
//!
//! No store or cache call may block indefinitely. Each is wrapped in
//! [`bounded`], which turns an elapsed deadline into a
//! `ServiceUnavailable` error the caller can handle like any other.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::AppError;
use crate::result::AppResult;

/// Run `fut` with a deadline.
///
/// `operation` names the call for logging and the error message.
pub async fn bounded<T, F>(limit: Duration, operation: &'static str, fut: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!(
                operation,
                timeout_ms = limit.as_millis() as u64,
                "Collaborator call timed out"
            );
            Err(AppError::service_unavailable(format!(
                "{operation} timed out after {}ms",
                limit.as_millis()
            )))
        }
    }
}

/// Like [`bounded`], but retries once when the first attempt fails with a
/// transient error. Only used for idempotent reads.
pub async fn bounded_read_with_retry<T, F, Fut>(
    limit: Duration,
    operation: &'static str,
    mut call: F,
) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    match bounded(limit, operation, call()).await {
        Err(e) if e.kind.is_transient() => {
            warn!(operation, error = %e, "Retrying read once");
            bounded(limit, operation, call()).await
        }
        other => other,
    }
}
