//! Retry of coin store writes
//!
//! Only [`IngestError::TransientStoreFailure`] is retried; the classification
//! happens where `sqlx::Error` is converted.

use crate::error::Result;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

const BASE_BACKOFF_MS: u64 = 100;
const MAX_BACKOFF_MS: u64 = 5_000;

/// Run `f` up to `max_attempts` times, backing off exponentially between
/// attempts that failed transiently.
pub async fn execute_with_retry<F, Fut, T>(mut f: F, max_attempts: u32) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        let err = match f().await {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };
        if attempt >= max_attempts || !err.is_transient() {
            return Err(err);
        }

        let backoff = backoff_for(attempt);
        warn!("Store write attempt {}/{} failed: {}; retrying in {:?}", attempt, max_attempts, err, backoff);
        tokio::time::sleep(backoff).await;
        attempt += 1;
    }
}

fn backoff_for(attempt: u32) -> Duration {
    let factor = 1_u64 << attempt.saturating_sub(1).min(16);
    Duration::from_millis((BASE_BACKOFF_MS * factor).min(MAX_BACKOFF_MS))
}
