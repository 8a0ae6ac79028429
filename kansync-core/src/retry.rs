//! Bounded retry with backoff for transient store failures.

use std::time::Duration;

use crate::error::KanSyncResult;

const MAX_ATTEMPTS: u32 = 3;
const RETRY_DELAY_MS: u64 = 200;

/// Run a store operation, retrying transient failures with doubling
/// delays. Permanent errors and the final transient error propagate to
/// the caller.
pub async fn with_retry<T, F, Fut>(mut op: F) -> KanSyncResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = KanSyncResult<T>>,
{
    let mut delay = Duration::from_millis(RETRY_DELAY_MS);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < MAX_ATTEMPTS => {
                tracing::warn!(attempt, error = %err, "transient store failure, retrying");
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
