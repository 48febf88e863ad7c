use std::time::Duration;

use reqwest::StatusCode;

pub const MAX_RETRIES: u32 = 3;
const BACKOFF_SECONDS: &[u64] = &[5, 15, 45];

/// Whether a response status is worth retrying: rate limiting or a
/// transient server-side failure.
pub fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Sleep for the backoff duration before retry number `attempt`.
pub async fn backoff_sleep(attempt: u32) {
    let wait = BACKOFF_SECONDS
        .get(attempt as usize)
        .copied()
        .unwrap_or(45);
    log::warn!(
        "Request throttled. Waiting {wait}s before retry {}/{MAX_RETRIES}",
        attempt + 1
    );
    tokio::time::sleep(Duration::from_secs(wait)).await;
}
