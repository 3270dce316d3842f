use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

/// Maximum retry attempts after an initial request attempt.
pub const MAX_RETRIES: u32 = 2;
/// Base delay before the first retry.
pub const BASE_DELAY_MS: u64 = 500;

fn retryable_status_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r"(?i)overloaded|service.?unavailable|upstream.?connect|connection.?refused|model.?loading")
            .expect("retry regex must compile")
    })
}

/// Statuses and error texts meaning the backend never handled the request.
///
/// A plain 500 is not retried: the backend raises it after running the
/// handler, and chat or execute must not run twice.
pub fn is_retryable_http_error(status: u16, error_text: &str) -> bool {
    matches!(status, 429 | 502 | 503 | 504) || retryable_status_regex().is_match(error_text)
}

/// Exponential backoff delay for a retry attempt.
pub fn retry_delay(base: Duration, attempt: u32) -> Duration {
    let exponent = attempt.min(16);
    base.saturating_mul(2u32.saturating_pow(exponent))
}
