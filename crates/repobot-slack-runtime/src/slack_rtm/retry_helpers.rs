//! Backoff and retry classification for Slack Web API calls and reconnects.

use std::time::Duration;

pub(super) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
}

/// Exponential backoff capped at `base * 64`, unless the server sent `Retry-After`.
pub(super) fn retry_delay(
    base_delay_ms: u64,
    attempt: usize,
    retry_after_seconds: Option<u64>,
) -> Duration {
    if let Some(retry_after_seconds) = retry_after_seconds {
        return Duration::from_secs(retry_after_seconds);
    }
    let exponent = attempt.saturating_sub(1).min(6) as u32;
    let scale = 2_u64.pow(exponent);
    Duration::from_millis(base_delay_ms.max(1).saturating_mul(scale))
}

pub(super) fn is_retryable_slack_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

pub(super) fn is_retryable_transport_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request() || error.is_body()
}

/// `rtm.connect` error codes that no reconnect can recover from.
pub(super) fn is_invalid_auth_error(code: &str) -> bool {
    matches!(
        code.trim(),
        "invalid_auth" | "not_authed" | "account_inactive" | "token_revoked"
    )
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};

    use super::{is_invalid_auth_error, is_retryable_slack_status, parse_retry_after, retry_delay};

    #[test]
    fn unit_parse_retry_after_accepts_numeric_and_rejects_invalid_values() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("15"));
        assert_eq!(parse_retry_after(&headers), Some(15));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("soon"));
        assert_eq!(parse_retry_after(&headers), None);

        assert_eq!(parse_retry_after(&HeaderMap::new()), None);
    }

    #[test]
    fn unit_retry_delay_prefers_retry_after_and_caps_exponential_growth() {
        assert_eq!(retry_delay(50, 1, Some(3)), Duration::from_secs(3));
        assert_eq!(retry_delay(100, 1, None), Duration::from_millis(100));
        assert_eq!(retry_delay(100, 3, None), Duration::from_millis(400));
        assert_eq!(retry_delay(100, 40, None), Duration::from_millis(6_400));
        assert_eq!(retry_delay(0, 1, None), Duration::from_millis(1));
    }

    #[test]
    fn unit_is_retryable_slack_status_handles_rate_limit_and_server_errors() {
        assert!(is_retryable_slack_status(429));
        assert!(is_retryable_slack_status(503));
        assert!(!is_retryable_slack_status(400));
        assert!(!is_retryable_slack_status(401));
    }

    #[test]
    fn unit_is_invalid_auth_error_matches_credential_failures_only() {
        assert!(is_invalid_auth_error("invalid_auth"));
        assert!(is_invalid_auth_error("not_authed"));
        assert!(is_invalid_auth_error("token_revoked"));
        assert!(!is_invalid_auth_error("ratelimited"));
        assert!(!is_invalid_auth_error("internal_error"));
    }
}
