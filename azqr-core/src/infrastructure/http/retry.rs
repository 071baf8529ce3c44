//! Retry envelope: exponential backoff with jitter, `Retry-After` aware

use std::time::Duration;

use rand::Rng;
use reqwest::header::HeaderMap;

use crate::config::HttpConfig;

/// Status codes retried without a `Retry-After` header
pub const RETRYABLE_STATUS_CODES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Jitter never shortens a delay, so the cumulative wait stays above the
/// un-jittered backoff sum.
const JITTER_MIN: f64 = 1.0;
const JITTER_MAX: f64 = 1.3;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryOptions {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub max_retry_delay: Duration,
    /// Per-attempt timeout
    pub try_timeout: Duration,
    pub status_codes: Vec<u16>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self::from_config(&HttpConfig::default(), false)
    }
}

impl RetryOptions {
    pub fn from_config(config: &HttpConfig, long_running: bool) -> Self {
        let (max_retries, delay_ms) = if long_running {
            (config.long_running_max_retries, config.long_running_retry_delay_ms)
        } else {
            (config.max_retries, config.retry_delay_ms)
        };

        Self {
            max_retries,
            retry_delay: Duration::from_millis(delay_ms),
            max_retry_delay: Duration::from_secs(config.max_retry_delay_seconds),
            try_timeout: Duration::from_secs(config.timeout_seconds),
            status_codes: RETRYABLE_STATUS_CODES.to_vec(),
        }
    }

    pub fn long_running() -> Self {
        Self::from_config(&HttpConfig::default(), true)
    }

    /// Transport-level timeout: the per-attempt timeout plus five seconds of slack
    pub fn transport_timeout(&self) -> Duration {
        self.try_timeout + Duration::from_secs(5)
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.status_codes.contains(&status)
    }

    /// `min(retry_delay * 2^attempt, max_retry_delay)`
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(20));
        self.retry_delay
            .saturating_mul(factor)
            .min(self.max_retry_delay)
    }

    /// Backoff stretched by a random factor in `[1.0, 1.3)`, still capped
    pub fn jittered_backoff(&self, attempt: u32) -> Duration {
        let factor = rand::rng().random_range(JITTER_MIN..JITTER_MAX);
        self.backoff(attempt)
            .mul_f64(factor)
            .min(self.max_retry_delay)
    }

    /// Delay before the next attempt. A server-provided `Retry-After` is
    /// honoured up to the cap but never shortens the built-in backoff.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let backoff = self.jittered_backoff(attempt);
        match retry_after {
            Some(server) => server.min(self.max_retry_delay).max(backoff),
            None => backoff,
        }
    }
}

/// Parse `retry-after-ms`, `x-ms-retry-after-ms` or `Retry-After`
/// (delta-seconds or HTTP date).
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    for name in ["retry-after-ms", "x-ms-retry-after-ms"] {
        if let Some(ms) = header_str(headers, name).and_then(|v| v.trim().parse::<u64>().ok()) {
            return Some(Duration::from_millis(ms));
        }
    }

    let value = header_str(headers, "retry-after")?;
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let at = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    let delta = at.with_timezone(&chrono::Utc) - chrono::Utc::now();
    Some(delta.to_std().unwrap_or(Duration::ZERO))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
