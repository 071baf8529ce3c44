//! Token Bucket Rate Limiter
//!
//! Tokens are added to the bucket at a constant rate, and each request
//! consumes one token. Waiters sleep until a token becomes available or
//! their cancellation token fires.
//!
//! The bucket starts full, so up to `burst` requests go through instantly;
//! after that permits arrive at the steady `rate`.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::ThrottlingError;

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket shared by every caller of one API family
#[derive(Debug)]
pub struct TokenBucketLimiter {
    name: &'static str,
    rate_per_second: f64,
    burst: u32,
    state: Mutex<BucketState>,
}

impl TokenBucketLimiter {
    /// Create a full bucket refilling at `rate_per_second` up to `burst` tokens
    pub fn new(name: &'static str, rate_per_second: f64, burst: u32) -> Self {
        let burst = burst.max(1);
        Self {
            name,
            rate_per_second,
            burst,
            state: Mutex::new(BucketState {
                tokens: burst as f64,
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn rate(&self) -> f64 {
        self.rate_per_second
    }

    pub fn burst(&self) -> u32 {
        self.burst
    }

    /// Take a permit if one is available right now
    pub async fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().await;
        self.refill(&mut state);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Wait for a permit.
    ///
    /// Fails with [`ThrottlingError::Cancelled`] as soon as `cancel` fires, even
    /// while sleeping for the next refill.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<(), ThrottlingError> {
        loop {
            if cancel.is_cancelled() {
                return Err(ThrottlingError::Cancelled {
                    limiter: self.name,
                });
            }

            let wait_for = {
                let mut state = self.state.lock().await;
                self.refill(&mut state);

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    trace!(
                        limiter = self.name,
                        remaining = state.tokens.floor() as u32,
                        "Permit granted"
                    );
                    return Ok(());
                }

                let missing = 1.0 - state.tokens;
                Duration::from_secs_f64(missing / self.rate_per_second)
            };

            debug!(
                limiter = self.name,
                wait_ms = wait_for.as_millis() as u64,
                "Rate limit reached, waiting for refill"
            );

            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(ThrottlingError::Cancelled { limiter: self.name });
                }
                _ = tokio::time::sleep(wait_for) => {}
            }
        }
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(state.last_refill);
        let tokens_to_add = elapsed.as_secs_f64() * self.rate_per_second;
        state.tokens = (state.tokens + tokens_to_add).min(self.burst as f64);
        state.last_refill = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_burst_is_available_immediately() {
        let limiter = TokenBucketLimiter::new("test", 2.0, 10);
        for _ in 0..10 {
            assert!(limiter.try_acquire().await);
        }
        assert!(!limiter.try_acquire().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refills_at_steady_rate() {
        let limiter = TokenBucketLimiter::new("test", 2.0, 1);
        assert!(limiter.try_acquire().await);
        assert!(!limiter.try_acquire().await);

        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(limiter.try_acquire().await);
        assert!(!limiter.try_acquire().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_never_exceeds_burst() {
        let limiter = TokenBucketLimiter::new("test", 100.0, 3);
        tokio::time::advance(Duration::from_secs(60)).await;
        for _ in 0..3 {
            assert!(limiter.try_acquire().await);
        }
        assert!(!limiter.try_acquire().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_sleeps_until_next_permit() {
        let limiter = TokenBucketLimiter::new("test", 2.0, 1);
        let cancel = CancellationToken::new();

        limiter.wait(&cancel).await.unwrap();
        let start = Instant::now();
        limiter.wait(&cancel).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_fails_when_cancelled() {
        let limiter = TokenBucketLimiter::new("test", 0.001, 1);
        let cancel = CancellationToken::new();
        limiter.wait(&cancel).await.unwrap();

        let waiter = {
            let cancel = cancel.clone();
            async move { limiter.wait(&cancel).await }
        };
        cancel.cancel();
        let err = waiter.await.unwrap_err();
        assert!(matches!(err, ThrottlingError::Cancelled { limiter: "test" }));
    }
}
