//! Shared request throttling using a token bucket
//!
//! One [`RateLimiter`] is shared by reference across every concurrent worker
//! in a batch and consulted before every outbound network-bound call. Tokens
//! refill continuously — fractional tokens accumulate with elapsed time
//! rather than in steps — so a rate of 0.5 means one request every two
//! seconds, not zero requests.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use tokio::time::Duration;

/// Token-bucket rate limiter shared across workers
///
/// Capacity and refill rate both derive from a single requests-per-second
/// value; capacity is the rate floored at one token, so at most one second's
/// worth of burst accumulates and sub-1 rates can still accrue the whole
/// token an `acquire` needs. A rate of 0 disables throttling entirely and
/// [`acquire`](RateLimiter::acquire) becomes a no-op.
///
/// Cloning is cheap and clones share the same bucket.
#[derive(Clone)]
pub struct RateLimiter {
    /// Requests per second; 0.0 means unlimited
    rate: f64,
    bucket: Arc<Mutex<Bucket>>,
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// Create a limiter allowing `rate` requests per second
    ///
    /// Rates of 0 or below disable throttling. The bucket starts full, so
    /// the first `ceil(rate)` requests pass without waiting.
    pub fn new(rate: f64) -> Self {
        let rate = if rate.is_finite() && rate > 0.0 { rate } else { 0.0 };
        Self {
            rate,
            bucket: Arc::new(Mutex::new(Bucket {
                tokens: Bucket::capacity(rate),
                last_refill: Instant::now(),
            })),
        }
    }

    /// Whether throttling is active
    pub fn is_enabled(&self) -> bool {
        self.rate > 0.0
    }

    /// Block until one token is available, then consume it
    ///
    /// Returns immediately when the limiter is disabled.
    pub async fn acquire(&self) {
        if !self.is_enabled() {
            return;
        }

        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                bucket.refill(self.rate);
                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return;
                }
                // Sleep outside the lock so other workers can refill/consume
                Duration::from_secs_f64((1.0 - bucket.tokens) / self.rate)
            };
            tokio::time::sleep(wait).await;
        }
    }
}

impl Bucket {
    /// Capacity must never drop below one token: at sub-1 rates a cap of
    /// `rate` alone would keep `acquire` below a whole token forever
    fn capacity(rate: f64) -> f64 {
        rate.max(1.0)
    }

    /// Add tokens for the time elapsed since the last refill, capped at
    /// the bucket capacity
    fn refill(&mut self, rate: f64) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(Self::capacity(rate));
        self.last_refill = now;
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").field("rate", &self.rate).finish()
    }
}
