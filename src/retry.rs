//! Retry logic with exponential backoff
//!
//! Wraps a single fallible operation with bounded
//! exponential-backoff-with-jitter retry. Whether a failure is retried is
//! decided by the error classifier ([`crate::error::classify`]) — transient
//! infrastructure failures are retried, everything else fails immediately.
//! Only the last failure is surfaced to the caller; intermediate failures are
//! logged through `tracing` for diagnostics.

use rand::Rng;
use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::{FetchFailure, classify};

/// Execute an async operation with exponential backoff retry
///
/// `config.max_attempts` is the total invocation budget: 3 means the
/// operation runs at most 3 times. 0 makes this a pass-through — exactly one
/// invocation, no classification, no delay — for callers that own their own
/// retry policy.
///
/// The delay before retry `n` (1-based) is
/// `base_delay * multiplier^(n-1)`, scaled by a uniform random factor in
/// `[1 - jitter_fraction, 1 + jitter_fraction]`.
pub async fn fetch_with_retry<F, Fut, T>(
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, FetchFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchFailure>>,
{
    if config.max_attempts == 0 {
        return operation().await;
    }

    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(failure) => {
                let code = classify(&failure);
                if !code.is_retryable() {
                    tracing::debug!(
                        error = %failure,
                        code = %code,
                        "failure is not retryable, giving up immediately"
                    );
                    return Err(failure);
                }
                if attempt >= config.max_attempts {
                    tracing::error!(
                        error = %failure,
                        code = %code,
                        attempts = attempt,
                        "retry budget exhausted"
                    );
                    return Err(failure);
                }

                let delay = backoff_delay(config, attempt);
                tracing::warn!(
                    error = %failure,
                    code = %code,
                    attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis(),
                    "transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Compute the jittered delay before the retry following attempt `attempt`
fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1);
    let base = config.base_delay.as_secs_f64() * config.multiplier.powi(exponent as i32);

    let jittered = if config.jitter_fraction > 0.0 {
        let factor = rand::thread_rng()
            .gen_range(1.0 - config.jitter_fraction..=1.0 + config.jitter_fraction);
        base * factor
    } else {
        base
    };

    Duration::from_secs_f64(jittered.max(0.0))
}
