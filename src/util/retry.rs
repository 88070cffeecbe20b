//! Retry with exponential backoff and jitter.

use std::future::Future;
use std::time::Duration;

use crate::error::VoiceError;

/// Retry policy for outbound provider calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Initial backoff duration.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
    /// Backoff multiplier.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Execute an async operation, retrying errors that are retryable.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, VoiceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, VoiceError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut backoff = self.initial_backoff;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if !error.is_retryable() || attempt >= max_attempts {
                return Err(error);
            }

            tracing::warn!(
                attempt,
                max_attempts,
                error = %error,
                "Retrying after error"
            );

            let delay = match error {
                VoiceError::RateLimited {
                    retry_after_ms: Some(ms),
                } => Duration::from_millis(ms).min(self.max_backoff),
                _ => jittered(backoff),
            };
            tokio::time::sleep(delay).await;

            backoff = Duration::from_secs_f64(
                (backoff.as_secs_f64() * self.multiplier).min(self.max_backoff.as_secs_f64()),
            );
        }
    }
}

// 75%–125% of the nominal backoff.
fn jittered(backoff: Duration) -> Duration {
    let factor = 0.75 + rand_factor() * 0.5;
    Duration::from_secs_f64(backoff.as_secs_f64() * factor)
}

/// Pseudo-random factor in [0, 1), good enough for spreading retries.
fn rand_factor() -> f64 {
    (uuid::Uuid::new_v4().as_u128() % 10_000) as f64 / 10_000.0
}
