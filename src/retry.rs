use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Bounded retry with linear backoff.
///
/// The wait after the n-th failed attempt is `base_delay * n`, linear in
/// the attempt number rather than exponential, so the worst-case total wait
/// stays bounded at `base_delay * max_attempts * (max_attempts - 1) / 2`.
/// Wrapped operations must be idempotent or otherwise safe to re-run.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            // a zero budget would never run the operation at all
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Runs `op` until it succeeds or the attempt budget is spent.
    ///
    /// Every failed attempt is logged with its number and the configured
    /// maximum; the error of the final attempt is returned unchanged.
    pub async fn run<T, E, F, Fut>(&self, what: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %error,
                        "{what} failed"
                    );
                    if attempt >= self.max_attempts {
                        return Err(error);
                    }
                    tokio::time::sleep(self.base_delay * attempt).await;
                    attempt += 1;
                }
            }
        }
    }
}
