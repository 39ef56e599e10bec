//! Retry Executor (C2): bounded-attempt retry with deterministic backoff,
//! honoring cooperative cancellation.
//!
//! Retry is blind to error kind. Every `Err` from the guarded operation is
//! retried until attempts are exhausted. Classifying retryable vs permanent
//! failures is the caller's responsibility (configure `max_attempts=1` for a
//! call site that should fail fast, or rely on the Circuit Breaker).

use crate::backoff::delay_for_attempt;
use crate::error::MAX_RETRY_FAILURES;
use crate::model::RetryConfig;
use crate::{ResilienceError, Sleeper, TokioSleeper};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct RetryPolicy<E> {
    config: RetryConfig,
    sleeper: Arc<dyn Sleeper>,
    _marker: std::marker::PhantomData<fn() -> E>,
}

impl<E> std::fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy").field("config", &self.config).finish()
    }
}

impl<E> RetryPolicy<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    pub fn new(config: RetryConfig) -> Self {
        Self { config: config.normalize(), sleeper: Arc::new(TokioSleeper), _marker: std::marker::PhantomData }
    }

    pub fn with_sleeper<S: Sleeper + 'static>(mut self, sleeper: S) -> Self {
        self.sleeper = Arc::new(sleeper);
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Executes `operation` up to `config.max_attempts` times, sleeping the
    /// delay law's prescribed duration between attempts. Returns the
    /// cancellation cause as soon as `cancel` fires, whether at an attempt
    /// boundary or mid-sleep.
    pub async fn execute<T, Fut, Op>(
        &self,
        cancel: &CancellationToken,
        mut operation: Op,
    ) -> Result<T, ResilienceError<E>>
    where
        T: Send,
        Fut: Future<Output = Result<T, E>> + Send,
        Op: FnMut() -> Fut + Send,
    {
        let mut failures = Vec::new();
        let mut total_elapsed = Duration::ZERO;

        for attempt in 1..=self.config.max_attempts {
            if cancel.is_cancelled() {
                return Err(ResilienceError::Cancelled);
            }

            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    failures.push(e);
                    if failures.len() > MAX_RETRY_FAILURES {
                        let excess = failures.len() - MAX_RETRY_FAILURES;
                        failures.drain(0..excess);
                    }

                    if attempt >= self.config.max_attempts {
                        return Err(ResilienceError::RetryExhausted {
                            attempts: self.config.max_attempts,
                            total_elapsed,
                            failures,
                        });
                    }

                    let delay = delay_for_attempt(&self.config, attempt);
                    total_elapsed += delay;

                    tokio::select! {
                        _ = cancel.cancelled() => return Err(ResilienceError::Cancelled),
                        _ = self.sleeper.sleep(delay) => {}
                    }
                }
            }
        }

        unreachable!("retry loop always returns within max_attempts iterations")
    }
}
