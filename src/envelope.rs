//! Resilience Envelope (C4): composes the Circuit Breaker (C3) outermost and
//! the Retry Executor (C2) innermost around any outbound call.
//!
//! `guarded(op) = breaker.execute(|| retry.execute(cancel, op))`. Once the
//! breaker is open, retries against the failing dependency are short-circuited
//! immediately instead of burning the retry budget.

use crate::circuit_breaker::CircuitBreakerPolicy;
use crate::retry::RetryPolicy;
use crate::ResilienceError;
use std::future::Future;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct Envelope<E> {
    breaker: CircuitBreakerPolicy,
    retry: RetryPolicy<E>,
}

impl<E> Envelope<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    pub fn new(breaker: CircuitBreakerPolicy, retry: RetryPolicy<E>) -> Self {
        Self { breaker, retry }
    }

    pub fn breaker(&self) -> &CircuitBreakerPolicy {
        &self.breaker
    }

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
        let retry = &self.retry;
        self.breaker
            .execute(|| async {
                match retry.execute(cancel, &mut operation).await {
                    Ok(value) => Ok(value),
                    Err(e) => Err(e),
                }
            })
            .await
    }
}
