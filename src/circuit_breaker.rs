//! Circuit Breaker (C3): tracks the failure rate of one named dependency and
//! short-circuits calls while it is judged unhealthy. Lock-free via atomics;
//! state transitions are serialized through CAS, reads (`state()`/`snapshot()`)
//! take no lock.

use crate::clock::{Clock, MonotonicClock};
use crate::model::CircuitBreakerState as CircuitBreakerSnapshot;
use crate::ResilienceError;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const STATE_CLOSED: u8 = 0;
const STATE_OPEN: u8 = 1;
const STATE_HALF_OPEN: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            STATE_OPEN => CircuitState::Open,
            STATE_HALF_OPEN => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

/// Construction-time configuration for one breaker instance.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CircuitBreakerConfig {
    pub max_failures: usize,
    pub reset_timeout: Duration,
    /// Consecutive successes required in HALF_OPEN before transitioning to CLOSED.
    pub half_open_limit: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { max_failures: 5, reset_timeout: Duration::from_secs(30), half_open_limit: 3 }
    }
}

struct State {
    state: AtomicU8,
    failures: AtomicUsize,
    successes: AtomicUsize,
    last_fail_monotonic_millis: AtomicU64,
    last_fail_epoch_millis: AtomicU64,
}

/// One guarded dependency's breaker. Cheap to clone (shares inner state via `Arc`).
#[derive(Clone)]
pub struct CircuitBreakerPolicy {
    name: String,
    state: Arc<State>,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
}

impl CircuitBreakerPolicy {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(State {
                state: AtomicU8::new(STATE_CLOSED),
                failures: AtomicUsize::new(0),
                successes: AtomicUsize::new(0),
                last_fail_monotonic_millis: AtomicU64::new(0),
                last_fail_epoch_millis: AtomicU64::new(0),
            }),
            config,
            clock: Arc::new(MonotonicClock::default()),
        }
    }

    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.state.load(Ordering::Acquire))
    }

    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let epoch_millis = self.state.last_fail_epoch_millis.load(Ordering::Acquire);
        CircuitBreakerSnapshot {
            name: self.name.clone(),
            state: self.state(),
            failures: self.state.failures.load(Ordering::Acquire),
            successes: self.state.successes.load(Ordering::Acquire),
            last_fail_time: (epoch_millis > 0)
                .then(|| UNIX_EPOCH + Duration::from_millis(epoch_millis)),
        }
    }

    /// Runs `operation` if the breaker currently admits a call, updating state
    /// from the outcome. Rejects with `ResilienceError::CircuitOpen` without
    /// invoking `operation` when OPEN and still within `reset_timeout`.
    pub async fn execute<T, E, Fut, Op>(&self, mut operation: Op) -> Result<T, ResilienceError<E>>
    where
        T: Send,
        E: std::error::Error + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ResilienceError<E>>> + Send,
        Op: FnMut() -> Fut + Send,
    {
        loop {
            match self.state.state.load(Ordering::Acquire) {
                STATE_OPEN => {
                    let opened_at = self.state.last_fail_monotonic_millis.load(Ordering::Acquire);
                    let elapsed = self.now_millis().saturating_sub(opened_at);

                    if elapsed <= self.config.reset_timeout.as_millis() as u64 {
                        return Err(ResilienceError::CircuitOpen {
                            name: self.name.clone(),
                            failure_count: self.state.failures.load(Ordering::Acquire),
                            open_duration: Duration::from_millis(elapsed),
                        });
                    }

                    match self.state.state.compare_exchange(
                        STATE_OPEN,
                        STATE_HALF_OPEN,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    ) {
                        Ok(_) => {
                            self.state.successes.store(0, Ordering::Release);
                            tracing::info!(breaker = %self.name, "circuit breaker -> half-open");
                            break;
                        }
                        Err(_) => continue,
                    }
                }
                STATE_HALF_OPEN | STATE_CLOSED => break,
                _ => unreachable!("invalid circuit breaker state"),
            }
        }

        let result = operation().await;
        match &result {
            Ok(_) => self.on_success(),
            Err(_) => self.on_failure(),
        }
        result
    }

    fn on_success(&self) {
        match self.state.state.load(Ordering::Acquire) {
            STATE_HALF_OPEN => {
                let successes = self.state.successes.fetch_add(1, Ordering::AcqRel) + 1;
                if successes >= self.config.half_open_limit
                    && self
                        .state
                        .state
                        .compare_exchange(STATE_HALF_OPEN, STATE_CLOSED, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                {
                    self.state.failures.store(0, Ordering::Release);
                    self.state.successes.store(0, Ordering::Release);
                    tracing::info!(breaker = %self.name, "circuit breaker -> closed");
                }
            }
            STATE_CLOSED => {
                self.state.failures.store(0, Ordering::Release);
            }
            _ => {}
        }
    }

    fn on_failure(&self) {
        let now = self.now_millis();
        let epoch_now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64;

        match self.state.state.load(Ordering::Acquire) {
            STATE_HALF_OPEN => {
                if self
                    .state
                    .state
                    .compare_exchange(STATE_HALF_OPEN, STATE_OPEN, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    self.state.last_fail_monotonic_millis.store(now, Ordering::Release);
                    self.state.last_fail_epoch_millis.store(epoch_now, Ordering::Release);
                    tracing::warn!(breaker = %self.name, "circuit breaker: half-open probe failed -> open");
                }
            }
            STATE_CLOSED => {
                let failures = self.state.failures.fetch_add(1, Ordering::AcqRel) + 1;
                self.state.last_fail_monotonic_millis.store(now, Ordering::Release);
                self.state.last_fail_epoch_millis.store(epoch_now, Ordering::Release);
                if failures >= self.config.max_failures
                    && self
                        .state
                        .state
                        .compare_exchange(STATE_CLOSED, STATE_OPEN, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                {
                    tracing::error!(
                        breaker = %self.name,
                        failures,
                        threshold = self.config.max_failures,
                        "circuit breaker -> open"
                    );
                }
            }
            _ => {}
        }
    }

    fn now_millis(&self) -> u64 {
        self.clock.now_millis()
    }
}
