//! Observability: the core emits `BackupEvent`s through a `TelemetrySink`
//! modeled as a `tower::Service`, so any exposition format (logs, metrics,
//! tracing spans) can be plugged in without the core depending on it.

use crate::circuit_breaker::CircuitState;
use crate::model::BackupResult;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::task::{Context, Poll};
use std::time::Duration;
use tower_service::Service;

/// Everything the pipeline reports about its own progress and the
/// resilience envelope's decisions.
#[derive(Debug, Clone)]
pub enum BackupEvent {
    RetryAttempt { dependency: &'static str, attempt: usize, delay: Duration },
    RetryExhausted { dependency: &'static str, attempts: usize },
    CircuitStateChanged { name: String, from: CircuitState, to: CircuitState },
    DiscoveryPartial,
    Cancelled,
    RunCompleted(BackupResult),
}

pub trait TelemetrySink: Service<BackupEvent, Response = (), Error = Infallible> + Send {}
impl<T> TelemetrySink for T where T: Service<BackupEvent, Response = (), Error = Infallible> + Send {}

type SinkFuture = Pin<Box<dyn Future<Output = Result<(), Infallible>> + Send>>;

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl Service<BackupEvent> for NullSink {
    type Response = ();
    type Error = Infallible;
    type Future = SinkFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _event: BackupEvent) -> Self::Future {
        Box::pin(async { Ok(()) })
    }
}

/// Logs each event at an appropriate level via `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl Service<BackupEvent> for LogSink {
    type Response = ();
    type Error = Infallible;
    type Future = SinkFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: BackupEvent) -> Self::Future {
        match &event {
            BackupEvent::RetryAttempt { dependency, attempt, delay } => {
                tracing::debug!(dependency, attempt, ?delay, "retrying");
            }
            BackupEvent::RetryExhausted { dependency, attempts } => {
                tracing::warn!(dependency, attempts, "retry exhausted");
            }
            BackupEvent::CircuitStateChanged { name, from, to } => {
                tracing::info!(breaker = %name, ?from, ?to, "circuit breaker state changed");
            }
            BackupEvent::DiscoveryPartial => {
                tracing::warn!("discovery returned a partial list");
            }
            BackupEvent::Cancelled => {
                tracing::warn!("run cancelled");
            }
            BackupEvent::RunCompleted(result) => {
                tracing::info!(
                    objects = result.objects_backed_up,
                    bytes = result.bytes_backed_up,
                    namespaces = result.namespaces_backed_up,
                    errors = result.errors.len(),
                    duration = ?result.duration,
                    "backup run completed"
                );
            }
        }
        Box::pin(async { Ok(()) })
    }
}

/// Records every event in-memory; used by tests and short-lived tools.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<BackupEvent>>,
}

impl MemorySink {
    pub fn events(&self) -> Vec<BackupEvent> {
        self.events.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl Service<BackupEvent> for &MemorySink {
    type Response = ();
    type Error = Infallible;
    type Future = SinkFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: BackupEvent) -> Self::Future {
        self.events.lock().unwrap_or_else(|p| p.into_inner()).push(event);
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_sink_records_events() {
        let sink = MemorySink::default();
        let mut handle = &sink;
        handle.call(BackupEvent::DiscoveryPartial).await.unwrap();
        handle.call(BackupEvent::Cancelled).await.unwrap();
        assert_eq!(sink.events().len(), 2);
    }

    #[tokio::test]
    async fn null_sink_always_succeeds() {
        let mut sink = NullSink;
        assert!(sink.call(BackupEvent::DiscoveryPartial).await.is_ok());
    }
}
