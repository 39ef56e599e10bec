#![forbid(unsafe_code)]

//! # clusterark
//!
//! A resilient backup pipeline for container-orchestration clusters:
//! discovery, filtering, per-object extraction, and crash-consistent export
//! to an object store, wrapped in a retry-with-backoff and circuit-breaker
//! resilience envelope.
//!
//! This crate is the pipeline core only: it depends on two external
//! collaborator traits (`ClusterApi`, `ObjectStore`) rather than concrete
//! SDKs. See `clusterark-kube` and `clusterark-s3` for real bindings, and
//! `clusterark-cli` for a runnable binary.
//!
//! ## Quick start
//!
//! ```rust
//! use clusterark::prelude::*;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() {
//! let cluster_breaker = CircuitBreakerPolicy::new("cluster-api", CircuitBreakerConfig::default());
//! let cluster_retry: RetryPolicy<ClusterApiError> =
//!     RetryPolicy::new(RetryConfig::new(3, Duration::from_millis(200), Duration::from_secs(5), 2.0));
//! let cluster_envelope = Envelope::new(cluster_breaker, cluster_retry);
//!
//! let store_breaker = CircuitBreakerPolicy::new("object-store", CircuitBreakerConfig::default());
//! let store_retry: RetryPolicy<ObjectStoreError> =
//!     RetryPolicy::new(RetryConfig::new(3, Duration::from_millis(200), Duration::from_secs(5), 2.0));
//! let store_envelope = Envelope::new(store_breaker, store_retry);
//!
//! let cluster_api = MockClusterApi::default();
//! let store = InMemoryObjectStore::with_bucket("backups");
//!
//! let config = Config {
//!     cluster_name: "prod".into(),
//!     destination_bucket: "backups".into(),
//!     store_endpoint: "http://minio.local".into(),
//!     auto_create_bucket: false,
//! };
//!
//! let orchestrator = Orchestrator::new(
//!     config,
//!     BackupPolicy::default(),
//!     &cluster_api,
//!     cluster_envelope,
//!     &store,
//!     store_envelope,
//! );
//!
//! let mut sink = NullSink;
//! let _result = orchestrator.execute_backup(&CancellationToken::new(), &mut sink).await;
//! # }
//! ```

mod backoff;
mod bulkhead;
mod circuit_breaker;
mod clock;
mod cluster;
mod envelope;
mod error;
mod extractor;
mod filter;
mod model;
mod orchestrator;
mod retry;
mod sleeper;
mod store;
mod telemetry;

pub use bulkhead::BulkheadPolicy;
pub use circuit_breaker::{CircuitBreakerConfig, CircuitBreakerPolicy, CircuitState};
pub use clock::{Clock, MonotonicClock};
pub use cluster::{ClusterApi, ClusterEnumerator, DiscoveryOutcome, MockClusterApi, RawObject};
pub use envelope::Envelope;
pub use error::{ClusterApiError, ObjectStoreError, PreflightError, ResilienceError};
pub use extractor::{ExtractionOutcome, ObjectExtractor};
pub use filter::{difference, filter_namespaces, intersection, should_backup_resource};
pub use model::{
    BackupErrorEntry, BackupErrorKind, BackupPolicy, BackupResult, CircuitBreakerState, Config,
    FilteringMode, ObjectRecord, ResourceDescriptor, RetryConfig, StorageKey,
};
pub use orchestrator::Orchestrator;
pub use retry::RetryPolicy;
pub use sleeper::{InstantSleeper, Sleeper, TokioSleeper, TrackingSleeper};
pub use store::{InMemoryObjectStore, ListedObject, ObjectStore, PutReceipt, StoreWriter};
pub use telemetry::{BackupEvent, LogSink, MemorySink, NullSink, TelemetrySink};

pub mod prelude;
