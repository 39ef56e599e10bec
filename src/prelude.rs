//! Convenient re-exports for common clusterark types.
pub use crate::{
    BackupErrorEntry, BackupErrorKind, BackupEvent, BackupPolicy, BackupResult,
    BulkheadPolicy, CircuitBreakerConfig, CircuitBreakerPolicy, CircuitBreakerState, CircuitState,
    ClusterApi, ClusterApiError, ClusterEnumerator, Config, DiscoveryOutcome, Envelope,
    ExtractionOutcome, FilteringMode, InMemoryObjectStore, InstantSleeper, ListedObject, LogSink,
    MemorySink, MockClusterApi, NullSink, ObjectExtractor, ObjectRecord, ObjectStore,
    ObjectStoreError, Orchestrator, PreflightError, PutReceipt, RawObject, ResilienceError,
    ResourceDescriptor, RetryConfig, RetryPolicy, Sleeper, StorageKey, StoreWriter, TelemetrySink,
    TokioSleeper, TrackingSleeper,
};
