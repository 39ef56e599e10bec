//! Pipeline Orchestrator (C8): the top-level driver. Runs preflight,
//! resolves the effective (namespace, kind) product, and drives C5/C6/C7 to
//! produce a `BackupResult`.
//!
//! Parallelizing the Cartesian iteration across worker tasks is permitted
//! but not required. This implementation keeps it sequential at the
//! (namespace, kind) granularity, which is the core's conceptual model and
//! trivially satisfies the ordering and mutual-exclusion invariants without
//! needing a worker pool. See DESIGN.md.

use crate::cluster::ClusterApi;
use crate::envelope::Envelope;
use crate::error::{ClusterApiError, ObjectStoreError, PreflightError};
use crate::extractor::ObjectExtractor;
use crate::filter::{filter_namespaces, should_backup_resource};
use crate::model::{BackupErrorEntry, BackupErrorKind, BackupPolicy, BackupResult, Config, StorageKey};
use crate::store::{ObjectStore, StoreWriter};
use crate::telemetry::{BackupEvent, TelemetrySink};
use crate::ResilienceError;
use std::time::{Duration, Instant, SystemTime};
use tokio_util::sync::CancellationToken;
use tower_service::Service;

pub struct Orchestrator<'a, C: ClusterApi, S: ObjectStore> {
    config: Config,
    policy: BackupPolicy,
    cluster_api: &'a C,
    cluster_envelope: Envelope<ClusterApiError>,
    store: &'a S,
    store_envelope: Envelope<ObjectStoreError>,
}

impl<'a, C: ClusterApi, S: ObjectStore> Orchestrator<'a, C, S> {
    pub fn new(
        config: Config,
        policy: BackupPolicy,
        cluster_api: &'a C,
        cluster_envelope: Envelope<ClusterApiError>,
        store: &'a S,
        store_envelope: Envelope<ObjectStoreError>,
    ) -> Self {
        Self { config, policy, cluster_api, cluster_envelope, store, store_envelope }
    }

    /// Runs one full backup. Preflight failures are fatal and return
    /// immediately; every other failure is folded into `BackupResult.errors`
    /// and the run continues.
    pub async fn execute_backup<T: TelemetrySink>(
        &self,
        cancel: &CancellationToken,
        telemetry: &mut T,
    ) -> Result<BackupResult, PreflightError> {
        let start_time = SystemTime::now();
        let start_instant = Instant::now();

        let writer = StoreWriter::new(self.store, self.config.destination_bucket.clone(), self.config.auto_create_bucket, &self.store_envelope);
        writer.preflight(cancel).await?;

        let run_timestamp = format_run_timestamp(start_time);
        let mut result = BackupResult {
            start_time,
            end_time: start_time,
            duration: Duration::from_nanos(1),
            namespaces_backed_up: 0,
            objects_backed_up: 0,
            bytes_backed_up: 0,
            per_namespace_counts: Default::default(),
            errors: Vec::new(),
        };

        if cancel.is_cancelled() {
            result.record_error("", "", BackupErrorKind::Cancelled, "cancelled before run started");
            finalize(&mut result, start_instant);
            let _ = emit(telemetry, BackupEvent::Cancelled).await;
            return Ok(result);
        }

        let namespaces = match self.cluster_envelope.execute(cancel, || self.cluster_api.list_namespaces()).await {
            Ok(namespaces) => namespaces,
            Err(e) => {
                record_resilience_error(&mut result, "", "", &e);
                finalize(&mut result, start_instant);
                return Ok(result);
            }
        };
        let effective_namespaces = filter_namespaces(&namespaces, &self.policy);

        let discovery = match self
            .cluster_envelope
            .execute(cancel, || self.cluster_api.list_namespaced_kinds())
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                record_resilience_error(&mut result, "", "", &e);
                finalize(&mut result, start_instant);
                return Ok(result);
            }
        };
        if discovery.partial {
            result.record_error("", "", BackupErrorKind::DiscoveryPartial, "discovery returned a partial list");
            let _ = emit(telemetry, BackupEvent::DiscoveryPartial).await;
        }

        let kinds: Vec<_> = discovery
            .resources
            .into_iter()
            .filter(|d| d.namespaced && should_backup_resource(&d.plural_name, &self.policy))
            .collect();

        result.namespaces_backed_up = effective_namespaces.len() as u64;

        'outer: for namespace in &effective_namespaces {
            for descriptor in &kinds {
                if cancel.is_cancelled() {
                    result.record_error(namespace, "", BackupErrorKind::Cancelled, "cancelled mid-run");
                    let _ = emit(telemetry, BackupEvent::Cancelled).await;
                    break 'outer;
                }

                let extractor = ObjectExtractor::new(self.cluster_api, &self.cluster_envelope);
                let outcome = extractor.extract(cancel, descriptor, namespace).await;
                result.errors.extend(outcome.errors);

                for record in outcome.records {
                    let key = StorageKey::build(&self.config.cluster_name, &run_timestamp, &record);
                    match writer.put(cancel, &key, &record.serialized_payload).await {
                        Ok(receipt) => result.record_object(namespace, receipt.size),
                        Err(e) => record_resilience_error(&mut result, namespace, &descriptor.plural_name, &e),
                    }
                }
            }
        }

        finalize(&mut result, start_instant);
        let _ = emit(telemetry, BackupEvent::RunCompleted(result.clone())).await;
        Ok(result)
    }
}

fn finalize(result: &mut BackupResult, start_instant: Instant) {
    result.end_time = SystemTime::now();
    let elapsed = start_instant.elapsed();
    result.duration = if elapsed.is_zero() { Duration::from_nanos(1) } else { elapsed };
    if result.end_time < result.start_time {
        result.end_time = result.start_time;
    }
}

fn record_resilience_error<E: std::fmt::Display>(
    result: &mut BackupResult,
    namespace: &str,
    kind: &str,
    err: &ResilienceError<E>,
) {
    let error_kind = match err {
        ResilienceError::CircuitOpen { .. } => BackupErrorKind::CircuitOpen,
        ResilienceError::RetryExhausted { .. } => BackupErrorKind::RetryExhausted,
        ResilienceError::Cancelled => BackupErrorKind::Cancelled,
        ResilienceError::Bulkhead { .. } | ResilienceError::Inner(_) => BackupErrorKind::ObjectWrite,
    };
    result.record_error(namespace, kind, error_kind, err.to_string());
}

fn format_run_timestamp(at: SystemTime) -> String {
    let datetime: chrono::DateTime<chrono::Utc> = at.into();
    datetime.format("%Y%m%dT%H%M%SZ").to_string()
}

async fn emit<T: TelemetrySink>(sink: &mut T, event: BackupEvent) -> Result<(), std::convert::Infallible> {
    std::future::poll_fn(|cx| Service::poll_ready(sink, cx)).await?;
    Service::call(sink, event).await
}

impl BackupErrorEntry {
    #[cfg(test)]
    fn matches(&self, kind: BackupErrorKind) -> bool {
        self.error_kind == kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerPolicy};
    use crate::cluster::{MockClusterApi, RawObject};
    use crate::model::{FilteringMode, RetryConfig, ResourceDescriptor};
    use crate::retry::RetryPolicy;
    use crate::store::InMemoryObjectStore;
    use crate::telemetry::NullSink;
    use crate::InstantSleeper;

    fn envelope<E>(name: &str) -> Envelope<E>
    where
        E: std::error::Error + Send + Sync + Clone + 'static,
    {
        let breaker = CircuitBreakerPolicy::new(name, CircuitBreakerConfig { max_failures: 3, ..Default::default() });
        let retry = RetryPolicy::new(RetryConfig::new(2, Duration::from_millis(1), Duration::from_millis(5), 2.0))
            .with_sleeper(InstantSleeper);
        Envelope::new(breaker, retry)
    }

    fn config() -> Config {
        Config {
            cluster_name: "prod".into(),
            destination_bucket: "backups".into(),
            store_endpoint: "http://minio.local".into(),
            auto_create_bucket: false,
        }
    }

    fn pods() -> ResourceDescriptor {
        ResourceDescriptor { group_version: "v1".into(), kind: "Pod".into(), plural_name: "pods".into(), namespaced: true }
    }

    #[tokio::test]
    async fn include_policy_selects_matching_namespaces_and_backs_up_their_objects() {
        let mut api = MockClusterApi {
            namespaces: vec!["default".into(), "kube-system".into(), "test-namespace".into(), "openshift-config".into()],
            resources: vec![pods()],
            ..Default::default()
        };
        api.objects.insert(("default".into(), "pods".into()), vec![RawObject { name: "a".into(), serialized_payload: b"{}".to_vec() }]);
        api.objects.insert(("test-namespace".into(), "pods".into()), vec![RawObject { name: "b".into(), serialized_payload: b"{}".to_vec() }]);

        let store = InMemoryObjectStore::with_bucket("backups");
        let policy = BackupPolicy {
            filtering_mode: FilteringMode::Whitelist,
            include_namespaces: vec!["default".into(), "test-namespace".into()],
            exclude_namespaces: vec![],
            include_resources: vec!["pods".into()],
            exclude_resources: vec![],
        };

        let orchestrator = Orchestrator::new(config(), policy, &api, envelope("cluster-api"), &store, envelope("object-store"));
        let mut sink = NullSink;
        let result = orchestrator.execute_backup(&CancellationToken::new(), &mut sink).await.unwrap();

        assert_eq!(result.namespaces_backed_up, 2);
        assert!(result.errors.is_empty());
        assert!(result.duration > Duration::ZERO);
        assert_eq!(result.objects_backed_up, 2);
    }

    #[tokio::test]
    async fn missing_bucket_is_created_when_auto_create_enabled() {
        let api = MockClusterApi { namespaces: vec!["default".into()], ..Default::default() };
        let store = InMemoryObjectStore::default();
        let mut cfg = config();
        cfg.auto_create_bucket = true;
        let policy = BackupPolicy { include_namespaces: vec!["default".into()], ..Default::default() };

        let orchestrator = Orchestrator::new(cfg, policy, &api, envelope("cluster-api"), &store, envelope("object-store"));
        let mut sink = NullSink;
        let result = orchestrator.execute_backup(&CancellationToken::new(), &mut sink).await.unwrap();
        assert_eq!(result.namespaces_backed_up, 1);
        assert!(store.bucket_exists("backups").await.unwrap());
    }

    #[tokio::test]
    async fn missing_bucket_without_auto_create_is_fatal() {
        let api = MockClusterApi::default();
        let store = InMemoryObjectStore::default();
        let orchestrator = Orchestrator::new(config(), BackupPolicy::default(), &api, envelope("cluster-api"), &store, envelope("object-store"));
        let mut sink = NullSink;
        let result = orchestrator.execute_backup(&CancellationToken::new(), &mut sink).await;
        assert!(matches!(result, Err(PreflightError::BucketMissing { .. })));
    }

    #[tokio::test]
    async fn exclude_policy_filters_namespaces_by_substring() {
        let api = MockClusterApi {
            namespaces: vec!["default".into(), "kube-system".into(), "kube-proxy".into(), "test-ns".into()],
            resources: vec![pods()],
            ..Default::default()
        };
        let store = InMemoryObjectStore::with_bucket("backups");
        let policy = BackupPolicy { exclude_namespaces: vec!["kube".into()], ..Default::default() };
        let orchestrator = Orchestrator::new(config(), policy, &api, envelope("cluster-api"), &store, envelope("object-store"));
        let mut sink = NullSink;
        let result = orchestrator.execute_backup(&CancellationToken::new(), &mut sink).await.unwrap();
        assert_eq!(result.namespaces_backed_up, 2);
    }

    #[tokio::test]
    async fn empty_policy_intersection_is_a_valid_zero_object_run() {
        let api = MockClusterApi { namespaces: vec!["default".into()], resources: vec![pods()], ..Default::default() };
        let store = InMemoryObjectStore::with_bucket("backups");
        let policy = BackupPolicy { include_namespaces: vec!["nonexistent".into()], ..Default::default() };
        let orchestrator = Orchestrator::new(config(), policy, &api, envelope("cluster-api"), &store, envelope("object-store"));
        let mut sink = NullSink;
        let result = orchestrator.execute_backup(&CancellationToken::new(), &mut sink).await.unwrap();
        assert_eq!(result.namespaces_backed_up, 0);
        assert_eq!(result.objects_backed_up, 0);
        assert!(result.errors.is_empty());
    }

    #[tokio::test]
    async fn breaker_trip_mid_run_yields_circuit_open_entries_with_partial_totals() {
        let mut api = MockClusterApi {
            namespaces: vec!["ns-a".into(), "ns-b".into(), "ns-c".into()],
            resources: vec![pods()],
            ..Default::default()
        };
        api.objects.insert(
            ("ns-a".into(), "pods".into()),
            vec![RawObject { name: "web-1".into(), serialized_payload: b"{}".to_vec() }],
        );
        api.list_objects_error.insert(("ns-b".into(), "pods".into()), ClusterApiError::Transient("down".into()));
        api.list_objects_error.insert(("ns-c".into(), "pods".into()), ClusterApiError::Transient("down".into()));

        let store = InMemoryObjectStore::with_bucket("backups");

        // One failed (namespace, kind) call is enough to open the breaker, so
        // the ns-c extraction never reaches the cluster API at all.
        let breaker = CircuitBreakerPolicy::new(
            "cluster-api",
            CircuitBreakerConfig { max_failures: 1, ..Default::default() },
        );
        let retry = RetryPolicy::new(RetryConfig::new(1, Duration::from_millis(1), Duration::from_millis(5), 2.0))
            .with_sleeper(InstantSleeper);
        let cluster_envelope = Envelope::new(breaker, retry);

        let orchestrator =
            Orchestrator::new(config(), BackupPolicy::default(), &api, cluster_envelope, &store, envelope("object-store"));
        let mut sink = NullSink;
        let result = orchestrator.execute_backup(&CancellationToken::new(), &mut sink).await.unwrap();

        assert_eq!(result.objects_backed_up, 1, "ns-a's object should still be backed up");
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors.iter().any(|e| e.matches(BackupErrorKind::RetryExhausted)));
        assert!(
            result.errors.iter().any(|e| e.matches(BackupErrorKind::CircuitOpen)),
            "ns-c should be rejected by the already-open breaker"
        );
    }

    #[tokio::test]
    async fn cancellation_before_run_records_single_cancelled_entry() {
        let api = MockClusterApi { namespaces: vec!["default".into()], ..Default::default() };
        let store = InMemoryObjectStore::with_bucket("backups");
        let orchestrator = Orchestrator::new(config(), BackupPolicy::default(), &api, envelope("cluster-api"), &store, envelope("object-store"));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut sink = NullSink;
        let result = orchestrator.execute_backup(&cancel, &mut sink).await.unwrap();
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].matches(BackupErrorKind::Cancelled));
    }
}
