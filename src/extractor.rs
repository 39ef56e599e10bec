//! Object Extractor (C6): for a (namespace, kind) pair, fetches the objects
//! and their serialized representations, stamping each with `ReadAt`.

use crate::cluster::{ClusterApi, RawObject};
use crate::envelope::Envelope;
use crate::error::ClusterApiError;
use crate::model::{BackupErrorEntry, BackupErrorKind, ObjectRecord, ResourceDescriptor};
use crate::ResilienceError;
use std::time::SystemTime;
use tokio_util::sync::CancellationToken;

pub struct ObjectExtractor<'a, C: ClusterApi> {
    api: &'a C,
    envelope: &'a Envelope<ClusterApiError>,
}

/// Outcome of extracting one (namespace, kind) pair: the records that were
/// successfully read, plus any per-occurrence errors to fold into the run's
/// `BackupResult.errors` without aborting iteration.
#[derive(Debug, Default)]
pub struct ExtractionOutcome {
    pub records: Vec<ObjectRecord>,
    pub errors: Vec<BackupErrorEntry>,
}

impl<'a, C: ClusterApi> ObjectExtractor<'a, C> {
    pub fn new(api: &'a C, envelope: &'a Envelope<ClusterApiError>) -> Self {
        Self { api, envelope }
    }

    pub async fn extract(
        &self,
        cancel: &CancellationToken,
        descriptor: &ResourceDescriptor,
        namespace: &str,
    ) -> ExtractionOutcome {
        let result =
            self.envelope.execute(cancel, || self.api.list_objects(descriptor, namespace)).await;

        let raw = match result {
            Ok(raw) => raw,
            Err(err) => {
                return ExtractionOutcome {
                    records: Vec::new(),
                    errors: vec![single_error(namespace, &descriptor.plural_name, &err)],
                };
            }
        };

        let mut outcome = ExtractionOutcome::default();
        for item in raw {
            match item {
                Ok(RawObject { name, serialized_payload }) => {
                    outcome.records.push(ObjectRecord {
                        namespace: namespace.to_string(),
                        kind: descriptor.plural_name.clone(),
                        name,
                        serialized_payload,
                        read_at: SystemTime::now(),
                    });
                }
                Err(e) => {
                    outcome.errors.push(BackupErrorEntry {
                        namespace: namespace.to_string(),
                        kind: descriptor.plural_name.clone(),
                        error_kind: BackupErrorKind::ObjectFetch,
                        message: e.to_string(),
                    });
                }
            }
        }
        outcome
    }
}

fn single_error(
    namespace: &str,
    kind: &str,
    err: &ResilienceError<ClusterApiError>,
) -> BackupErrorEntry {
    let error_kind = match err {
        ResilienceError::CircuitOpen { .. } => BackupErrorKind::CircuitOpen,
        ResilienceError::RetryExhausted { .. } => BackupErrorKind::RetryExhausted,
        ResilienceError::Cancelled => BackupErrorKind::Cancelled,
        ResilienceError::Bulkhead { .. } | ResilienceError::Inner(_) => BackupErrorKind::ObjectFetch,
    };
    BackupErrorEntry {
        namespace: namespace.to_string(),
        kind: kind.to_string(),
        error_kind,
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerPolicy};
    use crate::cluster::MockClusterApi;
    use crate::model::RetryConfig;
    use crate::retry::RetryPolicy;
    use crate::InstantSleeper;
    use std::time::Duration;

    fn test_envelope() -> Envelope<ClusterApiError> {
        let breaker =
            CircuitBreakerPolicy::new("cluster-api", CircuitBreakerConfig { max_failures: 5, ..Default::default() });
        let retry = RetryPolicy::new(RetryConfig::new(1, Duration::from_millis(1), Duration::from_millis(5), 2.0))
            .with_sleeper(InstantSleeper);
        Envelope::new(breaker, retry)
    }

    fn pods() -> ResourceDescriptor {
        ResourceDescriptor { group_version: "v1".into(), kind: "Pod".into(), plural_name: "pods".into(), namespaced: true }
    }

    #[tokio::test]
    async fn successful_extraction_stamps_read_at() {
        let mut api = MockClusterApi::default();
        api.objects.insert(
            ("default".into(), "pods".into()),
            vec![RawObject { name: "web-1".into(), serialized_payload: b"{}".to_vec() }],
        );
        let envelope = test_envelope();
        let extractor = ObjectExtractor::new(&api, &envelope);

        let outcome = extractor.extract(&CancellationToken::new(), &pods(), "default").await;
        assert_eq!(outcome.records.len(), 1);
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.records[0].name, "web-1");
    }

    #[tokio::test]
    async fn per_object_error_does_not_abort_the_rest() {
        let mut api = MockClusterApi::default();
        api.objects.insert(("default".into(), "pods".into()), vec![]);
        let envelope = test_envelope();
        let extractor = ObjectExtractor::new(&api, &envelope);

        // Empty listing: zero records, zero errors is a valid, non-fatal outcome.
        let outcome = extractor.extract(&CancellationToken::new(), &pods(), "default").await;
        assert!(outcome.records.is_empty());
        assert!(outcome.errors.is_empty());
    }

    #[tokio::test]
    async fn total_list_failure_yields_one_error_entry() {
        let mut api = MockClusterApi::default();
        api.list_objects_error.insert(("default".into(), "pods".into()), ClusterApiError::Other("boom".into()));
        let envelope = test_envelope();
        let extractor = ObjectExtractor::new(&api, &envelope);

        let outcome = extractor.extract(&CancellationToken::new(), &pods(), "default").await;
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].namespace, "default");
        assert_eq!(outcome.errors[0].kind, "pods");
    }
}
