//! `ClusterApi` external interface and Cluster Enumerator (C5).

use crate::envelope::Envelope;
use crate::error::ClusterApiError;
use crate::model::ResourceDescriptor;
use crate::ResilienceError;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// One object as returned by the cluster API's generic `list` operation,
/// before the Object Extractor stamps a `ReadAt` timestamp on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawObject {
    pub name: String,
    pub serialized_payload: Vec<u8>,
}

/// Result of discovering the cluster's namespaced resource kinds. A
/// group-discovery failure that still returns a partial list is carried as
/// `partial = true` rather than an error; the caller records it non-fatally.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryOutcome {
    pub resources: Vec<ResourceDescriptor>,
    pub partial: bool,
}

/// Collaborator consumed by the pipeline: namespace listing, namespaced-kind
/// discovery, and generic per-(namespace, kind) object listing.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    async fn list_namespaces(&self) -> Result<Vec<String>, ClusterApiError>;

    async fn list_namespaced_kinds(&self) -> Result<DiscoveryOutcome, ClusterApiError>;

    /// Bulk listing for one (namespace, kind) pair. A wholesale failure (the
    /// call itself errors) is distinct from a per-object failure (an `Err`
    /// element inside an otherwise-successful list). Listings are treated as
    /// fallible sequences rather than out-of-band exceptions.
    async fn list_objects(
        &self,
        descriptor: &ResourceDescriptor,
        namespace: &str,
    ) -> Result<Vec<Result<RawObject, ClusterApiError>>, ClusterApiError>;
}

/// Cluster Enumerator (C5): thin wrapper driving `ClusterApi` through the
/// resilience envelope.
pub struct ClusterEnumerator<C: ClusterApi> {
    api: C,
    namespaces_envelope: Envelope<ClusterApiError>,
    discovery_envelope: Envelope<ClusterApiError>,
}

impl<C: ClusterApi> ClusterEnumerator<C> {
    pub fn new(
        api: C,
        namespaces_envelope: Envelope<ClusterApiError>,
        discovery_envelope: Envelope<ClusterApiError>,
    ) -> Self {
        Self { api, namespaces_envelope, discovery_envelope }
    }

    pub async fn list_namespaces(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, ResilienceError<ClusterApiError>> {
        self.namespaces_envelope.execute(cancel, || self.api.list_namespaces()).await
    }

    /// Whole-list failure propagates as an error; a partial result is
    /// returned as `Ok` with `partial = true` for the caller to record
    /// non-fatally.
    pub async fn list_namespaced_kinds(
        &self,
        cancel: &CancellationToken,
    ) -> Result<DiscoveryOutcome, ResilienceError<ClusterApiError>> {
        self.discovery_envelope.execute(cancel, || self.api.list_namespaced_kinds()).await
    }

    pub fn api(&self) -> &C {
        &self.api
    }
}

/// In-memory `ClusterApi` for tests, configurable to simulate failures and
/// partial discovery.
#[derive(Default)]
pub struct MockClusterApi {
    pub namespaces: Vec<String>,
    pub resources: Vec<ResourceDescriptor>,
    pub objects: std::collections::HashMap<(String, String), Vec<RawObject>>,
    pub namespaces_error: Option<ClusterApiError>,
    pub discovery_partial: bool,
    pub discovery_error: Option<ClusterApiError>,
    pub list_objects_error: std::collections::HashMap<(String, String), ClusterApiError>,
}

#[async_trait]
impl ClusterApi for MockClusterApi {
    async fn list_namespaces(&self) -> Result<Vec<String>, ClusterApiError> {
        if let Some(err) = &self.namespaces_error {
            return Err(err.clone());
        }
        Ok(self.namespaces.clone())
    }

    async fn list_namespaced_kinds(&self) -> Result<DiscoveryOutcome, ClusterApiError> {
        if let Some(err) = &self.discovery_error {
            return Err(err.clone());
        }
        Ok(DiscoveryOutcome { resources: self.resources.clone(), partial: self.discovery_partial })
    }

    async fn list_objects(
        &self,
        descriptor: &ResourceDescriptor,
        namespace: &str,
    ) -> Result<Vec<Result<RawObject, ClusterApiError>>, ClusterApiError> {
        if let Some(err) = self.list_objects_error.get(&(namespace.to_string(), descriptor.plural_name.clone())) {
            return Err(err.clone());
        }
        Ok(self
            .objects
            .get(&(namespace.to_string(), descriptor.plural_name.clone()))
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(Ok)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerPolicy};
    use crate::model::RetryConfig;
    use crate::retry::RetryPolicy;
    use crate::InstantSleeper;
    use std::time::Duration;

    fn test_envelope() -> Envelope<ClusterApiError> {
        let breaker =
            CircuitBreakerPolicy::new("cluster-api", CircuitBreakerConfig { max_failures: 3, ..Default::default() });
        let retry = RetryPolicy::new(RetryConfig::new(2, Duration::from_millis(1), Duration::from_millis(5), 2.0))
            .with_sleeper(InstantSleeper);
        Envelope::new(breaker, retry)
    }

    #[tokio::test]
    async fn list_namespaces_returns_observed_set() {
        let api = MockClusterApi { namespaces: vec!["default".into(), "kube-system".into()], ..Default::default() };
        let enumerator = ClusterEnumerator::new(api, test_envelope(), test_envelope());
        let result = enumerator.list_namespaces(&CancellationToken::new()).await.unwrap();
        assert_eq!(result, vec!["default".to_string(), "kube-system".to_string()]);
    }

    #[tokio::test]
    async fn partial_discovery_is_not_an_error() {
        let api = MockClusterApi {
            resources: vec![ResourceDescriptor {
                group_version: "v1".into(),
                kind: "Pod".into(),
                plural_name: "pods".into(),
                namespaced: true,
            }],
            discovery_partial: true,
            ..Default::default()
        };
        let enumerator = ClusterEnumerator::new(api, test_envelope(), test_envelope());
        let outcome = enumerator.list_namespaced_kinds(&CancellationToken::new()).await.unwrap();
        assert!(outcome.partial);
        assert_eq!(outcome.resources.len(), 1);
    }

    #[tokio::test]
    async fn wholesale_discovery_failure_propagates() {
        let api = MockClusterApi {
            discovery_error: Some(ClusterApiError::Transient("down".into())),
            ..Default::default()
        };
        let enumerator = ClusterEnumerator::new(api, test_envelope(), test_envelope());
        let result = enumerator.list_namespaced_kinds(&CancellationToken::new()).await;
        assert!(result.is_err());
    }
}
