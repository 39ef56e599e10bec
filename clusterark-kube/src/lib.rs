//! `ClusterApi` (clusterark core) backed by a real `kube::Client`.
//!
//! Grounded on the `Collect` trait's list-then-filter shape (list the API
//! server, log and carry failures rather than panicking) and on
//! `kube::Api<DynamicObject>` for a type-erased resource client that doesn't
//! require a generated type per Kubernetes kind.

use async_trait::async_trait;
use clusterark::{ClusterApi, ClusterApiError, DiscoveryOutcome, RawObject, ResourceDescriptor};
use k8s_openapi::api::core::v1::Namespace;
use kube::api::{Api, DynamicObject, ListParams};
use kube::core::{ApiResource, GroupVersionKind};
use kube::discovery::Discovery;
use kube::{Client, ResourceExt};

/// Real `ClusterApi` binding: one `kube::Client`, shared across calls.
pub struct KubeClusterApi {
    client: Client,
}

impl KubeClusterApi {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connects using the ambient kubeconfig/in-cluster service account,
    /// following `kube::Client::try_default`'s resolution order.
    pub async fn try_default() -> Result<Self, ClusterApiError> {
        let client = Client::try_default()
            .await
            .map_err(|e| ClusterApiError::Other(format!("failed to build kube client: {e}")))?;
        Ok(Self::new(client))
    }
}

fn classify_kube_error(err: kube::Error) -> ClusterApiError {
    match &err {
        kube::Error::Api(resp) if resp.code == 404 => ClusterApiError::NotFound(resp.message.clone()),
        kube::Error::Api(resp) if resp.code == 429 || resp.code >= 500 => {
            ClusterApiError::Transient(resp.message.clone())
        }
        _ => ClusterApiError::Other(err.to_string()),
    }
}

#[async_trait]
impl ClusterApi for KubeClusterApi {
    async fn list_namespaces(&self) -> Result<Vec<String>, ClusterApiError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let list = api.list(&ListParams::default()).await.map_err(classify_kube_error)?;
        Ok(list.items.into_iter().map(|ns| ns.name_any()).collect())
    }

    async fn list_namespaced_kinds(&self) -> Result<DiscoveryOutcome, ClusterApiError> {
        let discovery = Discovery::new(self.client.clone())
            .run()
            .await
            .map_err(|e| ClusterApiError::Other(format!("discovery failed: {e}")))?;

        let mut resources = Vec::new();
        let mut partial = false;
        for group in discovery.groups() {
            for (api_resource, caps) in group.recommended_resources() {
                if !caps.scope.eq(&kube::discovery::Scope::Namespaced) {
                    continue;
                }
                if !caps.supports_operation("list") {
                    partial = true;
                    continue;
                }
                resources.push(ResourceDescriptor {
                    group_version: api_resource.api_version.clone(),
                    kind: api_resource.kind.clone(),
                    plural_name: api_resource.plural.clone(),
                    namespaced: true,
                });
            }
        }
        Ok(DiscoveryOutcome { resources, partial })
    }

    async fn list_objects(
        &self,
        descriptor: &ResourceDescriptor,
        namespace: &str,
    ) -> Result<Vec<Result<RawObject, ClusterApiError>>, ClusterApiError> {
        let gvk = match descriptor.group_version.split_once('/') {
            Some((group, version)) => GroupVersionKind {
                group: group.to_string(),
                version: version.to_string(),
                kind: descriptor.kind.clone(),
            },
            None => GroupVersionKind {
                group: String::new(),
                version: descriptor.group_version.clone(),
                kind: descriptor.kind.clone(),
            },
        };
        let api_resource = ApiResource::from_gvk_with_plural(&gvk, &descriptor.plural_name);
        let api: Api<DynamicObject> = Api::namespaced_with(self.client.clone(), namespace, &api_resource);

        let list = api.list(&ListParams::default()).await.map_err(classify_kube_error)?;
        let mut out = Vec::with_capacity(list.items.len());
        for obj in list.items {
            let name = obj.name_any();
            match serde_json::to_vec(&obj) {
                Ok(payload) => out.push(Ok(RawObject { name, serialized_payload: payload })),
                Err(e) => {
                    tracing::warn!(namespace, kind = %descriptor.kind, name, error = %e, "failed to serialize object");
                    out.push(Err(ClusterApiError::Other(format!("serialize {name}: {e}"))));
                }
            }
        }
        Ok(out)
    }
}
