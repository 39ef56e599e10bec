//! `ObjectStore` external interface and Store Writer (C7).

use crate::envelope::Envelope;
use crate::error::{ObjectStoreError, PreflightError};
use crate::model::StorageKey;
use crate::ResilienceError;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Receipt returned by a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutReceipt {
    pub size: u64,
    pub etag: String,
}

/// One entry yielded while listing a bucket prefix. Modeled as an ordinary
/// fallible iterator item rather than an out-of-band exception.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedObject {
    pub key: String,
    pub size: u64,
}

/// Collaborator consumed by the Store Writer.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, ObjectStoreError>;
    async fn make_bucket(&self, bucket: &str) -> Result<(), ObjectStoreError>;
    async fn put_object(&self, bucket: &str, key: &str, payload: &[u8]) -> Result<PutReceipt, ObjectStoreError>;
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<Result<ListedObject, ObjectStoreError>>, ObjectStoreError>;
    async fn remove_object(&self, bucket: &str, key: &str) -> Result<(), ObjectStoreError>;
}

/// Store Writer (C7): preflight plus per-object uploads, both routed through
/// the resilience envelope.
pub struct StoreWriter<'a, S: ObjectStore> {
    store: &'a S,
    bucket: String,
    auto_create_bucket: bool,
    envelope: &'a Envelope<ObjectStoreError>,
}

impl<'a, S: ObjectStore> StoreWriter<'a, S> {
    pub fn new(store: &'a S, bucket: impl Into<String>, auto_create_bucket: bool, envelope: &'a Envelope<ObjectStoreError>) -> Self {
        Self { store, bucket: bucket.into(), auto_create_bucket, envelope }
    }

    /// Ensures the destination bucket exists, creating it if permitted.
    /// Fatal: aborts the run with no result on failure.
    pub async fn preflight(&self, cancel: &CancellationToken) -> Result<(), PreflightError> {
        let exists = self
            .envelope
            .execute(cancel, || self.store.bucket_exists(&self.bucket))
            .await
            .map_err(|e| PreflightError::StoreUnreachable(e.to_string()))?;

        if exists {
            return Ok(());
        }

        if !self.auto_create_bucket {
            return Err(PreflightError::BucketMissing { bucket: self.bucket.clone() });
        }

        self.envelope
            .execute(cancel, || self.store.make_bucket(&self.bucket))
            .await
            .map_err(|e| PreflightError::BucketCreateFailed {
                bucket: self.bucket.clone(),
                source: e.into_inner().unwrap_or(ObjectStoreError::Other(e.to_string())),
            })
    }

    /// Uploads one object under its deterministic key. Idempotent: re-running
    /// a backup with the same `RunTimestamp` overwrites prior writes.
    pub async fn put(
        &self,
        cancel: &CancellationToken,
        key: &StorageKey,
        payload: &[u8],
    ) -> Result<PutReceipt, ResilienceError<ObjectStoreError>> {
        self.envelope.execute(cancel, || self.store.put_object(&self.bucket, key.as_str(), payload)).await
    }
}

/// In-memory `ObjectStore` for tests.
#[derive(Default)]
pub struct InMemoryObjectStore {
    buckets: std::sync::Mutex<std::collections::HashSet<String>>,
    objects: std::sync::Mutex<std::collections::BTreeMap<String, Vec<u8>>>,
    pub bucket_exists_error: Option<ObjectStoreError>,
    pub make_bucket_error: Option<ObjectStoreError>,
    pub put_object_error: Option<ObjectStoreError>,
}

impl InMemoryObjectStore {
    pub fn with_bucket(bucket: impl Into<String>) -> Self {
        let store = Self::default();
        store.buckets.lock().unwrap().insert(bucket.into());
        store
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, ObjectStoreError> {
        if let Some(err) = &self.bucket_exists_error {
            return Err(err.clone());
        }
        Ok(self.buckets.lock().unwrap().contains(bucket))
    }

    async fn make_bucket(&self, bucket: &str) -> Result<(), ObjectStoreError> {
        if let Some(err) = &self.make_bucket_error {
            return Err(err.clone());
        }
        self.buckets.lock().unwrap().insert(bucket.to_string());
        Ok(())
    }

    async fn put_object(&self, _bucket: &str, key: &str, payload: &[u8]) -> Result<PutReceipt, ObjectStoreError> {
        if let Some(err) = &self.put_object_error {
            return Err(err.clone());
        }
        self.objects.lock().unwrap().insert(key.to_string(), payload.to_vec());
        Ok(PutReceipt { size: payload.len() as u64, etag: format!("{:x}", md5_stub(payload)) })
    }

    async fn list_objects(
        &self,
        _bucket: &str,
        prefix: &str,
    ) -> Result<Vec<Result<ListedObject, ObjectStoreError>>, ObjectStoreError> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| Ok(ListedObject { key: k.clone(), size: v.len() as u64 }))
            .collect())
    }

    async fn remove_object(&self, _bucket: &str, key: &str) -> Result<(), ObjectStoreError> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Cheap non-cryptographic stand-in so the mock can hand back a stable etag
/// without pulling in a real digest crate for test-only code.
fn md5_stub(payload: &[u8]) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    payload.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerPolicy};
    use crate::model::{ObjectRecord, RetryConfig};
    use crate::retry::RetryPolicy;
    use crate::InstantSleeper;
    use std::time::{Duration, SystemTime};

    fn test_envelope() -> Envelope<ObjectStoreError> {
        let breaker =
            CircuitBreakerPolicy::new("object-store", CircuitBreakerConfig { max_failures: 5, ..Default::default() });
        let retry = RetryPolicy::new(RetryConfig::new(2, Duration::from_millis(1), Duration::from_millis(5), 2.0))
            .with_sleeper(InstantSleeper);
        Envelope::new(breaker, retry)
    }

    #[tokio::test]
    async fn preflight_passes_when_bucket_exists() {
        let store = InMemoryObjectStore::with_bucket("backups");
        let envelope = test_envelope();
        let writer = StoreWriter::new(&store, "backups", false, &envelope);
        assert!(writer.preflight(&CancellationToken::new()).await.is_ok());
    }

    #[tokio::test]
    async fn preflight_creates_bucket_when_auto_create_enabled() {
        let store = InMemoryObjectStore::default();
        let envelope = test_envelope();
        let writer = StoreWriter::new(&store, "backups", true, &envelope);
        assert!(writer.preflight(&CancellationToken::new()).await.is_ok());
        assert!(store.bucket_exists("backups").await.unwrap());
    }

    #[tokio::test]
    async fn preflight_fails_when_bucket_missing_and_auto_create_disabled() {
        let store = InMemoryObjectStore::default();
        let envelope = test_envelope();
        let writer = StoreWriter::new(&store, "backups", false, &envelope);
        let err = writer.preflight(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, PreflightError::BucketMissing { .. }));
    }

    #[tokio::test]
    async fn put_produces_deterministic_unique_keys() {
        let store = InMemoryObjectStore::with_bucket("backups");
        let envelope = test_envelope();
        let writer = StoreWriter::new(&store, "backups", false, &envelope);

        let record = ObjectRecord {
            namespace: "default".into(),
            kind: "pods".into(),
            name: "web-1".into(),
            serialized_payload: b"{}".to_vec(),
            read_at: SystemTime::now(),
        };
        let key = StorageKey::build("prod", "20260101T000000Z", &record);
        let receipt = writer.put(&CancellationToken::new(), &key, &record.serialized_payload).await.unwrap();
        assert_eq!(receipt.size, 2);
        assert_eq!(store.object_count(), 1);
    }
}
