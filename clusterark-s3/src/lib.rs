//! `ObjectStore` (clusterark core) backed by `aws-sdk-s3`, pointed at a
//! custom endpoint so the same binding covers AWS S3 and MinIO.
//!
//! The `aws-sdk-s3` pin mirrors the manifest precedent in the pack: newer
//! SDK releases have been observed to regress against MinIO/localstack.

use async_trait::async_trait;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use clusterark::{ListedObject, ObjectStore, ObjectStoreError, PutReceipt};

/// Real `ObjectStore` binding over an S3-compatible endpoint.
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a client against `endpoint` (e.g. a MinIO URL) using static
    /// credentials and path-style addressing, which MinIO requires.
    pub async fn connect(endpoint: impl Into<String>, access_key: &str, secret_key: &str, region: &str) -> Self {
        let credentials = Credentials::new(access_key, secret_key, None, None, "clusterark-static");
        let shared_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(region.to_string()))
            .credentials_provider(credentials)
            .load()
            .await;
        let s3_config = aws_sdk_s3::config::Builder::from(&shared_config)
            .endpoint_url(endpoint)
            .force_path_style(true)
            .build();
        Self::new(Client::from_conf(s3_config))
    }
}

fn classify_sdk_error<E, R>(err: aws_sdk_s3::error::SdkError<E, R>) -> ObjectStoreError
where
    E: std::error::Error + aws_sdk_s3::error::ProvideErrorMetadata,
{
    match &err {
        aws_sdk_s3::error::SdkError::ServiceError(service_err) => {
            let meta = service_err.err();
            match meta.code() {
                Some("NoSuchKey") | Some("NoSuchBucket") => ObjectStoreError::NotFound(err.to_string()),
                Some("BucketAlreadyOwnedByYou") | Some("BucketAlreadyExists") => {
                    ObjectStoreError::AlreadyExists(err.to_string())
                }
                _ => ObjectStoreError::Transient(err.to_string()),
            }
        }
        aws_sdk_s3::error::SdkError::TimeoutError(_) | aws_sdk_s3::error::SdkError::DispatchFailure(_) => {
            ObjectStoreError::Transient(err.to_string())
        }
        _ => ObjectStoreError::Other(err.to_string()),
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, ObjectStoreError> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                if err.as_service_error().and_then(|e| e.code()) == Some("NotFound") {
                    Ok(false)
                } else {
                    Err(classify_sdk_error(err))
                }
            }
        }
    }

    async fn make_bucket(&self, bucket: &str) -> Result<(), ObjectStoreError> {
        self.client
            .create_bucket()
            .bucket(bucket)
            .send()
            .await
            .map(|_| ())
            .map_err(classify_sdk_error)
    }

    async fn put_object(&self, bucket: &str, key: &str, payload: &[u8]) -> Result<PutReceipt, ObjectStoreError> {
        let body = ByteStream::from(payload.to_vec());
        let output = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(classify_sdk_error)?;
        Ok(PutReceipt {
            size: payload.len() as u64,
            etag: output.e_tag().unwrap_or_default().trim_matches('"').to_string(),
        })
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<Result<ListedObject, ObjectStoreError>>, ObjectStoreError> {
        let mut out = Vec::new();
        let mut continuation_token = None;
        loop {
            let mut req = self.client.list_objects_v2().bucket(bucket).prefix(prefix);
            if let Some(token) = continuation_token.take() {
                req = req.continuation_token(token);
            }
            let page = req.send().await.map_err(classify_sdk_error)?;
            for obj in page.contents() {
                match obj.key() {
                    Some(key) => out.push(Ok(ListedObject { key: key.to_string(), size: obj.size().unwrap_or(0) as u64 })),
                    None => out.push(Err(ObjectStoreError::Other("listed object missing key".into()))),
                }
            }
            if page.is_truncated().unwrap_or(false) {
                continuation_token = page.next_continuation_token().map(str::to_string);
            } else {
                break;
            }
        }
        Ok(out)
    }

    async fn remove_object(&self, bucket: &str, key: &str) -> Result<(), ObjectStoreError> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map(|_| ())
            .map_err(classify_sdk_error)
    }
}
