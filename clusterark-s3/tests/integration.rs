use clusterark::ObjectStore;
use clusterark_s3::S3ObjectStore;

// Requires a running MinIO (or S3-compatible) endpoint. If
// CLUSTERARK_TEST_S3_ENDPOINT is unset, the test skips.
#[tokio::test]
async fn round_trips_an_object_through_a_real_endpoint() {
    let Some(endpoint) = std::env::var("CLUSTERARK_TEST_S3_ENDPOINT").ok() else {
        eprintln!("skipping: set CLUSTERARK_TEST_S3_ENDPOINT (e.g. http://127.0.0.1:9000)");
        return;
    };
    let access_key = std::env::var("CLUSTERARK_TEST_S3_ACCESS_KEY").unwrap_or_else(|_| "minioadmin".into());
    let secret_key = std::env::var("CLUSTERARK_TEST_S3_SECRET_KEY").unwrap_or_else(|_| "minioadmin".into());

    let store = S3ObjectStore::connect(endpoint, &access_key, &secret_key, "us-east-1").await;
    let bucket = format!("clusterark-test-{}", std::process::id());

    if !store.bucket_exists(&bucket).await.unwrap_or(false) {
        store.make_bucket(&bucket).await.expect("create test bucket");
    }

    let receipt = store.put_object(&bucket, "probe.json", b"{}").await.expect("put object");
    assert_eq!(receipt.size, 2);

    let listed = store.list_objects(&bucket, "probe").await.expect("list objects");
    assert!(listed.iter().any(|r| matches!(r, Ok(o) if o.key == "probe.json")));

    store.remove_object(&bucket, "probe.json").await.expect("cleanup object");
}
