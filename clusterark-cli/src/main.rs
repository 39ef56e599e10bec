mod settings;

use clap::Parser;
use clusterark::{CircuitBreakerPolicy, ClusterApiError, Envelope, LogSink, ObjectStoreError, Orchestrator, RetryPolicy};
use clusterark_kube::KubeClusterApi;
use clusterark_s3::S3ObjectStore;
use settings::Settings;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "clusterark", version, about = "Resilient cluster-to-object-store backup pipeline")]
struct Args {
    /// Path to a JSON/YAML config file; environment variables prefixed
    /// CLUSTERARK_ override values from this file.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let settings = match Settings::load(args.config.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::warn!("received interrupt, cancelling in-flight run");
            cancel.cancel();
        });
    }

    let cluster_api = match KubeClusterApi::try_default().await {
        Ok(api) => api,
        Err(e) => {
            tracing::error!(error = %e, "failed to build kube client");
            return ExitCode::FAILURE;
        }
    };

    let store = S3ObjectStore::connect(
        settings.minio_endpoint.clone(),
        &settings.minio_access_key,
        &settings.minio_secret_key,
        settings.minio_region.as_deref().unwrap_or("us-east-1"),
    )
    .await;

    let cluster_envelope: Envelope<ClusterApiError> = Envelope::new(
        CircuitBreakerPolicy::new("cluster-api", settings.circuit),
        RetryPolicy::new(settings.retry),
    );
    let store_envelope: Envelope<ObjectStoreError> = Envelope::new(
        CircuitBreakerPolicy::new("object-store", settings.circuit),
        RetryPolicy::new(settings.retry),
    );

    let orchestrator = Orchestrator::new(
        settings.cluster_config(),
        settings.policy.clone(),
        &cluster_api,
        cluster_envelope,
        &store,
        store_envelope,
    );

    let mut sink = LogSink;
    match orchestrator.execute_backup(&cancel, &mut sink).await {
        Ok(result) => {
            tracing::info!(
                objects = result.objects_backed_up,
                bytes = result.bytes_backed_up,
                namespaces = result.namespaces_backed_up,
                errors = result.errors.len(),
                duration = ?result.duration,
                "backup run finished"
            );
            if result.errors.is_empty() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "backup run aborted during preflight");
            ExitCode::FAILURE
        }
    }
}
