//! Configuration surface: layered file-then-environment loading via the
//! `config` crate, environment variables prefixed `CLUSTERARK_`.

use clusterark::{BackupPolicy, CircuitBreakerConfig, Config, RetryConfig};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Everything needed to wire up one backup run, as loaded from a config file
/// and/or `CLUSTERARK_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub cluster_name: String,
    pub minio_endpoint: String,
    pub minio_bucket: String,
    pub minio_access_key: String,
    pub minio_secret_key: String,
    #[serde(default)]
    pub minio_region: Option<String>,
    #[serde(default)]
    pub auto_create_bucket: bool,
    #[serde(default)]
    pub policy: BackupPolicy,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub circuit: CircuitBreakerConfig,
}

impl Settings {
    /// Loads `file` (if present) then overlays `CLUSTERARK_*` environment
    /// variables.
    pub fn load(file: Option<&Path>) -> Result<Self, SettingsError> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("CLUSTERARK").separator("__").try_parsing(true),
        );
        let raw = builder.build()?;
        raw.try_deserialize()
    }

    pub fn cluster_config(&self) -> Config {
        Config {
            cluster_name: self.cluster_name.clone(),
            destination_bucket: self.minio_bucket.clone(),
            store_endpoint: self.minio_endpoint.clone(),
            auto_create_bucket: self.auto_create_bucket,
        }
    }
}
