//! Shared data types flowing between the pipeline components.

use std::time::{Duration, SystemTime};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Process-wide configuration, immutable after load.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Config {
    pub cluster_name: String,
    pub destination_bucket: String,
    pub store_endpoint: String,
    pub auto_create_bucket: bool,
}

/// How `filtering_mode` was set in the source configuration. Carried through
/// for compatibility; the Filter Engine never reads it. See DESIGN.md.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FilteringMode {
    #[default]
    Whitelist,
    Blacklist,
}

/// Policy in effect for a single run, immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BackupPolicy {
    #[cfg_attr(feature = "serde", serde(default))]
    pub filtering_mode: FilteringMode,
    #[cfg_attr(feature = "serde", serde(default))]
    pub include_namespaces: Vec<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub exclude_namespaces: Vec<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub include_resources: Vec<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub exclude_resources: Vec<String>,
}

/// A single API resource type the cluster exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ResourceDescriptor {
    pub group_version: String,
    pub kind: String,
    pub plural_name: String,
    pub namespaced: bool,
}

/// One fetched cluster object, ready to be written to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRecord {
    pub namespace: String,
    pub kind: String,
    pub name: String,
    pub serialized_payload: Vec<u8>,
    pub read_at: SystemTime,
}

/// Deterministic destination path for one `ObjectRecord`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey(String);

impl StorageKey {
    pub const EXTENSION: &'static str = "json";

    /// `<cluster_name>/<run_timestamp>/<namespace>/<kind>/<name>.<ext>`
    pub fn build(cluster_name: &str, run_timestamp: &str, record: &ObjectRecord) -> Self {
        Self(format!(
            "{cluster_name}/{run_timestamp}/{namespace}/{kind}/{name}.{ext}",
            cluster_name = cluster_name,
            run_timestamp = run_timestamp,
            namespace = record.namespace,
            kind = record.kind,
            name = record.name,
            ext = Self::EXTENSION,
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StorageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One non-fatal failure recorded against a run.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BackupErrorEntry {
    pub namespace: String,
    pub kind: String,
    pub error_kind: BackupErrorKind,
    pub message: String,
}

/// Closed taxonomy of non-fatal failures recorded in `BackupResult.errors`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BackupErrorKind {
    CircuitOpen,
    RetryExhausted,
    DiscoveryPartial,
    ObjectFetch,
    ObjectWrite,
    Cancelled,
}

/// Outcome of one `executeBackup()` call.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BackupResult {
    pub start_time: SystemTime,
    pub end_time: SystemTime,
    pub duration: Duration,
    pub namespaces_backed_up: u64,
    pub objects_backed_up: u64,
    pub bytes_backed_up: u64,
    pub per_namespace_counts: std::collections::BTreeMap<String, u64>,
    pub errors: Vec<BackupErrorEntry>,
}

impl BackupResult {
    pub fn record_object(&mut self, namespace: &str, bytes: u64) {
        self.objects_backed_up += 1;
        self.bytes_backed_up += bytes;
        *self.per_namespace_counts.entry(namespace.to_string()).or_insert(0) += 1;
    }

    pub fn record_error(&mut self, namespace: &str, kind: &str, error_kind: BackupErrorKind, message: impl Into<String>) {
        self.errors.push(BackupErrorEntry {
            namespace: namespace.to_string(),
            kind: kind.to_string(),
            error_kind,
            message: message.into(),
        });
    }
}

/// Observable state of one named `CircuitBreakerPolicy`, for metrics/diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerState {
    pub name: String,
    pub state: crate::circuit_breaker::CircuitState,
    pub failures: usize,
    pub successes: usize,
    pub last_fail_time: Option<SystemTime>,
}

/// Retry behaviour for a single guarded call. See `retry::RetryPolicy` for
/// the executor this configures.
///
/// `initial_delay`/`max_delay` (de)serialize as duration strings (`"1s"`,
/// `"30s"`) via `humantime_serde`, and `multiplier_milli` is exposed under
/// the `multiplier` key as a plain float; both match the documented
/// configuration surface's `retry.initial_delay`/`retry.max_delay`/`retry.multiplier` keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RetryConfig {
    pub max_attempts: usize,
    #[cfg_attr(feature = "serde", serde(with = "humantime_serde"))]
    pub initial_delay: Duration,
    #[cfg_attr(feature = "serde", serde(with = "humantime_serde"))]
    pub max_delay: Duration,
    /// Stored as millis-of-fraction to keep the type `Eq`; use `multiplier()`/`with_multiplier()`.
    #[cfg_attr(feature = "serde", serde(rename = "multiplier", with = "multiplier_serde"))]
    multiplier_milli: u64,
}

#[cfg(feature = "serde")]
mod multiplier_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        (*value as f64 / 1000.0).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let multiplier = f64::deserialize(deserializer)?;
        Ok((multiplier * 1000.0).round() as u64)
    }
}

impl RetryConfig {
    pub fn new(max_attempts: usize, initial_delay: Duration, max_delay: Duration, multiplier: f64) -> Self {
        let mut cfg = Self { max_attempts, initial_delay, max_delay, multiplier_milli: 0 };
        cfg.set_multiplier(multiplier);
        cfg.normalize()
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier_milli as f64 / 1000.0
    }

    fn set_multiplier(&mut self, multiplier: f64) {
        self.multiplier_milli = (multiplier * 1000.0).round() as u64;
    }

    /// Applies the defaulting rules from the retry executor's contract:
    /// non-positive attempts become 1, multiplier <= 1.0 becomes 2.0,
    /// non-positive initial delay becomes 1s, non-positive max delay becomes 30s.
    pub fn normalize(mut self) -> Self {
        if self.max_attempts == 0 {
            self.max_attempts = 1;
        }
        if self.multiplier() <= 1.0 {
            self.set_multiplier(2.0);
        }
        if self.initial_delay.is_zero() {
            self.initial_delay = Duration::from_secs(1);
        }
        if self.max_delay.is_zero() {
            self.max_delay = Duration::from_secs(30);
        }
        self
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1), Duration::from_secs(30), 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_key_is_deterministic_and_unique_per_object() {
        let a = ObjectRecord {
            namespace: "default".into(),
            kind: "pods".into(),
            name: "a".into(),
            serialized_payload: vec![],
            read_at: SystemTime::now(),
        };
        let mut b = a.clone();
        b.name = "b".into();

        let ka = StorageKey::build("prod", "20260101T000000Z", &a);
        let kb = StorageKey::build("prod", "20260101T000000Z", &b);
        assert_ne!(ka, kb);
        assert_eq!(ka, StorageKey::build("prod", "20260101T000000Z", &a));
    }

    #[test]
    fn retry_config_normalizes_invalid_fields() {
        let cfg = RetryConfig::new(0, Duration::ZERO, Duration::ZERO, 1.0);
        assert_eq!(cfg.max_attempts, 1);
        assert_eq!(cfg.multiplier(), 2.0);
        assert_eq!(cfg.initial_delay, Duration::from_secs(1));
        assert_eq!(cfg.max_delay, Duration::from_secs(30));
    }

    #[test]
    fn retry_config_keeps_valid_fields() {
        let cfg = RetryConfig::new(5, Duration::from_millis(50), Duration::from_secs(2), 3.0);
        assert_eq!(cfg.max_attempts, 5);
        assert_eq!(cfg.multiplier(), 3.0);
    }
}
