//! Filter Engine (C1): pure, synchronous decisions over which namespaces and
//! resource kinds are in scope for a run. Never suspends, takes no locks.

use crate::model::BackupPolicy;
use std::collections::BTreeSet;

/// Effective namespace set given the observed namespaces and the active policy.
///
/// Namespaces use substring containment (case-sensitive) on both the include
/// and exclude side, tolerating prefixed system namespaces. This is the
/// asymmetry with `should_backup_resource` and must be preserved.
pub fn filter_namespaces(all: &[String], policy: &BackupPolicy) -> BTreeSet<String> {
    let starting: BTreeSet<String> = if policy.include_namespaces.is_empty() {
        all.iter().cloned().collect()
    } else {
        all.iter()
            .filter(|ns| policy.include_namespaces.iter().any(|pat| ns.contains(pat.as_str())))
            .cloned()
            .collect()
    };

    starting
        .into_iter()
        .filter(|ns| !policy.exclude_namespaces.iter().any(|pat| ns.contains(pat.as_str())))
        .collect()
}

/// Exact-name decision over a resource kind's plural name.
pub fn should_backup_resource(plural_name: &str, policy: &BackupPolicy) -> bool {
    if !policy.include_resources.is_empty() {
        return policy.include_resources.iter().any(|k| k == plural_name);
    }
    if !policy.exclude_resources.is_empty() {
        return !policy.exclude_resources.iter().any(|k| k == plural_name);
    }
    true
}

/// Deduplicated intersection of two string sequences.
pub fn intersection(a: &[String], b: &[String]) -> BTreeSet<String> {
    let b_set: BTreeSet<&str> = b.iter().map(String::as_str).collect();
    a.iter().filter(|x| b_set.contains(x.as_str())).cloned().collect()
}

/// Deduplicated set difference `a - b`.
pub fn difference(a: &[String], b: &[String]) -> BTreeSet<String> {
    let b_set: BTreeSet<&str> = b.iter().map(String::as_str).collect();
    a.iter().filter(|x| !b_set.contains(x.as_str())).cloned().collect()
}
