//! Offline maintenance of a durable bucket store.
//!
//! These operations run outside of a generation run, from the `docforge cache`
//! commands. They work on durable keys only and never decode buckets.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::durable::DurableStore;
use crate::error::CacheError;

/// Returns the format version prefix of a durable key.
///
/// Keys are `{format_version}_{identity}` and format versions never contain
/// `_`. A key without a separator has no version and is returned whole.
pub fn key_version(key: &str) -> &str {
    key.split_once('_').map_or(key, |(version, _)| version)
}

/// Returns `true` if `key` was written under `format_version`.
fn belongs_to(key: &str, format_version: &str) -> bool {
    key.strip_prefix(format_version)
        .is_some_and(|identity| identity.starts_with('_'))
}

/// Counts stored buckets per format version.
pub fn version_histogram(durable: &dyn DurableStore) -> Result<BTreeMap<String, usize>, CacheError> {
    let mut histogram = BTreeMap::new();
    for key in durable.keys()? {
        *histogram.entry(key_version(&key).to_string()).or_insert(0) += 1;
    }
    Ok(histogram)
}

/// Removes every bucket that does not belong to `format_version`.
///
/// Returns the number of buckets removed.
pub fn collect_garbage(durable: &dyn DurableStore, format_version: &str) -> Result<usize, CacheError> {
    let mut removed = 0;
    for key in durable.keys()? {
        if belongs_to(&key, format_version) {
            continue;
        }
        if durable.remove(&key)? {
            debug!(key, "removed foreign cache bucket");
            removed += 1;
        }
    }
    info!(removed, format_version, "cache garbage collected");
    Ok(removed)
}

/// Removes every bucket. Returns the number of buckets removed.
pub fn clear(durable: &dyn DurableStore) -> Result<usize, CacheError> {
    let mut removed = 0;
    for key in durable.keys()? {
        if durable.remove(&key)? {
            removed += 1;
        }
    }
    info!(removed, "cache cleared");
    Ok(removed)
}
