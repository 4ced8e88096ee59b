//! Per-entity cache buckets and their TTL-stamped entries.
//!
//! A bucket holds every value cached for one entity under one cache format
//! version, plus the dependency fingerprint that was current when the bucket
//! was last written. Buckets are serialized as a whole into a single durable
//! blob (see [`blob`](crate::blob)).

use std::collections::BTreeMap;

use docforge_common::Timestamp;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::fingerprint::DependencyFingerprint;

/// A single cached value with an optional absolute expiry.
///
/// The payload is kept as JSON bytes so that buckets stay opaque to the
/// binary blob layout and any `Serialize` value can be cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// JSON-encoded value.
    pub data: Vec<u8>,
    /// Instant after which the entry is logically absent. `None` never expires.
    pub expires_at: Option<Timestamp>,
}

impl CacheEntry {
    /// Encodes `value` into a new entry.
    pub fn encode<T: Serialize + ?Sized>(
        value: &T,
        expires_at: Option<Timestamp>,
    ) -> Result<Self, CacheError> {
        let data = serde_json::to_vec(value).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;
        Ok(Self { data, expires_at })
    }

    /// Decodes the stored value.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, CacheError> {
        serde_json::from_slice(&self.data).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })
    }

    /// Returns `true` if the entry expired strictly before `now`.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        matches!(self.expires_at, Some(at) if at < now)
    }
}

/// All values cached for one entity under one versioned key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheBucket {
    /// Dependency fingerprint recorded at the last write, if any.
    pub fingerprint: Option<DependencyFingerprint>,

    /// Cached values keyed by method cache key.
    pub entries: BTreeMap<String, CacheEntry>,

    /// Set when the bucket changed since it was loaded and must be persisted.
    #[serde(skip)]
    dirty: bool,

    /// Set once staleness and expiry were applied to the staged bucket.
    #[serde(skip)]
    prepared: bool,
}

impl CacheBucket {
    /// Creates an empty, clean bucket with no recorded fingerprint.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry stored under `key`, ignoring expiry.
    ///
    /// Expiry is only enforced by [`prune_expired`](Self::prune_expired) when
    /// the bucket is loaded, so a bucket is a snapshot for the whole run.
    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Returns `true` if an entry is stored under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Stores an entry, recording `fingerprint` as the bucket's current one.
    pub fn insert(&mut self, key: String, entry: CacheEntry, fingerprint: DependencyFingerprint) {
        self.entries.insert(key, entry);
        self.fingerprint = Some(fingerprint);
        self.dirty = true;
    }

    /// Drops every entry and records a fresh fingerprint.
    ///
    /// Used when dependencies were reloaded: the old values are no longer
    /// trustworthy, and the next flush overwrites the durable copy.
    pub fn reset(&mut self, fingerprint: DependencyFingerprint) {
        self.entries.clear();
        self.fingerprint = Some(fingerprint);
        self.dirty = true;
    }

    /// Removes every entry that expired strictly before `now`.
    ///
    /// Returns the number of entries removed. Pruning a freshly loaded bucket
    /// does not mark it dirty; the durable copy is rewritten only on a real write.
    pub fn prune_expired(&mut self, now: Timestamp) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before - self.entries.len()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the bucket holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if the bucket must be written on the next flush.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Marks the bucket as needing persistence.
    pub(crate) fn touch(&mut self) {
        self.dirty = true;
    }

    /// Marks the bucket as persisted.
    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Returns `true` once the staged bucket was checked for staleness and
    /// pruned of expired entries.
    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    pub(crate) fn mark_prepared(&mut self) {
        self.prepared = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(deps: &[&str]) -> DependencyFingerprint {
        DependencyFingerprint::new(deps.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn new_bucket_is_empty_and_clean() {
        let b = CacheBucket::new();
        assert!(b.is_empty());
        assert!(!b.is_dirty());
        assert!(b.fingerprint.is_none());
    }

    #[test]
    fn insert_records_fingerprint_and_dirties() {
        let mut b = CacheBucket::new();
        let entry = CacheEntry::encode("summary text", None).unwrap();
        b.insert("k".to_string(), entry, fp(&["a.php:1", "b.php:2"]));
        assert!(b.contains("k"));
        assert!(b.is_dirty());
        assert_eq!(b.fingerprint, Some(fp(&["a.php:1", "b.php:2"])));
    }

    #[test]
    fn entry_encode_decode() {
        let entry = CacheEntry::encode(&vec![1, 2, 3], None).unwrap();
        let back: Vec<i32> = entry.decode().unwrap();
        assert_eq!(back, vec![1, 2, 3]);
    }

    #[test]
    fn entry_decode_wrong_type_errors() {
        let entry = CacheEntry::encode("text", None).unwrap();
        let result: Result<u32, _> = entry.decode();
        assert!(matches!(result, Err(CacheError::Serialization { .. })));
    }

    #[test]
    fn expiry_is_strict() {
        let entry = CacheEntry::encode(&1, Some(Timestamp::from_secs(100))).unwrap();
        assert!(!entry.is_expired(Timestamp::from_secs(99)));
        assert!(!entry.is_expired(Timestamp::from_secs(100)));
        assert!(entry.is_expired(Timestamp::from_secs(101)));
    }

    #[test]
    fn never_expiring_entry() {
        let entry = CacheEntry::encode(&1, None).unwrap();
        assert!(!entry.is_expired(Timestamp::from_secs(u64::MAX)));
    }

    #[test]
    fn prune_removes_only_expired() {
        let mut b = CacheBucket::new();
        let deps = fp(&["x", "y"]);
        b.insert(
            "old".to_string(),
            CacheEntry::encode(&1, Some(Timestamp::from_secs(10))).unwrap(),
            deps.clone(),
        );
        b.insert(
            "fresh".to_string(),
            CacheEntry::encode(&2, Some(Timestamp::from_secs(50))).unwrap(),
            deps,
        );
        b.mark_clean();

        let removed = b.prune_expired(Timestamp::from_secs(20));
        assert_eq!(removed, 1);
        assert!(!b.contains("old"));
        assert!(b.contains("fresh"));
        assert!(!b.is_dirty());
    }

    #[test]
    fn reset_clears_entries() {
        let mut b = CacheBucket::new();
        b.insert(
            "k".to_string(),
            CacheEntry::encode(&1, None).unwrap(),
            fp(&["a", "b"]),
        );
        b.mark_clean();
        b.reset(fp(&["a", "c"]));
        assert!(b.is_empty());
        assert!(b.is_dirty());
        assert_eq!(b.fingerprint, Some(fp(&["a", "c"])));
    }

    #[test]
    fn dirty_flag_is_not_serialized() {
        let mut b = CacheBucket::new();
        b.insert(
            "k".to_string(),
            CacheEntry::encode(&1, None).unwrap(),
            fp(&["a", "b"]),
        );
        let json = serde_json::to_string(&b).unwrap();
        let back: CacheBucket = serde_json::from_str(&json).unwrap();
        assert!(!back.is_dirty());
        assert!(!back.is_prepared());
        assert_eq!(back.entries, b.entries);
    }
}
