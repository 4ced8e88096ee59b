//! Staging layer between entity facades and the durable store.
//!
//! The `CacheStore` loads each versioned bucket from the durable store at most
//! once per run and keeps it staged in memory. Facades read and write the
//! staged copy; [`flush_all`](CacheStore::flush_all) writes every modified
//! bucket back in one pass at the end of the run, so durable I/O is bounded by
//! the number of distinct entities touched, not by the number of cache calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use tracing::{debug, warn};

use crate::blob::{decode_bucket, encode_bucket};
use crate::bucket::CacheBucket;
use crate::durable::DurableStore;
use crate::error::CacheError;

/// A staged bucket shared between the store and the facade that owns it.
pub type SharedBucket = Arc<Mutex<CacheBucket>>;

/// Locks a staged bucket.
///
/// Every mutation of a bucket is a single map operation, so a poisoned lock
/// still guards a consistent bucket.
pub fn lock_bucket(bucket: &SharedBucket) -> MutexGuard<'_, CacheBucket> {
    bucket.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Counters describing the staging state of a [`CacheStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Buckets currently staged in memory.
    pub staged: usize,
    /// Staged buckets with unpersisted changes.
    pub dirty: usize,
    /// Buckets loaded from the durable store so far.
    pub loaded: usize,
    /// Buckets written by flushes so far.
    pub written: usize,
    /// Number of completed flushes.
    pub flushes: usize,
}

/// Read-through staging map over a [`DurableStore`].
///
/// Safe to share between threads: the staging map is behind a lock, and each
/// bucket has its own mutex that only its owning facade contends for.
pub struct CacheStore {
    durable: Arc<dyn DurableStore>,
    staged: RwLock<HashMap<String, SharedBucket>>,
    loaded: AtomicUsize,
    written: AtomicUsize,
    flushes: AtomicUsize,
}

impl CacheStore {
    /// Creates an empty staging layer over `durable`.
    pub fn new(durable: Arc<dyn DurableStore>) -> Self {
        Self {
            durable,
            staged: RwLock::new(HashMap::new()),
            loaded: AtomicUsize::new(0),
            written: AtomicUsize::new(0),
            flushes: AtomicUsize::new(0),
        }
    }

    /// Returns the durable store behind this staging layer.
    pub fn durable(&self) -> &Arc<dyn DurableStore> {
        &self.durable
    }

    fn staged_get(&self, key: &str) -> Option<SharedBucket> {
        let staged = self.staged.read().unwrap_or_else(|p| p.into_inner());
        staged.get(key).cloned()
    }

    /// Stages `bucket` unless another bucket was staged for `key` first.
    fn staged_insert(&self, key: &str, bucket: CacheBucket) -> SharedBucket {
        let mut staged = self.staged.write().unwrap_or_else(|p| p.into_inner());
        staged
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(bucket)))
            .clone()
    }

    /// Loads and decodes the durable bucket for `key`.
    ///
    /// A blob that fails validation is logged and reported as absent.
    fn load_durable(&self, key: &str) -> Result<Option<CacheBucket>, CacheError> {
        let Some(raw) = self.durable.load(key)? else {
            return Ok(None);
        };
        self.loaded.fetch_add(1, Ordering::Relaxed);
        match decode_bucket(key, &raw) {
            Ok(bucket) => Ok(Some(bucket)),
            Err(err) => {
                warn!(key, error = %err, "discarding unreadable cache bucket");
                Ok(None)
            }
        }
    }

    /// Returns the staged bucket for `key`, loading it from the durable store
    /// on first access.
    ///
    /// Repeated calls return the same staged object. `None` means no usable
    /// bucket exists anywhere. The bucket is returned as stored: staleness and
    /// expiry are left for the first [`stage_with`](Self::stage_with) call.
    pub fn get_bucket(&self, key: &str) -> Result<Option<SharedBucket>, CacheError> {
        if let Some(bucket) = self.staged_get(key) {
            return Ok(Some(bucket));
        }
        Ok(self
            .load_durable(key)?
            .map(|bucket| self.staged_insert(key, bucket)))
    }

    /// Stages `bucket` under `key`, replacing any staged bucket.
    ///
    /// The replacement is marked dirty so the next flush persists it.
    pub fn set_bucket(&self, key: &str, mut bucket: CacheBucket) -> SharedBucket {
        bucket.touch();
        let shared = Arc::new(Mutex::new(bucket));
        let mut staged = self.staged.write().unwrap_or_else(|p| p.into_inner());
        staged.insert(key.to_string(), Arc::clone(&shared));
        shared
    }

    /// Returns the staged bucket for `key`, staging it on first access.
    ///
    /// A bucket that has not been prepared yet is passed to `prepare` before
    /// being returned, whether this call staged it or [`get_bucket`] or
    /// [`set_bucket`] did. A key with no durable bucket is staged empty. This
    /// lets the owning facade drop stale data and prune expired entries
    /// exactly once per run.
    ///
    /// [`get_bucket`]: Self::get_bucket
    /// [`set_bucket`]: Self::set_bucket
    pub fn stage_with<F>(&self, key: &str, prepare: F) -> Result<SharedBucket, CacheError>
    where
        F: FnOnce(&mut CacheBucket),
    {
        let shared = match self.staged_get(key) {
            Some(bucket) => bucket,
            None => {
                let loaded = self.load_durable(key)?;
                debug!(key, found = loaded.is_some(), "staging cache bucket");
                self.staged_insert(key, loaded.unwrap_or_default())
            }
        };
        {
            let mut bucket = lock_bucket(&shared);
            if !bucket.is_prepared() {
                prepare(&mut bucket);
                bucket.mark_prepared();
            }
        }
        Ok(shared)
    }

    /// Writes every modified staged bucket to the durable store.
    ///
    /// Must only be called once entity processing has finished. Returns the
    /// number of buckets written. Unmodified buckets, including buckets whose
    /// stale data was discarded but never rewritten, are left untouched.
    pub fn flush_all(&self) -> Result<usize, CacheError> {
        let staged: Vec<(String, SharedBucket)> = {
            let staged = self.staged.read().unwrap_or_else(|p| p.into_inner());
            staged
                .iter()
                .map(|(k, b)| (k.clone(), Arc::clone(b)))
                .collect()
        };

        let mut written = 0;
        for (key, bucket) in staged {
            let mut bucket = lock_bucket(&bucket);
            if !bucket.is_dirty() {
                continue;
            }
            let blob = encode_bucket(&key, &bucket)?;
            self.durable.save(&key, &blob)?;
            bucket.mark_clean();
            written += 1;
        }

        self.written.fetch_add(written, Ordering::Relaxed);
        self.flushes.fetch_add(1, Ordering::Relaxed);
        debug!(written, "flushed cache buckets");
        Ok(written)
    }

    /// Returns staging counters.
    pub fn stats(&self) -> StoreStats {
        let staged = self.staged.read().unwrap_or_else(|p| p.into_inner());
        let dirty = staged.values().filter(|b| lock_bucket(b).is_dirty()).count();
        StoreStats {
            staged: staged.len(),
            dirty,
            loaded: self.loaded.load(Ordering::Relaxed),
            written: self.written.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
        }
    }
}
