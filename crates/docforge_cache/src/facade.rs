//! Per-entity view over the staging store.
//!
//! An [`EntityCache`] is bound to one entity identity. It computes the
//! versioned bucket key once and stages the bucket on first access, applying
//! the staleness decision and expiry pruning exactly once per run. After that
//! the bucket is a snapshot: reads never go back to the durable store.

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::bucket::CacheEntry;
use crate::context::CacheContext;
use crate::entity::CacheableEntity;
use crate::error::CacheError;
use crate::store::{lock_bucket, SharedBucket};

/// Cache facade for a single entity.
///
/// Every method takes the entity itself so the facade never holds a borrow
/// of it; the caller guarantees it always passes the entity whose identity
/// the facade was created for.
pub struct EntityCache {
    context: Arc<CacheContext>,
    versioned_key: String,
    bucket: OnceCell<SharedBucket>,
}

impl EntityCache {
    /// Creates a facade for the entity with the given identity.
    pub fn new(context: Arc<CacheContext>, identity: &str) -> Self {
        let versioned_key = context.settings().versioned_key(identity);
        Self {
            context,
            versioned_key,
            bucket: OnceCell::new(),
        }
    }

    /// Returns the `{format_version}_{identity}` key of the bucket.
    pub fn versioned_key(&self) -> &str {
        &self.versioned_key
    }

    /// Returns the context the facade belongs to.
    pub fn context(&self) -> &Arc<CacheContext> {
        &self.context
    }

    /// Stages the entity's bucket on first access and returns it.
    ///
    /// The staleness decision and expiry pruning are applied the first time
    /// any facade reaches the bucket, even if store-level inspection staged
    /// it earlier. An outdated bucket keeps its fingerprint but loses its
    /// entries, and it is not marked dirty: the durable copy survives until a
    /// value is written again.
    fn bucket(&self, entity: &dyn CacheableEntity) -> Result<&SharedBucket, CacheError> {
        self.bucket.get_or_try_init(|| {
            let oracle = self.context.oracle();
            let now = self.context.clock().now();
            self.context
                .store()
                .stage_with(&self.versioned_key, |bucket| {
                    if bucket.fingerprint.is_none() && bucket.is_empty() {
                        return;
                    }
                    if oracle.is_outdated(entity, bucket.fingerprint.as_ref()) {
                        debug!(
                            key = %self.versioned_key,
                            discarded = bucket.len(),
                            "ignoring outdated cache bucket"
                        );
                        bucket.entries.clear();
                    } else {
                        let pruned = bucket.prune_expired(now);
                        if pruned > 0 {
                            debug!(key = %self.versioned_key, pruned, "pruned expired entries");
                        }
                    }
                })
        })
    }

    /// Returns the value cached under `key`, or `None` on a miss.
    ///
    /// A value that cannot be decoded as `R` is logged and reported as a miss.
    pub fn get_value<R: DeserializeOwned>(
        &self,
        entity: &dyn CacheableEntity,
        key: &str,
    ) -> Result<Option<R>, CacheError> {
        if !self.context.settings().enabled() {
            return Ok(None);
        }
        let bucket = lock_bucket(self.bucket(entity)?);
        let Some(entry) = bucket.get(key) else {
            return Ok(None);
        };
        match entry.decode() {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                warn!(bucket = %self.versioned_key, key, error = %err, "undecodable cached value");
                Ok(None)
            }
        }
    }

    /// Returns `true` if a value is cached under `key`.
    pub fn has_value(&self, entity: &dyn CacheableEntity, key: &str) -> Result<bool, CacheError> {
        if !self.context.settings().enabled() {
            return Ok(false);
        }
        Ok(lock_bucket(self.bucket(entity)?).contains(key))
    }

    /// Caches `value` under `key` for `ttl`.
    ///
    /// Records the entity's current dependency fingerprint with the bucket,
    /// which also clears any staleness left over from a previous run. Does
    /// nothing when caching is disabled.
    pub fn add_value<V: Serialize + ?Sized>(
        &self,
        entity: &dyn CacheableEntity,
        key: &str,
        value: &V,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        if !self.context.settings().enabled() {
            return Ok(());
        }
        let expires_at = self.context.clock().now().saturating_add(ttl);
        let entry = CacheEntry::encode(value, Some(expires_at))?;
        let fingerprint = entity.dependencies()?;
        lock_bucket(self.bucket(entity)?).insert(key.to_string(), entry, fingerprint);
        Ok(())
    }

    /// Returns `true` if the entity's dependencies changed since the bucket
    /// was last written, or if nothing was ever written.
    ///
    /// Always `false` when caching is disabled, since there is nothing to
    /// reconcile.
    pub fn is_outdated(&self, entity: &dyn CacheableEntity) -> Result<bool, CacheError> {
        if !self.context.settings().enabled() {
            return Ok(false);
        }
        let bucket = lock_bucket(self.bucket(entity)?);
        Ok(self
            .context
            .oracle()
            .is_outdated(entity, bucket.fingerprint.as_ref()))
    }

    /// Recomputes the entity's fingerprint and resets its bucket to it.
    ///
    /// Prior values are dropped and the bucket is persisted on the next flush.
    pub fn reload_dependencies(&self, entity: &dyn CacheableEntity) -> Result<(), CacheError> {
        if !self.context.settings().enabled() {
            return Ok(());
        }
        let fingerprint = entity.reload_dependencies()?;
        lock_bucket(self.bucket(entity)?).reset(fingerprint);
        debug!(key = %self.versioned_key, "reloaded entity dependencies");
        Ok(())
    }
}
