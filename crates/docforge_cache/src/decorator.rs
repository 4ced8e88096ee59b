//! The caching decorator that wraps a base entity.

use std::ops::Deref;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::context::CacheContext;
use crate::entity::EntityType;
use crate::error::CacheError;
use crate::facade::EntityCache;
use crate::proxy::ProxyType;
use crate::sweep::{CachingCapability, SweepEntity};

/// A base entity wrapped by a caching proxy.
///
/// Declared methods are routed through [`call`](Self::call) or
/// [`try_call`](Self::try_call), which consult the entity's cache before
/// running the real implementation. Everything else reaches the base entity
/// through `Deref`.
///
/// ```ignore
/// let description: String = wrapped.call("description", &[], |m| m.description())?;
/// let name = wrapped.name(); // not cached
/// ```
pub struct CachedEntity<T: EntityType> {
    inner: T,
    proxy: Arc<ProxyType>,
    cache: EntityCache,
}

impl<T: EntityType> CachedEntity<T> {
    /// Wraps `inner` with `proxy`.
    ///
    /// Fails if the proxy was built for a different base type.
    pub fn new(
        context: &Arc<CacheContext>,
        proxy: Arc<ProxyType>,
        inner: T,
    ) -> Result<Self, CacheError> {
        if proxy.base_type() != T::TYPE_NAME {
            return Err(CacheError::Synthesis {
                wrapper: proxy.wrapper_name().to_string(),
                reason: format!(
                    "built for {}, cannot wrap {}",
                    proxy.base_type(),
                    T::TYPE_NAME
                ),
            });
        }
        let cache = EntityCache::new(Arc::clone(context), inner.identity());
        Ok(Self {
            inner,
            proxy,
            cache,
        })
    }

    /// Returns the proxy type of the wrapper.
    pub fn proxy(&self) -> &Arc<ProxyType> {
        &self.proxy
    }

    /// Returns the entity's cache facade.
    pub fn cache(&self) -> &EntityCache {
        &self.cache
    }

    /// Returns the wrapped entity.
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Unwraps the base entity.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Looks up a cached value for `method`, returning it only if present and
    /// the entity is not outdated. Returns the cache key alongside.
    fn lookup<R: DeserializeOwned>(
        &self,
        method: &str,
        args: &[Value],
    ) -> Result<Option<(String, Option<R>)>, CacheError> {
        let Some(policy) = self.proxy.policy(method) else {
            return Ok(None);
        };
        let key = policy
            .key
            .generate_key(&policy.namespace, self.inner.identity(), args);
        let cached = if self.cache.has_value(&self.inner, &key)?
            && !self.cache.is_outdated(&self.inner)?
        {
            self.cache.get_value(&self.inner, &key)?
        } else {
            None
        };
        Ok(Some((key, cached)))
    }

    /// Stores a computed value if the entity has more than one dependency.
    ///
    /// Entities with zero or one dependency are trivial or roots whose data
    /// could never be invalidated selectively, so they are recomputed.
    fn store<R: Serialize>(&self, method: &str, key: &str, value: &R) -> Result<(), CacheError> {
        let Some(policy) = self.proxy.policy(method) else {
            return Ok(());
        };
        match self.inner.dependencies() {
            Ok(deps) if deps.len() > 1 => {
                self.cache.add_value(&self.inner, key, value, policy.ttl)
            }
            Ok(_) => Ok(()),
            Err(err) => {
                debug!(entity = self.inner.identity(), method, error = %err, "not caching");
                Ok(())
            }
        }
    }

    /// Calls a method through the cache.
    ///
    /// `args` are the method's arguments in call order; they only feed the
    /// cache key. On a hit the cached value is returned and `compute` is not
    /// run. Methods the proxy does not declare are delegated without caching.
    pub fn call<R, F>(&self, method: &str, args: &[Value], compute: F) -> Result<R, CacheError>
    where
        R: Serialize + DeserializeOwned,
        F: FnOnce(&T) -> R,
    {
        let Some((key, cached)) = self.lookup(method, args)? else {
            return Ok(compute(&self.inner));
        };
        if let Some(value) = cached {
            return Ok(value);
        }
        let value = compute(&self.inner);
        self.store(method, &key, &value)?;
        Ok(value)
    }

    /// Like [`call`](Self::call) for fallible methods. Errors are returned
    /// as is and never cached.
    pub fn try_call<R, E, F>(&self, method: &str, args: &[Value], compute: F) -> Result<R, E>
    where
        R: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce(&T) -> Result<R, E>,
    {
        let Some((key, cached)) = self.lookup(method, args)? else {
            return compute(&self.inner);
        };
        if let Some(value) = cached {
            return Ok(value);
        }
        let value = compute(&self.inner)?;
        self.store(method, &key, &value)?;
        Ok(value)
    }
}

impl<T: EntityType> Deref for CachedEntity<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T: EntityType> CachingCapability for CachedEntity<T> {
    fn identity(&self) -> &str {
        self.inner.identity()
    }

    fn is_outdated(&self) -> Result<bool, CacheError> {
        self.cache.is_outdated(&self.inner)
    }

    fn reload_dependencies(&self) -> Result<(), CacheError> {
        self.cache.reload_dependencies(&self.inner)
    }
}

impl<T: EntityType> SweepEntity for CachedEntity<T> {
    fn caching(&self) -> Option<&dyn CachingCapability> {
        Some(self)
    }
}
