//! Caching proxy types and their registry.
//!
//! A [`ProxyType`] is the dispatch table of a caching wrapper: for each
//! declared method it holds the namespace, TTL and key strategy used by
//! [`CachedEntity`](crate::CachedEntity). Proxy types are built at most once
//! per wrapper name and shared for the rest of the run.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use once_cell::sync::OnceCell;
use tracing::debug;

use crate::entity::EntityType;
use crate::error::CacheError;
use crate::key::KeyStrategy;

/// Declaration of one cacheable method of a base entity type.
#[derive(Debug, Clone)]
pub struct CacheableMethodSpec {
    method: String,
    ttl: Option<Duration>,
    key: KeyStrategy,
}

impl CacheableMethodSpec {
    /// Declares `method` as cacheable with the default TTL and argument-hash keys.
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            ttl: None,
            key: KeyStrategy::default(),
        }
    }

    /// Sets the method's TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Sets the method's key strategy.
    pub fn with_key(mut self, key: KeyStrategy) -> Self {
        self.key = key;
        self
    }

    /// Returns the method name.
    pub fn method(&self) -> &str {
        &self.method
    }
}

/// Resolved caching policy for one intercepted method.
#[derive(Debug, Clone)]
pub struct MethodPolicy {
    /// Key namespace, `{wrapper_name}_{method}`.
    pub namespace: String,
    /// Lifetime of values cached for this method.
    pub ttl: Duration,
    /// Key derivation strategy.
    pub key: KeyStrategy,
}

/// A synthesized caching wrapper for one base entity type.
#[derive(Debug)]
pub struct ProxyType {
    wrapper_name: String,
    base_type: &'static str,
    policies: BTreeMap<String, MethodPolicy>,
}

impl ProxyType {
    fn synthesize<T: EntityType>(
        wrapper_name: &str,
        specs: &[CacheableMethodSpec],
        default_ttl: Duration,
    ) -> Result<Self, CacheError> {
        let fail = |reason: String| CacheError::Synthesis {
            wrapper: wrapper_name.to_string(),
            reason,
        };

        let mut policies = BTreeMap::new();
        for spec in specs {
            if !T::METHODS.contains(&spec.method.as_str()) {
                return Err(fail(format!(
                    "{} has no method '{}'",
                    T::TYPE_NAME,
                    spec.method
                )));
            }
            let ttl = spec.ttl.unwrap_or(default_ttl);
            if ttl.as_secs() == 0 {
                return Err(fail(format!("method '{}' has a zero TTL", spec.method)));
            }
            let policy = MethodPolicy {
                namespace: format!("{wrapper_name}_{}", spec.method),
                ttl,
                key: spec.key.clone(),
            };
            if policies.insert(spec.method.clone(), policy).is_some() {
                return Err(fail(format!("method '{}' declared twice", spec.method)));
            }
        }

        Ok(Self {
            wrapper_name: wrapper_name.to_string(),
            base_type: T::TYPE_NAME,
            policies,
        })
    }

    /// Returns the wrapper name the proxy was registered under.
    pub fn wrapper_name(&self) -> &str {
        &self.wrapper_name
    }

    /// Returns the name of the wrapped base type.
    pub fn base_type(&self) -> &'static str {
        self.base_type
    }

    /// Returns the policy of `method`, or `None` if it is not intercepted.
    pub fn policy(&self, method: &str) -> Option<&MethodPolicy> {
        self.policies.get(method)
    }

    /// Returns the intercepted method names in sorted order.
    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.policies.keys().map(String::as_str)
    }
}

/// Memoizes synthesized proxy types by wrapper name.
///
/// Each wrapper name gets its own once-cell, so concurrent first requests for
/// the same name block on one synthesis instead of racing. A failed
/// synthesis leaves the cell empty: the next request tries again and no
/// partial proxy is ever handed out.
#[derive(Debug, Default)]
pub struct ProxyRegistry {
    proxies: Mutex<HashMap<String, Arc<OnceCell<Arc<ProxyType>>>>>,
    builds: AtomicUsize,
}

impl ProxyRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the proxy registered under `wrapper_name`, synthesizing it
    /// from `specs` on first request.
    ///
    /// Later requests for the same name return the memoized proxy and ignore
    /// their `specs`. Requesting a registered name for a different base type
    /// fails.
    pub fn build_proxy<T: EntityType>(
        &self,
        wrapper_name: &str,
        specs: &[CacheableMethodSpec],
        default_ttl: Duration,
    ) -> Result<Arc<ProxyType>, CacheError> {
        if wrapper_name.is_empty() {
            return Err(CacheError::Synthesis {
                wrapper: String::new(),
                reason: "wrapper name is empty".to_string(),
            });
        }

        let cell = {
            let mut proxies = self.proxies.lock().unwrap_or_else(|p| p.into_inner());
            Arc::clone(proxies.entry(wrapper_name.to_string()).or_default())
        };

        let proxy = cell.get_or_try_init(|| {
            let proxy = ProxyType::synthesize::<T>(wrapper_name, specs, default_ttl)?;
            self.builds.fetch_add(1, Ordering::Relaxed);
            debug!(
                wrapper = wrapper_name,
                base = T::TYPE_NAME,
                methods = proxy.policies.len(),
                "synthesized caching proxy"
            );
            Ok::<_, CacheError>(Arc::new(proxy))
        })?;

        if proxy.base_type != T::TYPE_NAME {
            return Err(CacheError::Synthesis {
                wrapper: wrapper_name.to_string(),
                reason: format!(
                    "already registered for {}, requested for {}",
                    proxy.base_type,
                    T::TYPE_NAME
                ),
            });
        }
        Ok(Arc::clone(proxy))
    }

    /// Returns the proxy registered under `wrapper_name`, if it was built.
    pub fn get(&self, wrapper_name: &str) -> Option<Arc<ProxyType>> {
        let proxies = self.proxies.lock().unwrap_or_else(|p| p.into_inner());
        proxies.get(wrapper_name)?.get().cloned()
    }

    /// Returns the number of successful syntheses so far.
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }
}
