//! Process-scoped cache state for one documentation-generation run.

use std::path::Path;
use std::sync::Arc;

use docforge_common::{Clock, SystemClock};
use docforge_config::CacheConfig;

use crate::decorator::CachedEntity;
use crate::durable::{DurableStore, FileStore};
use crate::entity::EntityType;
use crate::error::CacheError;
use crate::proxy::{CacheableMethodSpec, ProxyRegistry, ProxyType};
use crate::settings::CacheSettings;
use crate::staleness::{FingerprintOracle, StalenessOracle};
use crate::store::CacheStore;
use crate::sweep::{self, CancelToken, SweepEntity, SweepReport};

/// Everything the caching layer shares across entities during a run.
///
/// Built once at startup and handed around as `Arc<CacheContext>`. Owns the
/// staging store, the staleness oracle, the clock and the proxy registry, so
/// no cache state lives in globals.
pub struct CacheContext {
    settings: CacheSettings,
    store: CacheStore,
    oracle: Box<dyn StalenessOracle>,
    clock: Arc<dyn Clock>,
    proxies: ProxyRegistry,
}

impl CacheContext {
    /// Creates a context over `durable` with the fingerprint oracle and the system clock.
    pub fn new(settings: CacheSettings, durable: Arc<dyn DurableStore>) -> Self {
        Self {
            settings,
            store: CacheStore::new(durable),
            oracle: Box::new(FingerprintOracle),
            clock: Arc::new(SystemClock),
            proxies: ProxyRegistry::new(),
        }
    }

    /// Creates a context backed by a [`FileStore`] under `project_dir`.
    ///
    /// The store directory is `config.dir`, resolved against `project_dir`.
    /// Fails if the cache settings are malformed.
    pub fn open(project_dir: &Path, config: &CacheConfig) -> Result<Self, CacheError> {
        let settings = CacheSettings::from_config(config)?;
        let durable = Arc::new(FileStore::new(&project_dir.join(&config.dir)));
        Ok(Self::new(settings, durable))
    }

    /// Replaces the staleness oracle.
    pub fn with_oracle(mut self, oracle: impl StalenessOracle + 'static) -> Self {
        self.oracle = Box::new(oracle);
        self
    }

    /// Replaces the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the run's settings.
    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Returns the staging store.
    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Returns the staleness oracle.
    pub fn oracle(&self) -> &dyn StalenessOracle {
        self.oracle.as_ref()
    }

    /// Returns the clock.
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Returns the proxy registry.
    pub fn proxies(&self) -> &ProxyRegistry {
        &self.proxies
    }

    /// Builds (or fetches the memoized) caching proxy for `T` under `wrapper_name`.
    pub fn build_proxy<T: EntityType>(
        &self,
        wrapper_name: &str,
        specs: &[CacheableMethodSpec],
    ) -> Result<Arc<ProxyType>, CacheError> {
        self.proxies
            .build_proxy::<T>(wrapper_name, specs, self.settings.default_ttl())
    }

    /// Wraps `entity` in the caching proxy registered under `wrapper_name`,
    /// building the proxy on first use.
    pub fn wrap<T: EntityType>(
        self: &Arc<Self>,
        wrapper_name: &str,
        specs: &[CacheableMethodSpec],
        entity: T,
    ) -> Result<CachedEntity<T>, CacheError> {
        let proxy = self.build_proxy::<T>(wrapper_name, specs)?;
        CachedEntity::new(self, proxy, entity)
    }

    /// Reconciles staleness across `entities` and flushes the store once.
    ///
    /// Runs the parallel sweep when the settings allow it.
    pub fn update_cache(
        &self,
        entities: &[&dyn SweepEntity],
        cancel: &CancelToken,
    ) -> Result<SweepReport, CacheError> {
        if self.settings.parallel() {
            sweep::update_cache_parallel(&self.store, entities, cancel)
        } else {
            sweep::update_cache(&self.store, entities, cancel)
        }
    }
}
