//! Persistent caching of data derived from introspected documentation entities.
//!
//! Each entity (class, method, property, constant) owns one bucket of cached
//! values, keyed by the cache format version and the entity's identity. A
//! bucket records the dependency fingerprint it was computed against; when
//! the fingerprint changes the bucket is treated as empty until rewritten.
//!
//! The usual flow of a run:
//!
//! 1. Build a [`CacheContext`] from the `[cache]` settings.
//! 2. Wrap entities with [`CacheContext::wrap`], which synthesizes (once per
//!    wrapper name) a [`ProxyType`] describing the cacheable methods.
//! 3. Route method calls through [`CachedEntity::call`].
//! 4. Finish with [`CacheContext::update_cache`], which reloads outdated
//!    entities and flushes every modified bucket in one pass.

#![warn(missing_docs)]

pub mod blob;
pub mod bucket;
pub mod context;
pub mod decorator;
pub mod durable;
pub mod entity;
pub mod error;
pub mod facade;
pub mod fingerprint;
pub mod key;
pub mod maintenance;
pub mod proxy;
pub mod settings;
pub mod staleness;
pub mod store;
pub mod sweep;

pub use bucket::{CacheBucket, CacheEntry};
pub use context::CacheContext;
pub use decorator::CachedEntity;
pub use durable::{DurableStore, FileStore, MemoryStore};
pub use entity::{CacheableEntity, EntityType};
pub use error::CacheError;
pub use facade::EntityCache;
pub use fingerprint::{DependencyFingerprint, FingerprintDiff};
pub use key::{ArgumentConcatKey, ArgumentHashKey, KeyGenerator, KeyStrategy};
pub use proxy::{CacheableMethodSpec, MethodPolicy, ProxyRegistry, ProxyType};
pub use settings::CacheSettings;
pub use staleness::{FingerprintOracle, StalenessOracle};
pub use store::{CacheStore, StoreStats};
pub use sweep::{CancelToken, CachingCapability, SweepEntity, SweepReport};
