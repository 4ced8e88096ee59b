//! Contracts that introspected entities implement to take part in caching.

use crate::error::CacheError;
use crate::fingerprint::DependencyFingerprint;

/// An introspected unit (class, method, property, constant) whose derived
/// data can be cached.
///
/// The identity must be stable across processes: a fully qualified name plus
/// member name, never anything derived from memory addresses.
pub trait CacheableEntity: Send + Sync {
    /// Returns the stable identity string of the entity.
    fn identity(&self) -> &str;

    /// Returns the entity's current dependency fingerprint.
    ///
    /// Called on every cache lookup, so implementations should compute the
    /// fingerprint once when the entity is loaded and hand out a clone.
    fn dependencies(&self) -> Result<DependencyFingerprint, CacheError>;

    /// Recomputes the dependency fingerprint from the underlying sources.
    ///
    /// Invoked by the end-of-run sweep for stale entities. The default simply
    /// returns [`dependencies`](Self::dependencies).
    fn reload_dependencies(&self) -> Result<DependencyFingerprint, CacheError> {
        self.dependencies()
    }
}

/// Static description of a base entity type that caching proxies can wrap.
///
/// `METHODS` plays the role of reflection: it lists every method a proxy is
/// allowed to intercept. Declaring a cacheable method that is not listed
/// here makes proxy construction fail.
pub trait EntityType: CacheableEntity + 'static {
    /// Name of the base type, e.g. `"MethodEntity"`.
    const TYPE_NAME: &'static str;

    /// Names of the methods that may be intercepted.
    const METHODS: &'static [&'static str];
}
