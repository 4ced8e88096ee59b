//! End-of-run reconciliation of a whole entity collection.
//!
//! The sweep visits every entity that exposes the caching capability, reloads
//! the dependencies of the outdated ones, and then flushes the staging store
//! exactly once. It is the only place where a run's buckets are persisted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::info;

use crate::error::CacheError;
use crate::store::CacheStore;

/// Staleness operations an entity exposes to the sweep.
pub trait CachingCapability: Send + Sync {
    /// Returns the entity's stable identity.
    fn identity(&self) -> &str;

    /// Returns `true` if the entity's cached data is outdated.
    fn is_outdated(&self) -> Result<bool, CacheError>;

    /// Recomputes the entity's dependencies and resets its cached data.
    fn reload_dependencies(&self) -> Result<(), CacheError>;
}

/// A member of an entity collection.
///
/// Entities that are not wrapped by a caching proxy return `None` and are
/// skipped.
pub trait SweepEntity: Sync {
    /// Returns the caching capability of the entity, if it has one.
    fn caching(&self) -> Option<&dyn CachingCapability>;
}

/// Cooperative cancellation flag shared with a running sweep.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Returns `true` once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entities visited.
    pub visited: usize,
    /// Visited entities with a caching capability.
    pub cacheable: usize,
    /// Outdated entities whose dependencies were reloaded.
    pub reloaded: usize,
    /// Buckets written by the final flush.
    pub flushed: usize,
}

/// Reconciles one entity. Returns `(cacheable, reloaded)`.
fn reconcile(entity: &dyn SweepEntity) -> Result<(bool, bool), CacheError> {
    let Some(caching) = entity.caching() else {
        return Ok((false, false));
    };
    if !caching.is_outdated()? {
        return Ok((true, false));
    }
    caching.reload_dependencies()?;
    Ok((true, true))
}

fn finish(
    store: &CacheStore,
    mut report: SweepReport,
    cancel: &CancelToken,
) -> Result<SweepReport, CacheError> {
    if cancel.is_cancelled() {
        return Err(CacheError::Cancelled);
    }
    report.flushed = store.flush_all()?;
    info!(
        visited = report.visited,
        reloaded = report.reloaded,
        flushed = report.flushed,
        "entity cache updated"
    );
    Ok(report)
}

/// Reconciles `entities` one after another, then flushes `store` once.
///
/// A cancelled sweep stops at the next entity and returns
/// [`CacheError::Cancelled`] without flushing.
pub fn update_cache(
    store: &CacheStore,
    entities: &[&dyn SweepEntity],
    cancel: &CancelToken,
) -> Result<SweepReport, CacheError> {
    let mut report = SweepReport::default();
    for entity in entities {
        if cancel.is_cancelled() {
            return Err(CacheError::Cancelled);
        }
        let (cacheable, reloaded) = reconcile(*entity)?;
        report.visited += 1;
        report.cacheable += usize::from(cacheable);
        report.reloaded += usize::from(reloaded);
    }
    finish(store, report, cancel)
}

/// Reconciles `entities` on the rayon pool, then flushes `store` once after
/// every worker has finished.
pub fn update_cache_parallel(
    store: &CacheStore,
    entities: &[&dyn SweepEntity],
    cancel: &CancelToken,
) -> Result<SweepReport, CacheError> {
    let outcomes: Vec<(bool, bool)> = entities
        .par_iter()
        .map(|entity| {
            if cancel.is_cancelled() {
                return Err(CacheError::Cancelled);
            }
            reconcile(*entity)
        })
        .collect::<Result<_, _>>()?;

    let report = SweepReport {
        visited: outcomes.len(),
        cacheable: outcomes.iter().filter(|(c, _)| *c).count(),
        reloaded: outcomes.iter().filter(|(_, r)| *r).count(),
        flushed: 0,
    };
    finish(store, report, cancel)
}
