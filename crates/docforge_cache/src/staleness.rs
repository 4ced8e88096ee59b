//! Staleness decisions for cached entity data.

use tracing::debug;

use crate::entity::CacheableEntity;
use crate::fingerprint::DependencyFingerprint;

/// Decides whether the cached data of an entity must be discarded.
///
/// `recorded` is the fingerprint stored with the entity's bucket at its last
/// write, or `None` if nothing was ever written.
pub trait StalenessOracle: Send + Sync {
    /// Returns `true` if cached data for `entity` must not be served.
    fn is_outdated(
        &self,
        entity: &dyn CacheableEntity,
        recorded: Option<&DependencyFingerprint>,
    ) -> bool;
}

/// Compares the entity's current fingerprint against the recorded one.
///
/// No recorded fingerprint means outdated, which forces the initial compute.
/// A fingerprint that cannot be computed also means outdated: a failure never
/// results in unverified data being served.
#[derive(Debug, Default, Clone, Copy)]
pub struct FingerprintOracle;

impl StalenessOracle for FingerprintOracle {
    fn is_outdated(
        &self,
        entity: &dyn CacheableEntity,
        recorded: Option<&DependencyFingerprint>,
    ) -> bool {
        let Some(recorded) = recorded else {
            return true;
        };
        match entity.dependencies() {
            Ok(current) if current == *recorded => false,
            Ok(current) => {
                let diff = current.diff(recorded);
                debug!(
                    entity = entity.identity(),
                    added = diff.added.len(),
                    removed = diff.removed.len(),
                    reordered = diff.reordered,
                    "entity cache is outdated"
                );
                true
            }
            Err(err) => {
                debug!(entity = entity.identity(), error = %err, "cannot compute fingerprint");
                true
            }
        }
    }
}
