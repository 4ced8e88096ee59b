//! Dependency fingerprints and change detection between them.
//!
//! A fingerprint is the ordered list of everything an entity's cached data
//! depends on: source file modification markers, parent entity identities and
//! so on. Two fingerprints are equal only if they hold the same strings in the
//! same order; nothing is sorted or deduplicated.

use std::collections::HashSet;

use docforge_common::ContentHash;
use serde::{Deserialize, Serialize};

/// Ordered list of strings summarizing what an entity's cached data depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyFingerprint(Vec<String>);

impl DependencyFingerprint {
    /// Creates a fingerprint from dependencies in their significant order.
    pub fn new(dependencies: Vec<String>) -> Self {
        Self(dependencies)
    }

    /// Returns the dependencies in order.
    pub fn dependencies(&self) -> &[String] {
        &self.0
    }

    /// Returns the number of dependencies.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the entity has no dependencies.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a compact hash of the fingerprint, useful in log output.
    pub fn digest(&self) -> ContentHash {
        ContentHash::from_parts(self.0.iter().map(|d| d.as_bytes()))
    }

    /// Compares this (current) fingerprint against a previously recorded one.
    pub fn diff(&self, recorded: &DependencyFingerprint) -> FingerprintDiff {
        let current: HashSet<&str> = self.0.iter().map(String::as_str).collect();
        let previous: HashSet<&str> = recorded.0.iter().map(String::as_str).collect();

        let added: Vec<String> = self
            .0
            .iter()
            .filter(|d| !previous.contains(d.as_str()))
            .cloned()
            .collect();
        let removed: Vec<String> = recorded
            .0
            .iter()
            .filter(|d| !current.contains(d.as_str()))
            .cloned()
            .collect();
        let unchanged: Vec<String> = self
            .0
            .iter()
            .filter(|d| previous.contains(d.as_str()))
            .cloned()
            .collect();

        let shared_previous: Vec<&String> = recorded
            .0
            .iter()
            .filter(|d| current.contains(d.as_str()))
            .collect();
        let reordered = unchanged.iter().ne(shared_previous.into_iter());

        FingerprintDiff {
            added,
            removed,
            unchanged,
            reordered,
        }
    }
}

impl From<Vec<String>> for DependencyFingerprint {
    fn from(dependencies: Vec<String>) -> Self {
        Self(dependencies)
    }
}

impl FromIterator<String> for DependencyFingerprint {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Result of comparing a current fingerprint against a recorded one.
///
/// Categorizes dependencies into added (not recorded before), removed
/// (recorded but gone) and unchanged. `reordered` is set when the unchanged
/// dependencies appear in a different relative order, which on its own is
/// enough to make the entity stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintDiff {
    /// Dependencies present now but not in the recorded fingerprint.
    pub added: Vec<String>,

    /// Dependencies recorded before but no longer present.
    pub removed: Vec<String>,

    /// Dependencies present in both, in current order.
    pub unchanged: Vec<String>,

    /// Whether the shared dependencies changed relative order.
    pub reordered: bool,
}

impl FingerprintDiff {
    /// Returns `true` if the two fingerprints were identical.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && !self.reordered
    }

    /// Returns the number of dependencies that differ (added + removed).
    pub fn changed_count(&self) -> usize {
        self.added.len() + self.removed.len()
    }
}
