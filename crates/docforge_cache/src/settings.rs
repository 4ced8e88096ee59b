//! Process-wide cache settings.

use std::time::Duration;

use docforge_config::CacheConfig;

use crate::error::CacheError;

/// Immutable cache settings for one documentation-generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    format_version: String,
    default_ttl: Duration,
    enabled: bool,
    parallel: bool,
}

impl CacheSettings {
    /// Creates enabled, sequential settings.
    ///
    /// Fails if the format version is empty or contains whitespace or `_`, or
    /// if the default TTL is shorter than one second.
    pub fn new(format_version: impl Into<String>, default_ttl: Duration) -> Result<Self, CacheError> {
        let format_version = format_version.into();
        if format_version.is_empty() {
            return Err(CacheError::InvalidSettings {
                reason: "format version is empty".to_string(),
            });
        }
        if format_version.chars().any(char::is_whitespace) {
            return Err(CacheError::InvalidSettings {
                reason: format!("format version '{format_version}' contains whitespace"),
            });
        }
        // `_` separates the version from the identity in bucket keys.
        if format_version.contains('_') {
            return Err(CacheError::InvalidSettings {
                reason: format!("format version '{format_version}' contains '_'"),
            });
        }
        if default_ttl.as_secs() == 0 {
            return Err(CacheError::InvalidSettings {
                reason: "default TTL must be at least one second".to_string(),
            });
        }
        Ok(Self {
            format_version,
            default_ttl,
            enabled: true,
            parallel: false,
        })
    }

    /// Builds settings from the `[cache]` table of `docforge.toml`.
    pub fn from_config(config: &CacheConfig) -> Result<Self, CacheError> {
        Ok(Self::new(
            config.format_version.clone(),
            Duration::from_secs(config.default_ttl),
        )?
        .with_enabled(config.enabled)
        .with_parallel(config.parallel))
    }

    /// Enables or disables caching.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Allows or forbids the parallel sweep.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Returns the cache format version.
    pub fn format_version(&self) -> &str {
        &self.format_version
    }

    /// Returns the TTL applied to methods that do not declare one.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Returns `true` if caching is enabled.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Returns `true` if the sweep may run in parallel.
    pub fn parallel(&self) -> bool {
        self.parallel
    }

    /// Returns the bucket key for an entity: `{format_version}_{identity}`.
    pub fn versioned_key(&self, identity: &str) -> String {
        format!("{}_{identity}", self.format_version)
    }
}
