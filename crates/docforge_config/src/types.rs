//! Configuration types deserialized from `docforge.toml`.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;

/// Cache format version used when `[cache]` does not name one.
pub const DEFAULT_FORMAT_VERSION: &str = "v6";

/// Default lifetime of a cached value: one week.
pub const DEFAULT_TTL_SECS: u64 = 604_800;

/// Cache directory used when `[cache]` does not name one, relative to the project root.
pub const DEFAULT_CACHE_DIR: &str = ".docforge-cache";

/// The top-level project configuration parsed from `docforge.toml`.
#[derive(Debug, Deserialize)]
pub struct ProjectConfig {
    /// Core project metadata.
    pub project: ProjectMeta,
    /// Entity cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Core project metadata required in every `docforge.toml`.
#[derive(Debug, Deserialize)]
pub struct ProjectMeta {
    /// The project name.
    pub name: String,
    /// A brief description of the project.
    #[serde(default)]
    pub description: String,
}

/// The `[cache]` table.
///
/// Every field has a default, so an absent table yields a working cache with
/// a one-week TTL stored under `.docforge-cache`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Whether entity caching is enabled at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Cache format version prefixed onto every bucket key.
    ///
    /// Changing it orphans every previously written bucket.
    #[serde(default = "default_format_version")]
    pub format_version: String,
    /// Default time-to-live, in seconds, for cached values.
    ///
    /// Accepts either an integer number of seconds or a string such as
    /// `"90s"`, `"15m"`, `"12h"`, `"7d"` or `"2w"`.
    #[serde(default = "default_ttl", deserialize_with = "deserialize_ttl")]
    pub default_ttl: u64,
    /// Directory holding persisted buckets, relative to the project root.
    #[serde(default = "default_dir")]
    pub dir: String,
    /// Whether the end-of-run sweep may process entities in parallel.
    #[serde(default)]
    pub parallel: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            format_version: default_format_version(),
            default_ttl: default_ttl(),
            dir: default_dir(),
            parallel: false,
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_format_version() -> String {
    DEFAULT_FORMAT_VERSION.to_string()
}

fn default_ttl() -> u64 {
    DEFAULT_TTL_SECS
}

fn default_dir() -> String {
    DEFAULT_CACHE_DIR.to_string()
}

/// Parses a human-readable TTL such as `"7d"` into seconds.
///
/// Supported suffixes are `s`, `m`, `h`, `d` and `w`. A bare number is taken
/// as seconds.
pub fn parse_ttl(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty TTL string".to_string());
    }
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);
    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid TTL '{s}': expected a number followed by a unit"))?;
    let multiplier = match unit.trim() {
        "" | "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        "w" => 7 * 24 * 60 * 60,
        other => return Err(format!("invalid TTL unit '{other}' in '{s}'")),
    };
    value
        .checked_mul(multiplier)
        .ok_or_else(|| format!("TTL '{s}' is too large"))
}

/// Deserializes a TTL given either as integer seconds or as a duration string.
fn deserialize_ttl<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    struct TtlVisitor;

    impl Visitor<'_> for TtlVisitor {
        type Value = u64;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a number of seconds or a duration string like \"7d\"")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            u64::try_from(v).map_err(|_| E::custom(format!("TTL must not be negative, got {v}")))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            parse_ttl(v).map_err(E::custom)
        }
    }

    deserializer.deserialize_any(TtlVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ttl_units() {
        assert_eq!(parse_ttl("90").unwrap(), 90);
        assert_eq!(parse_ttl("90s").unwrap(), 90);
        assert_eq!(parse_ttl("15m").unwrap(), 900);
        assert_eq!(parse_ttl("12h").unwrap(), 43_200);
        assert_eq!(parse_ttl("7d").unwrap(), DEFAULT_TTL_SECS);
        assert_eq!(parse_ttl("2w").unwrap(), 2 * DEFAULT_TTL_SECS);
    }

    #[test]
    fn parse_ttl_rejects_garbage() {
        assert!(parse_ttl("").is_err());
        assert!(parse_ttl("d").is_err());
        assert!(parse_ttl("5y").is_err());
        assert!(parse_ttl("18446744073709551615w").is_err());
    }

    #[test]
    fn cache_config_defaults() {
        let c = CacheConfig::default();
        assert!(c.enabled);
        assert_eq!(c.format_version, "v6");
        assert_eq!(c.default_ttl, 604_800);
        assert_eq!(c.dir, ".docforge-cache");
        assert!(!c.parallel);
    }
}
