//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::ProjectConfig;
use std::path::Path;

/// Name of the configuration file looked up in the project directory.
pub const CONFIG_FILE: &str = "docforge.toml";

/// Loads and validates a `docforge.toml` configuration from a project directory.
///
/// Reads `<project_dir>/docforge.toml`, parses it, and validates required fields.
pub fn load_config(project_dir: &Path) -> Result<ProjectConfig, ConfigError> {
    load_config_file(&project_dir.join(CONFIG_FILE))
}

/// Loads and validates a configuration file at an explicit path.
///
/// The file may have any name; it is parsed as `docforge.toml`.
pub fn load_config_file(path: &Path) -> Result<ProjectConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `docforge.toml` configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<ProjectConfig, ConfigError> {
    let config: ProjectConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates that required fields are present and cache settings are usable.
fn validate_config(config: &ProjectConfig) -> Result<(), ConfigError> {
    if config.project.name.is_empty() {
        return Err(ConfigError::MissingField("project.name".to_string()));
    }
    let version = &config.cache.format_version;
    if version.is_empty() {
        return Err(ConfigError::MissingField("cache.format_version".to_string()));
    }
    if version.chars().any(char::is_whitespace) {
        return Err(ConfigError::ValidationError(format!(
            "cache.format_version '{version}' must not contain whitespace"
        )));
    }
    if version.contains('_') {
        return Err(ConfigError::ValidationError(format!(
            "cache.format_version '{version}' must not contain '_'"
        )));
    }
    if config.cache.default_ttl == 0 {
        return Err(ConfigError::ValidationError(
            "cache.default_ttl must be positive".to_string(),
        ));
    }
    if config.cache.dir.is_empty() {
        return Err(ConfigError::MissingField("cache.dir".to_string()));
    }
    Ok(())
}
