//! Parsing and validation of `docforge.toml` project configuration files.
//!
//! This crate reads the project configuration file and produces a strongly-typed
//! [`ProjectConfig`]. The `[cache]` table carries the process-wide cache settings
//! (format version, default TTL, storage directory) that stay fixed for the
//! whole documentation-generation run.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_file, load_config_from_str, CONFIG_FILE};
pub use types::*;
