//! Project root resolution and configuration loading for CLI commands.

use std::path::{Path, PathBuf};

use docforge_cache::FileStore;
use docforge_config::{load_config_file, ProjectConfig, CONFIG_FILE};
use tracing::debug;

use crate::GlobalArgs;

/// Walks up from `start` looking for the nearest directory containing `docforge.toml`.
pub fn find_project_root(start: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(format!(
                "could not find {CONFIG_FILE} in {} or any parent directory",
                start.display()
            )
            .into());
        }
    }
}

/// Where the project configuration comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSource {
    /// Project root; the cache directory is resolved against it.
    pub root: PathBuf,
    /// Configuration file to load.
    pub file: PathBuf,
}

/// Resolves the project root and configuration file from global CLI args.
///
/// `--config` naming a file loads that file, whatever its name, with its
/// directory as the project root. `--config` naming a directory loads its
/// `docforge.toml`. Otherwise walks up from the current directory looking for
/// `docforge.toml`.
pub fn resolve_config(global: &GlobalArgs) -> Result<ConfigSource, Box<dyn std::error::Error>> {
    let root = match global.config {
        Some(ref config_path) => {
            let p = PathBuf::from(config_path);
            if p.is_file() {
                let root = match p.parent() {
                    Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                    _ => PathBuf::from("."),
                };
                return Ok(ConfigSource { root, file: p });
            }
            p
        }
        None => find_project_root(&std::env::current_dir()?)?,
    };
    let file = root.join(CONFIG_FILE);
    Ok(ConfigSource { root, file })
}

/// A loaded project: its root, its configuration and its bucket store.
pub struct Project {
    /// Directory the cache directory is resolved against.
    pub root: PathBuf,
    /// Parsed configuration.
    pub config: ProjectConfig,
    /// Durable store under the configured cache directory.
    pub store: FileStore,
}

/// Loads the project selected by the global CLI args.
pub fn open(global: &GlobalArgs) -> Result<Project, Box<dyn std::error::Error>> {
    let ConfigSource { root, file } = resolve_config(global)?;
    let config = load_config_file(&file)?;
    let store = FileStore::new(&root.join(&config.cache.dir));
    debug!(
        root = %root.display(),
        config = %file.display(),
        cache_dir = %store.dir().display(),
        "opened project"
    );
    Ok(Project {
        root,
        config,
        store,
    })
}
