//! Configuration file discovery.
//!
//! Finds the `lantern.toml` closest to a starting directory by walking up the
//! directory tree, falling back to the global `~/.lantern.toml`.

use std::path::{Path, PathBuf};

use directories::BaseDirs;

/// The configuration filename searched for in working directories.
pub const CONFIG_FILENAME: &str = "lantern.toml";

/// The global configuration filename in the home directory.
pub const GLOBAL_CONFIG_FILENAME: &str = ".lantern.toml";

/// Discovers the configuration file that applies to `cwd`.
///
/// Walks up from `cwd` to the filesystem root and returns the first
/// `lantern.toml` found. If none exists, returns `~/.lantern.toml` when that
/// file exists. Returns `None` when no configuration file is found.
pub fn discover_config_file(cwd: &Path) -> Option<PathBuf> {
    let mut current = Some(cwd);
    while let Some(dir) = current {
        let config_path = dir.join(CONFIG_FILENAME);
        if config_path.is_file() {
            return Some(config_path);
        }
        current = dir.parent();
    }

    global_config_path().filter(|path| path.is_file())
}

/// Returns the path to the global configuration file (`~/.lantern.toml`).
///
/// Returns `None` if the home directory cannot be determined.
pub fn global_config_path() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| dirs.home_dir().join(GLOBAL_CONFIG_FILENAME))
}
