//! Path resolution for the configured index root.
//!
//! Resolves relative and tilde-prefixed `root_dir` values to absolute paths.

use std::path::{Path, PathBuf};

use directories::BaseDirs;

use crate::ConfigError;

/// Resolves a `root_dir` value to an absolute path.
///
/// Handles three cases:
/// - Tilde paths (`~/indexes`) - expanded to the home directory
/// - Relative paths (`./indexes`) - resolved relative to `config_dir`
/// - Absolute paths - returned unchanged
///
/// The directory does not need to exist yet; it is created on first use.
pub fn resolve_root_dir(path: &str, config_dir: &Path) -> Result<PathBuf, ConfigError> {
    let expanded = expand_tilde(path)?;

    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        Ok(config_dir.join(expanded))
    }
}

/// Expands a tilde prefix to the home directory.
fn expand_tilde(path: &str) -> Result<PathBuf, ConfigError> {
    if path == "~" {
        return home_dir();
    }

    if let Some(rest) = path.strip_prefix("~/") {
        return Ok(home_dir()?.join(rest));
    }

    Ok(PathBuf::from(path))
}

/// Returns the home directory.
fn home_dir() -> Result<PathBuf, ConfigError> {
    BaseDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .ok_or(ConfigError::NoHomeDirectory)
}
