//! Configuration file parsing.
//!
//! Parses a `lantern.toml` file into a `RawConfig` that preserves the optional
//! nature of every key before defaults are applied.

use std::{fs, path::Path};

use serde::Deserialize;

use crate::ConfigError;

/// Raw configuration as parsed directly from a TOML file.
///
/// All fields are optional; missing keys fall back to defaults when the raw
/// config is resolved into a [`crate::Config`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawConfig {
    /// Directory holding every index. Relative paths are resolved against the
    /// directory containing the config file.
    pub root_dir: Option<String>,
    /// Maximum number of concurrently open index handles.
    pub max_indexes_open: Option<u64>,
    /// Seconds between automatic commits of an open index.
    pub commit_interval_seconds: Option<u64>,
    /// Seconds without access after which an open index is closed.
    pub idle_seconds: Option<u64>,
    /// Retry behaviour when acquiring a handle that is being closed.
    pub acquire: Option<RawAcquireSettings>,
}

/// Raw `[acquire]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawAcquireSettings {
    /// Number of attempts before giving up.
    pub attempts: Option<u64>,
    /// Milliseconds to sleep between attempts.
    pub backoff_ms: Option<u64>,
}

/// Parses a configuration file from disk.
pub fn parse_config_file(path: &Path) -> Result<RawConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;

    parse_config_str(&contents, path)
}

/// Parses configuration from a TOML string.
///
/// The `path` parameter is used for error reporting.
pub fn parse_config_str(contents: &str, path: &Path) -> Result<RawConfig, ConfigError> {
    toml::from_str(contents).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source,
    })
}
