//! Configuration system for lantern.
//!
//! lantern reads a TOML file named `lantern.toml`. The file is discovered by
//! walking up the directory tree from the current working directory, falling
//! back to `~/.lantern.toml`. Every key is optional; missing keys take the
//! defaults documented on [`Config`].

#![warn(missing_docs)]

mod discovery;
mod error;
mod parse;
mod resolve;
#[cfg(test)]
mod test_support;
mod validate;

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

pub use discovery::{
    CONFIG_FILENAME, GLOBAL_CONFIG_FILENAME, discover_config_file, global_config_path,
};
pub use error::ConfigError;
pub use parse::{RawAcquireSettings, RawConfig, parse_config_file, parse_config_str};
pub use resolve::resolve_root_dir;
use serde::Serialize;
use validate::validate_config;

/// Fully resolved configuration for the index server.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Directory holding every index. `None` until configured.
    pub root_dir: Option<PathBuf>,
    /// Maximum number of concurrently open index handles.
    pub max_indexes_open: u64,
    /// Seconds between automatic commits of an open index.
    pub commit_interval_seconds: u64,
    /// Seconds without access after which an open index is closed.
    pub idle_seconds: u64,
    /// Retry behaviour when acquiring a handle that is being closed.
    pub acquire: AcquireSettings,
    /// The file this configuration was loaded from, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_dir: None,
            max_indexes_open: 100,
            commit_interval_seconds: 30,
            idle_seconds: 300,
            acquire: AcquireSettings::default(),
            source: None,
        }
    }
}

/// Settings for the acquire retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AcquireSettings {
    /// Number of attempts before giving up.
    pub attempts: u64,
    /// Milliseconds to sleep between attempts.
    pub backoff_ms: u64,
}

impl Default for AcquireSettings {
    fn default() -> Self {
        Self {
            attempts: 500,
            backoff_ms: 5,
        }
    }
}

impl Config {
    /// Loads configuration for `cwd`.
    ///
    /// Discovers the applicable config file (see [`discover_config_file`]) and
    /// parses it. Returns `Ok(Config::default())` when no file is found; the
    /// result still needs a root directory before it [validates](Self::validate).
    pub fn load(cwd: &Path) -> Result<Self, ConfigError> {
        match discover_config_file(cwd) {
            Some(path) => Self::load_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Loads configuration from a specific file.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = parse_config_file(path)?;
        let config_dir = path.parent().unwrap_or(Path::new("."));
        let mut config = Self::from_raw(raw, config_dir)?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Applies defaults to a raw configuration.
    ///
    /// Relative `root_dir` values resolve against `config_dir`.
    pub fn from_raw(raw: RawConfig, config_dir: &Path) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let root_dir = raw
            .root_dir
            .map(|dir| resolve_root_dir(&dir, config_dir))
            .transpose()?;
        let acquire = raw.acquire.unwrap_or_default();

        Ok(Self {
            root_dir,
            max_indexes_open: raw.max_indexes_open.unwrap_or(defaults.max_indexes_open),
            commit_interval_seconds: raw
                .commit_interval_seconds
                .unwrap_or(defaults.commit_interval_seconds),
            idle_seconds: raw.idle_seconds.unwrap_or(defaults.idle_seconds),
            acquire: AcquireSettings {
                attempts: acquire.attempts.unwrap_or(defaults.acquire.attempts),
                backoff_ms: acquire.backoff_ms.unwrap_or(defaults.acquire.backoff_ms),
            },
            source: None,
        })
    }

    /// Validates the configuration, returning the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_config(self)
    }

    /// Returns the root directory, or [`ConfigError::MissingRootDir`].
    pub fn require_root_dir(&self) -> Result<&Path, ConfigError> {
        self.root_dir.as_deref().ok_or(ConfigError::MissingRootDir)
    }

    /// Commit interval as a [`Duration`].
    pub fn commit_interval(&self) -> Duration {
        Duration::from_secs(self.commit_interval_seconds)
    }

    /// Idle eviction threshold as a [`Duration`].
    pub fn idle(&self) -> Duration {
        Duration::from_secs(self.idle_seconds)
    }

    /// Serializes the effective settings to TOML format.
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestDir;

    #[test]
    fn load_without_file_returns_defaults() {
        let dir = TestDir::new();
        let config = Config::load(dir.path()).unwrap();
        // A global ~/.lantern.toml on the test machine could make this Some.
        if config.source.is_none() {
            assert!(config.root_dir.is_none());
            assert_eq!(config.max_indexes_open, 100);
        }
    }

    #[test]
    fn relative_root_resolves_against_config_dir() {
        let dir = TestDir::new();
        let path = dir.create_config("srv", "root_dir = \"indexes\"\nidle_seconds = 60\n");

        let config = Config::load_file(&path).unwrap();
        assert_eq!(config.root_dir, Some(dir.path().join("srv").join("indexes")));
        assert_eq!(config.idle_seconds, 60);
        assert_eq!(config.commit_interval_seconds, 30);
        assert_eq!(config.source, Some(path));
    }

    #[test]
    fn acquire_section_overrides_defaults_per_key() {
        let raw = parse_config_str("[acquire]\nattempts = 3\n", Path::new("x.toml")).unwrap();
        let config = Config::from_raw(raw, Path::new("/")).unwrap();
        assert_eq!(config.acquire.attempts, 3);
        assert_eq!(config.acquire.backoff_ms, 5);
    }

    #[test]
    fn durations() {
        let config = Config {
            commit_interval_seconds: 7,
            idle_seconds: 9,
            ..Config::default()
        };
        assert_eq!(config.commit_interval(), Duration::from_secs(7));
        assert_eq!(config.idle(), Duration::from_secs(9));
    }

    #[test]
    fn to_toml_round_trips_through_parser() {
        let config = Config {
            root_dir: Some(PathBuf::from("/srv/indexes")),
            max_indexes_open: 12,
            ..Config::default()
        };
        let text = config.to_toml();
        let raw = parse_config_str(&text, Path::new("out.toml")).unwrap();
        assert_eq!(raw.root_dir.as_deref(), Some("/srv/indexes"));
        assert_eq!(raw.max_indexes_open, Some(12));
    }
}
