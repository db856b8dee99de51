//! Error types for lantern configuration.

use std::{io, path::PathBuf};

use thiserror::Error;
use toml::de;

/// Errors that can occur when loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Failed to parse TOML configuration.
    #[error("failed to parse config file {path}: {source}")]
    ParseToml {
        /// Path to the file that could not be parsed.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: de::Error,
    },

    /// No index root directory was configured.
    #[error("no root_dir configured")]
    MissingRootDir,

    /// A numeric setting is below its allowed minimum.
    #[error("{key} must be at least {minimum}, got {value}")]
    InvalidValue {
        /// Name of the offending key.
        key: &'static str,
        /// Configured value.
        value: u64,
        /// Smallest accepted value.
        minimum: u64,
    },

    /// Failed to determine home directory.
    #[error("could not determine home directory")]
    NoHomeDirectory,
}
