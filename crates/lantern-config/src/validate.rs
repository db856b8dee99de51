//! Configuration validation.
//!
//! Every numeric knob has a lower bound; a root directory is mandatory.

use crate::{Config, ConfigError};

/// Returns an error for the first setting that violates its lower bound.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.root_dir.is_none() {
        return Err(ConfigError::MissingRootDir);
    }

    let checks: [(&'static str, u64); 5] = [
        ("max_indexes_open", config.max_indexes_open),
        ("commit_interval_seconds", config.commit_interval_seconds),
        ("idle_seconds", config.idle_seconds),
        ("acquire.attempts", config.acquire.attempts),
        ("acquire.backoff_ms", config.acquire.backoff_ms),
    ];

    for (key, value) in checks {
        if value < 1 {
            return Err(ConfigError::InvalidValue {
                key,
                value,
                minimum: 1,
            });
        }
    }

    Ok(())
}
