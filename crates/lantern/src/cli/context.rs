//! Shared context for running CLI commands.

use std::{
    env,
    path::{Path, PathBuf},
    process::ExitCode,
};

use lantern_config::Config;
use lantern_index::{CacheConfig, Engines, IndexManager, TantivyFactory};

use super::args::Cli;

/// The manager type every command drives.
pub type Manager = IndexManager<Engines<TantivyFactory>>;

/// Command execution context built once per CLI invocation.
pub struct CommandContext {
    /// Loaded configuration with command-line overrides applied.
    pub config: Config,
}

impl CommandContext {
    /// Loads configuration, honouring `--config` and `--root`.
    pub fn load(cli: &Cli) -> Result<Self, ExitCode> {
        let cwd = current_dir_or_failure()?;
        let mut config = match &cli.config {
            Some(path) => Config::load_file(path),
            None => Config::load(&cwd),
        }
        .map_err(|e| {
            eprintln!("error: failed to load configuration: {e}");
            ExitCode::FAILURE
        })?;

        if let Some(root) = &cli.root {
            config.root_dir = Some(absolute(&cwd, root));
        }
        Ok(Self { config })
    }

    /// Validates the configuration and opens an index manager over its root.
    pub fn manager(&self) -> Result<Manager, ExitCode> {
        if let Err(e) = self.config.validate() {
            eprintln!("error: invalid configuration: {e}");
            if self.config.root_dir.is_none() {
                eprintln!("Set root_dir in lantern.toml or pass --root.");
            }
            return Err(ExitCode::FAILURE);
        }
        let root = self.config.require_root_dir().map_err(|e| {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        })?;

        IndexManager::new(CacheConfig::from(&self.config), root, Engines::tantivy()).map_err(|e| {
            eprintln!("error: failed to start index manager: {e}");
            ExitCode::FAILURE
        })
    }
}

/// Resolves `path` against `cwd` unless it is already absolute.
fn absolute(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

/// Returns the current working directory or exits with a consistent error.
fn current_dir_or_failure() -> Result<PathBuf, ExitCode> {
    env::current_dir().map_err(|e| {
        eprintln!("error: could not determine current directory: {e}");
        ExitCode::FAILURE
    })
}
