//! Persisted index definitions.
//!
//! A definition is written once when an index is created and read back every
//! time the index is opened. Its presence on disk is what makes an index exist.

use std::{
    collections::BTreeMap,
    fs::{self, OpenOptions},
    io::{self, Write},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::IndexError;

/// Engine version written when a definition does not name one.
pub const DEFAULT_ENGINE_VERSION: u32 = 1;

/// Field names that engines reserve for their own use.
const RESERVED_FIELD_NAMES: &[&str] = &["text", "fields", "string"];

/// Immutable configuration of one index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    /// Major version of the engine that owns the index storage.
    #[serde(default = "default_engine_version")]
    pub engine_version: u32,
    /// Analyzer applied to text fields without an override.
    pub default_analyzer: String,
    /// Per-field analyzer overrides.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub field_analyzers: BTreeMap<String, String>,
}

/// Serde default for [`IndexDefinition::engine_version`].
fn default_engine_version() -> u32 {
    DEFAULT_ENGINE_VERSION
}

impl IndexDefinition {
    /// Creates a definition using `default_analyzer` for every field.
    pub fn new(default_analyzer: impl Into<String>) -> Self {
        Self {
            engine_version: DEFAULT_ENGINE_VERSION,
            default_analyzer: default_analyzer.into(),
            field_analyzers: BTreeMap::new(),
        }
    }

    /// Adds a per-field analyzer override.
    pub fn with_field_analyzer(
        mut self,
        field: impl Into<String>,
        analyzer: impl Into<String>,
    ) -> Self {
        self.field_analyzers.insert(field.into(), analyzer.into());
        self
    }

    /// Checks field names; analyzer names are checked by the engine.
    pub fn check_fields(&self) -> Result<(), IndexError> {
        for field in self.field_analyzers.keys() {
            if field.is_empty()
                || field.starts_with('_')
                || RESERVED_FIELD_NAMES.contains(&field.as_str())
            {
                return Err(IndexError::InvalidDefinition(format!(
                    "field name '{field}' is reserved"
                )));
            }
            if field.starts_with('-') || field.contains(['.', ':']) {
                return Err(IndexError::InvalidDefinition(format!(
                    "field name '{field}' is not queryable"
                )));
            }
        }
        Ok(())
    }

    /// Loads a definition from a JSON file.
    ///
    /// A missing file is reported as [`IndexError::NotFound`] for `name`.
    pub fn load(path: &Path, name: &str) -> Result<Self, IndexError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(IndexError::NotFound {
                    name: name.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&contents).map_err(|source| IndexError::DefinitionFile {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Saves a definition that must not exist yet.
    ///
    /// Creates parent directories. Uses create-new semantics so two concurrent
    /// creators cannot both succeed; the loser gets [`IndexError::AlreadyExists`].
    pub fn save_new(&self, path: &Path, name: &str) -> Result<(), IndexError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents =
            serde_json::to_vec_pretty(self).map_err(|source| IndexError::DefinitionFile {
                path: path.to_path_buf(),
                source,
            })?;

        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(IndexError::AlreadyExists {
                    name: name.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(&contents)?;
        file.sync_all()?;
        Ok(())
    }

    /// Removes a definition file. A file that is already gone is not an error.
    pub fn remove(path: &Path) -> Result<(), IndexError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
