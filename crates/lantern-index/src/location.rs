//! Index location resolution.
//!
//! Every index lives under a single root directory:
//!
//! ```text
//! <root>/<name>/index_definition.json   persisted definition
//! <root>/<name>/index/                  engine-owned storage
//! ```
//!
//! Names may contain `/` to nest indexes. Resolution is purely lexical and
//! refuses any name whose normalized path leaves the root. A name may not
//! contain [`STORAGE_DIR`] or [`DEFINITION_FILENAME`] as a component, since
//! such an index would live inside another index's own files.

use std::{
    fs, io,
    path::{Component, Path, PathBuf},
};

use crate::IndexError;

/// Name of the definition file inside an index directory.
pub const DEFINITION_FILENAME: &str = "index_definition.json";

/// Name of the engine storage directory inside an index directory.
pub const STORAGE_DIR: &str = "index";

/// Filesystem locations of one index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPaths {
    /// Root directory shared by all indexes.
    pub root: PathBuf,
    /// Directory named after the index.
    pub dir: PathBuf,
    /// The persisted definition file.
    pub definition: PathBuf,
    /// Engine storage directory.
    pub storage: PathBuf,
}

/// Maps index names to paths under a fixed root.
#[derive(Debug, Clone)]
pub struct PathResolver {
    /// Normalized root directory.
    root: PathBuf,
}

impl PathResolver {
    /// Creates a resolver for `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: normalize(root.as_ref()),
        }
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Joins `name` onto the root and normalizes the result.
    ///
    /// Fails with [`IndexError::PathEscape`] unless the normalized path is the
    /// root or lies beneath it. An empty name resolves to the root itself, which
    /// is useful for walking every index.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, IndexError> {
        let resolved = normalize(&self.root.join(name));
        if resolved.starts_with(&self.root) {
            Ok(resolved)
        } else {
            Err(IndexError::PathEscape {
                name: name.to_string(),
            })
        }
    }

    /// Resolves the locations of a single index.
    ///
    /// Unlike [`resolve`](Self::resolve), a name that resolves to the root
    /// itself is rejected: the root cannot be an index. Names with a reserved
    /// component fail with [`IndexError::InvalidName`].
    pub fn index_paths(&self, name: &str) -> Result<IndexPaths, IndexError> {
        let dir = self.resolve(name)?;
        if dir == self.root {
            return Err(IndexError::PathEscape {
                name: name.to_string(),
            });
        }
        if let Some(component) = reserved_component(&dir, &self.root) {
            return Err(IndexError::InvalidName {
                name: name.to_string(),
                component,
            });
        }
        Ok(IndexPaths {
            root: self.root.clone(),
            definition: dir.join(DEFINITION_FILENAME),
            storage: dir.join(STORAGE_DIR),
            dir,
        })
    }

    /// Converts an index directory back into its name.
    ///
    /// Components are joined with `/` regardless of platform. Returns `None` for
    /// paths outside the root, the root itself, or non-UTF-8 paths.
    pub fn name_of(&self, dir: &Path) -> Option<String> {
        let relative = dir.strip_prefix(&self.root).ok()?;
        let parts: Option<Vec<&str>> = relative.iter().map(|c| c.to_str()).collect();
        let parts = parts?;
        if parts.is_empty() {
            return None;
        }
        Some(parts.join("/"))
    }
}

/// Returns the first reserved name among the components of `dir` below `root`.
fn reserved_component(dir: &Path, root: &Path) -> Option<&'static str> {
    let relative = dir.strip_prefix(root).ok()?;
    relative.iter().find_map(|part| {
        [STORAGE_DIR, DEFINITION_FILENAME]
            .into_iter()
            .find(|reserved| part.to_str() == Some(*reserved))
    })
}

impl IndexPaths {
    /// Removes the index directory and then each empty ancestor, stopping at
    /// the root or at the first directory that still has entries.
    pub fn prune_empty_dirs(&self) -> Result<(), IndexError> {
        let mut dir = self.dir.as_path();
        while dir != self.root && dir.starts_with(&self.root) {
            match fs::remove_dir(dir) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) if e.kind() == io::ErrorKind::DirectoryNotEmpty => return Ok(()),
                Err(e) => return Err(e.into()),
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => break,
            }
        }
        Ok(())
    }
}

/// Lexically normalizes a path, resolving `.` and `..` components.
///
/// A `..` that cannot pop a normal component is kept, so escaping a relative
/// root remains detectable by prefix comparison.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(out.components().next_back(), Some(Component::Normal(_)));
                if can_pop {
                    out.pop();
                } else if !out.has_root() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}
