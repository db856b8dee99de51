//! Index discovery.
//!
//! Walks a directory subtree and reports every index directory in it. A
//! directory is an index when it holds a definition file; indexes may nest,
//! so the walk continues below each one it finds.

use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::WalkDir;

use crate::location::DEFINITION_FILENAME;

/// Deepest directory level the walk descends to.
pub const MAX_DEPTH: usize = 100;

/// Returns every index directory at or below `dir`, sorted.
///
/// A missing `dir` yields no indexes. Unreadable entries are logged and
/// skipped. Symlinks are not followed.
pub fn find_index_dirs(dir: &Path) -> Vec<PathBuf> {
    if !dir.exists() {
        return Vec::new();
    }

    let mut found = Vec::new();
    for entry in WalkDir::new(dir).max_depth(MAX_DEPTH).follow_links(false) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };

        if !entry.file_type().is_file() || entry.file_name() != DEFINITION_FILENAME {
            continue;
        }

        if let Some(parent) = entry.path().parent() {
            found.push(parent.to_path_buf());
        }
    }

    found.sort();
    found
}
