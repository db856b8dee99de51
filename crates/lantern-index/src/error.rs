//! Error types for the lantern-index crate.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors that can occur when working with indexes and their handles.
#[derive(Debug, Error)]
pub enum IndexError {
    /// A mutation carried a sequence number that is not newer than the index.
    #[error("update sequence {attempted} is not after current sequence {current}")]
    OutOfOrderUpdate {
        /// The sequence the index has already applied.
        current: u64,
        /// The sequence carried by the rejected mutation.
        attempted: u64,
    },

    /// An index definition already exists under this name.
    #[error("index {name} already exists")]
    AlreadyExists {
        /// Index name.
        name: String,
    },

    /// No index definition exists under this name.
    #[error("index {name} does not exist")]
    NotFound {
        /// Index name.
        name: String,
    },

    /// The index name resolves outside the root directory.
    #[error("{name} attempts to escape from the index root directory")]
    PathEscape {
        /// Offending index name.
        name: String,
    },

    /// The name collides with the files an index keeps in its own directory.
    #[error("{name} is not a valid index name: {component} is reserved")]
    InvalidName {
        /// Offending index name.
        name: String,
        /// The reserved path component it contains.
        component: &'static str,
    },

    /// Every attempt to acquire a live handle raced a concurrent close.
    #[error("failed to acquire {name} after {attempts} attempts")]
    AcquireTimeout {
        /// Index name.
        name: String,
        /// Number of attempts made.
        attempts: u32,
    },

    /// The handle was used after it was closed.
    #[error("index {name} is closed")]
    Closed {
        /// Index name.
        name: String,
    },

    /// Failed to open or create the index.
    #[error("failed to open index at {path}: {message}")]
    OpenIndex {
        /// Path to the index directory.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Failed to write to the index.
    #[error("failed to write to index: {0}")]
    Write(String),

    /// Failed to commit changes to the index.
    #[error("failed to commit index: {0}")]
    Commit(String),

    /// Failed to execute a search.
    #[error("search failed: {0}")]
    Search(String),

    /// The query string could not be parsed.
    #[error("invalid query '{query}': {message}")]
    Query {
        /// The query as submitted.
        query: String,
        /// Parser message.
        message: String,
    },

    /// The sort order or its `after` cursor cannot be applied.
    #[error("invalid sort {sort}: {message}")]
    Sort {
        /// The sort as submitted.
        sort: String,
        /// What is wrong with it.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Unknown analyzer name.
    #[error("{0} is not a valid analyzer name")]
    InvalidAnalyzer(String),

    /// The index definition is structurally invalid.
    #[error("invalid index definition: {0}")]
    InvalidDefinition(String),

    /// No engine is registered for the definition's engine version.
    #[error("unsupported engine version {version}")]
    UnsupportedEngine {
        /// Requested engine major version.
        version: u32,
    },

    /// A persisted definition file could not be decoded or encoded.
    #[error("malformed definition file {path}: {source}")]
    DefinitionFile {
        /// Path to the definition file.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
}

/// Coarse classification of an [`IndexError`] for callers that translate
/// errors into protocol responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The request itself is invalid.
    BadRequest,
    /// The named index does not exist.
    NotFound,
    /// The request conflicts with existing state.
    Conflict,
    /// A transient failure; the caller may retry.
    Unavailable,
    /// An unexpected engine or I/O failure.
    Internal,
}

impl IndexError {
    /// Creates an `OpenIndex` error from a path and Tantivy error.
    pub(crate) fn open_index(path: PathBuf, source: &tantivy::TantivyError) -> Self {
        Self::OpenIndex {
            path,
            message: source.to_string(),
        }
    }

    /// Creates a `Write` error from a Tantivy error.
    pub(crate) fn write(source: &tantivy::TantivyError) -> Self {
        Self::Write(source.to_string())
    }

    /// Creates a `Commit` error from a Tantivy error.
    pub(crate) fn commit(source: &tantivy::TantivyError) -> Self {
        Self::Commit(source.to_string())
    }

    /// Creates a `Search` error from a Tantivy error.
    pub(crate) fn search(source: &tantivy::TantivyError) -> Self {
        Self::Search(source.to_string())
    }

    /// Classifies the error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::OutOfOrderUpdate { .. } | Self::AlreadyExists { .. } => ErrorCategory::Conflict,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::PathEscape { .. }
            | Self::InvalidName { .. }
            | Self::Query { .. }
            | Self::Sort { .. }
            | Self::InvalidAnalyzer(_)
            | Self::InvalidDefinition(_)
            | Self::UnsupportedEngine { .. } => ErrorCategory::BadRequest,
            Self::AcquireTimeout { .. } => ErrorCategory::Unavailable,
            Self::Closed { .. }
            | Self::OpenIndex { .. }
            | Self::Write(_)
            | Self::Commit(_)
            | Self::Search(_)
            | Self::Io(_)
            | Self::DefinitionFile { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns true if repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Unavailable
    }
}
