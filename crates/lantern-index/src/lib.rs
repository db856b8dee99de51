//! Index handles, handle cache and Tantivy engine for lantern.
//!
//! This crate owns the lifecycle of many independent full-text indexes stored
//! under one root directory. It handles:
//! - Ordered, sequence-checked mutations per index
//! - Safe concurrent search and exclusive close of each open index
//! - A bounded cache that opens, commits, evicts and reopens index handles
//! - Index definitions persisted beside each index
//! - Name-to-path resolution that never leaves the root
//!
//! # Example
//!
//! ```no_run
//! use lantern_index::{
//!     CacheConfig, DocField, DocumentUpdateRequest, Engines, IndexDefinition, IndexManager,
//!     SearchRequest,
//! };
//!
//! let manager =
//!     IndexManager::new(CacheConfig::default(), "./indexes", Engines::tantivy()).unwrap();
//! manager.create("books", &IndexDefinition::new("english")).unwrap();
//!
//! let lease = manager.acquire("books").unwrap();
//! let request = DocumentUpdateRequest {
//!     seq: 1,
//!     partition: None,
//!     fields: vec![DocField::Text {
//!         name: "title".to_string(),
//!         value: "The Rust Programming Language".to_string(),
//!         store: true,
//!     }],
//! };
//! lease.update("trpl", &request).unwrap();
//! lease.commit().unwrap();
//!
//! let results = lease.search(&SearchRequest::new("rust")).unwrap();
//! assert_eq!(results.total_hits, 1);
//! manager.release(lease);
//! manager.shutdown();
//! ```

#![warn(missing_docs)]

pub mod analyzer;
mod cache;
mod definition;
mod discovery;
mod document;
mod engine;
mod error;
mod handle;
mod location;
mod manager;
mod schema;
mod sequence;
#[cfg(test)]
mod test_support;

pub use cache::{AcquireRetry, CacheConfig, CacheStats, HandleCache};
pub use definition::{DEFAULT_ENGINE_VERSION, IndexDefinition};
pub use discovery::{MAX_DEPTH, find_index_dirs};
pub use document::{
    DEFAULT_SEARCH_LIMIT, DEFAULT_TOP_N, DocField, DocumentDeleteRequest, DocumentUpdateRequest,
    DoubleRange, FacetCounts, IndexInfo, SearchHit, SearchRequest, SearchResults, SortField,
    SortKind, SortValue,
};
pub use engine::{
    Engine, EngineFactory, Engines, TANTIVY_ENGINE_VERSION, TantivyEngine, TantivyFactory,
};
pub use error::{ErrorCategory, IndexError};
pub use handle::{IndexHandle, IndexLease, LifecycleState};
pub use location::{DEFINITION_FILENAME, IndexPaths, PathResolver, STORAGE_DIR};
pub use manager::IndexManager;
pub use schema::{IndexSchema, names as field_names};
pub use sequence::SequencePermit;
