//! The engine abstraction.
//!
//! An [`Engine`] is one open index instance: a writer and a reader over a
//! directory. It knows nothing about sequencing, locking or lifecycle; those are
//! the job of [`crate::IndexHandle`], which wraps any engine. An
//! [`EngineFactory`] opens engines from a definition, and [`Engines`] selects a
//! factory by the definition's engine version.

mod columns;
mod facets;
mod ordering;
mod tantivy_engine;

use std::{collections::BTreeMap, path::Path};

pub use tantivy_engine::{TANTIVY_ENGINE_VERSION, TantivyEngine, TantivyFactory};

use crate::{
    DocumentUpdateRequest, IndexDefinition, IndexError, SearchRequest, SearchResults,
    sequence::SequencePermit,
};

/// Operations every index engine provides.
///
/// Mutations take a [`SequencePermit`], which can only be obtained while
/// holding the index's update lock; engines may therefore assume that
/// mutations never run concurrently with each other.
pub trait Engine: Send + Sync + 'static {
    /// Update sequence recovered from durable commit metadata at open.
    fn committed_seq(&self) -> u64;

    /// Number of searchable documents.
    fn num_docs(&self) -> Result<u64, IndexError>;

    /// Inserts or replaces the document `doc_id`.
    fn apply_update(
        &self,
        permit: &SequencePermit<'_>,
        doc_id: &str,
        request: &DocumentUpdateRequest,
    ) -> Result<(), IndexError>;

    /// Removes the document `doc_id`.
    fn apply_delete(&self, permit: &SequencePermit<'_>, doc_id: &str) -> Result<(), IndexError>;

    /// Runs a search.
    fn search(&self, request: &SearchRequest) -> Result<SearchResults, IndexError>;

    /// Durably persists pending changes together with `update_seq`.
    ///
    /// Returns `false` when there was nothing to commit.
    fn commit(&self, update_seq: u64) -> Result<bool, IndexError>;

    /// Releases the engine, deleting its storage when `delete` is set.
    fn close(self, delete: bool) -> Result<(), IndexError>;
}

/// Opens engines for index definitions.
pub trait EngineFactory: Send + Sync + 'static {
    /// Engine type produced by this factory.
    type Engine: Engine;

    /// Checks that a definition can be opened, e.g. that its analyzers exist.
    fn validate(&self, definition: &IndexDefinition) -> Result<(), IndexError>;

    /// Opens or creates the engine storage at `path`.
    fn open(&self, path: &Path, definition: &IndexDefinition) -> Result<Self::Engine, IndexError>;
}

/// Lookup table of factories keyed by engine major version.
#[derive(Debug, Clone)]
pub struct Engines<F> {
    /// Registered factories.
    factories: BTreeMap<u32, F>,
}

impl<F> Default for Engines<F> {
    fn default() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }
}

impl<F: EngineFactory> Engines<F> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` for `version`, replacing any previous registration.
    pub fn register(mut self, version: u32, factory: F) -> Self {
        self.factories.insert(version, factory);
        self
    }

    /// Registered versions in ascending order.
    pub fn versions(&self) -> impl Iterator<Item = u32> + '_ {
        self.factories.keys().copied()
    }

    /// Returns the factory for the definition's engine version.
    fn factory_for(&self, definition: &IndexDefinition) -> Result<&F, IndexError> {
        self.factories
            .get(&definition.engine_version)
            .ok_or(IndexError::UnsupportedEngine {
                version: definition.engine_version,
            })
    }
}

impl Engines<TantivyFactory> {
    /// A table holding the tantivy engine under its version.
    pub fn tantivy() -> Self {
        Self::new().register(TANTIVY_ENGINE_VERSION, TantivyFactory::default())
    }
}

impl<F: EngineFactory> EngineFactory for Engines<F> {
    type Engine = F::Engine;

    fn validate(&self, definition: &IndexDefinition) -> Result<(), IndexError> {
        self.factory_for(definition)?.validate(definition)
    }

    fn open(&self, path: &Path, definition: &IndexDefinition) -> Result<Self::Engine, IndexError> {
        self.factory_for(definition)?.open(path, definition)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_support::MemoryFactory;

    #[test]
    fn dispatches_by_version() {
        let engines = Engines::new().register(1, MemoryFactory::default());
        assert!(engines.validate(&IndexDefinition::new("standard")).is_ok());
        assert_eq!(engines.versions().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn unknown_version_is_unsupported() {
        let engines = Engines::new().register(1, MemoryFactory::default());
        let mut definition = IndexDefinition::new("standard");
        definition.engine_version = 7;

        let err = engines.validate(&definition).unwrap_err();
        assert!(matches!(err, IndexError::UnsupportedEngine { version: 7 }));
    }
}
