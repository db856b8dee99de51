//! The public face of the index subsystem.
//!
//! [`IndexManager`] ties the path resolver, the definition store and the
//! handle cache together. Callers create indexes, acquire leases to operate on
//! them, and delete whole subtrees of indexes.

use std::path::Path;

use tracing::{error, info};

use crate::{
    CacheConfig, CacheStats, EngineFactory, HandleCache, IndexDefinition, IndexError, IndexLease,
    PathResolver, discovery::find_index_dirs,
};

/// Creates, opens and deletes indexes under one root directory.
pub struct IndexManager<F: EngineFactory> {
    /// Maps names to paths under the root.
    resolver: PathResolver,
    /// Open handles.
    cache: HandleCache<F>,
}

impl<F: EngineFactory> IndexManager<F> {
    /// Creates a manager for indexes under `root` and starts its cache.
    pub fn new(config: CacheConfig, root: impl AsRef<Path>, factory: F) -> Result<Self, IndexError> {
        let resolver = PathResolver::new(root);
        let cache = HandleCache::new(config, resolver.clone(), factory)?;
        Ok(Self { resolver, cache })
    }

    /// Root directory of every index.
    pub fn root(&self) -> &Path {
        self.resolver.root()
    }

    /// The underlying handle cache.
    pub fn cache(&self) -> &HandleCache<F> {
        &self.cache
    }

    /// Returns a lease on the open index `name`, opening it if needed.
    pub fn acquire(&self, name: &str) -> Result<IndexLease<F::Engine>, IndexError> {
        self.cache.acquire(name)
    }

    /// Gives back a lease obtained from [`acquire`](Self::acquire).
    pub fn release(&self, lease: IndexLease<F::Engine>) {
        drop(lease);
    }

    /// Persists the definition of a new index.
    ///
    /// The definition is validated by the engine first. The index is not
    /// opened; the first [`acquire`](Self::acquire) does that.
    pub fn create(&self, name: &str, definition: &IndexDefinition) -> Result<(), IndexError> {
        self.cache.factory().validate(definition)?;
        let paths = self.resolver.index_paths(name)?;
        definition.save_new(&paths.definition, name)?;
        info!(index = name, analyzer = %definition.default_analyzer, "created index");
        Ok(())
    }

    /// True if an index named `name` has been created.
    pub fn exists(&self, name: &str) -> Result<bool, IndexError> {
        Ok(self.resolver.index_paths(name)?.definition.is_file())
    }

    /// Reads the persisted definition of `name`.
    pub fn definition(&self, name: &str) -> Result<IndexDefinition, IndexError> {
        let paths = self.resolver.index_paths(name)?;
        IndexDefinition::load(&paths.definition, name)
    }

    /// Names of every index at or below `prefix`, sorted. An empty prefix
    /// lists everything.
    pub fn list(&self, prefix: &str) -> Result<Vec<String>, IndexError> {
        let dir = self.resolver.resolve(prefix)?;
        let mut names: Vec<String> = find_index_dirs(&dir)
            .iter()
            .filter_map(|dir| self.resolver.name_of(dir))
            .collect();
        names.sort();
        Ok(names)
    }

    /// Deletes every index at or below `prefix`.
    ///
    /// Each index is marked for deletion and dropped from the cache; it is
    /// removed from disk once every outstanding lease on it is released. This
    /// call waits for that. An index that fails to open is logged and skipped.
    /// A prefix with nothing under it is not an error. Returns the names that
    /// were deleted.
    pub fn delete_all(&self, prefix: &str) -> Result<Vec<String>, IndexError> {
        let dir = self.resolver.resolve(prefix)?;
        let mut deleted = Vec::new();
        for index_dir in find_index_dirs(&dir) {
            let Some(name) = self.resolver.name_of(&index_dir) else {
                continue;
            };
            let lease = match self.cache.acquire(&name) {
                Ok(lease) => lease,
                Err(e) => {
                    error!(index = %name, error = %e, "failed to delete index");
                    continue;
                }
            };
            lease.set_delete_on_close();
            self.cache.invalidate(&name);
            self.release(lease);
            self.cache.drain(&name);
            info!(index = %name, "deleting index");
            deleted.push(name);
        }
        Ok(deleted)
    }

    /// Cache activity counters.
    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Commits and closes every open index and stops background work.
    pub fn shutdown(&self) {
        self.cache.shutdown();
    }
}
