//! Test helpers shared across lantern-index unit tests.
//!
//! [`MemoryFactory`] opens [`MemoryEngine`]s that keep documents in memory and
//! "persist" commits in state shared by every engine the factory opened, so a
//! reopened engine sees the last committed sequence. The shared state also
//! records lifecycle events the concurrency tests assert on.

use std::{
    collections::{BTreeMap, HashMap},
    fs, io,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use parking_lot::Mutex;

use crate::{
    DocField, DocumentUpdateRequest, Engine, EngineFactory, IndexDefinition, IndexError, SearchHit,
    SearchRequest, SearchResults, analyzer, sequence::SequencePermit,
};

/// Committed state of one storage path.
#[derive(Debug, Clone, Default)]
struct Persisted {
    /// Sequence recorded by the last commit.
    seq: u64,
    /// Documents as of the last commit.
    docs: BTreeMap<String, DocumentUpdateRequest>,
}

/// State shared by a factory and every engine it opened.
#[derive(Debug, Default)]
struct Shared {
    /// Committed state by storage path.
    persisted: Mutex<HashMap<PathBuf, Persisted>>,
    /// Number of engines currently open per storage path.
    live: Mutex<HashMap<PathBuf, usize>>,
    /// Sequences of applied mutations, in application order.
    applied: Mutex<Vec<u64>>,
    /// Successful opens.
    opens: AtomicUsize,
    /// Closes, including deleting ones.
    closes: AtomicUsize,
    /// Deleting closes.
    deletes: AtomicUsize,
    /// Commits that persisted changes.
    commits: AtomicUsize,
    /// Searches currently executing.
    searching: AtomicUsize,
    /// Updates currently executing.
    updating: AtomicUsize,
    /// Milliseconds every update sleeps before applying.
    update_delay_ms: AtomicU64,
    /// Set when a path was open in two engines at once.
    double_open: AtomicBool,
    /// Set when an engine was closed during a search.
    closed_during_search: AtomicBool,
    /// Set when an engine was closed during an update.
    closed_during_update: AtomicBool,
    /// Makes commits of pending changes fail.
    fail_commits: AtomicBool,
    /// Makes every open fail.
    fail_opens: AtomicBool,
}

/// Factory for in-memory engines.
#[derive(Debug, Clone, Default)]
pub struct MemoryFactory {
    /// State shared with opened engines.
    shared: Arc<Shared>,
}

impl MemoryFactory {
    /// Number of successful opens.
    pub fn opens(&self) -> usize {
        self.shared.opens.load(Ordering::SeqCst)
    }

    /// Number of closes.
    pub fn closes(&self) -> usize {
        self.shared.closes.load(Ordering::SeqCst)
    }

    /// Number of closes that deleted storage.
    pub fn deletes(&self) -> usize {
        self.shared.deletes.load(Ordering::SeqCst)
    }

    /// Number of commits that persisted changes.
    pub fn commits(&self) -> usize {
        self.shared.commits.load(Ordering::SeqCst)
    }

    /// Number of engines currently open.
    pub fn live(&self) -> usize {
        self.shared.live.lock().values().sum()
    }

    /// Number of searches currently executing.
    pub fn searching(&self) -> usize {
        self.shared.searching.load(Ordering::SeqCst)
    }

    /// Number of updates currently executing.
    pub fn updating(&self) -> usize {
        self.shared.updating.load(Ordering::SeqCst)
    }

    /// Sequences of every applied mutation, in order.
    pub fn applied(&self) -> Vec<u64> {
        self.shared.applied.lock().clone()
    }

    /// Sequence committed for `path`, if any commit happened.
    pub fn committed_seq(&self, path: &Path) -> Option<u64> {
        self.shared.persisted.lock().get(path).map(|p| p.seq)
    }

    /// True if some path was ever open in two engines at once.
    pub fn saw_double_open(&self) -> bool {
        self.shared.double_open.load(Ordering::SeqCst)
    }

    /// True if some engine was closed while a search was executing.
    pub fn saw_close_during_search(&self) -> bool {
        self.shared.closed_during_search.load(Ordering::SeqCst)
    }

    /// True if some engine was closed while an update was executing.
    pub fn saw_close_during_update(&self) -> bool {
        self.shared.closed_during_update.load(Ordering::SeqCst)
    }

    /// Makes every subsequent update sleep for `delay` before applying.
    pub fn delay_updates(&self, delay: Duration) {
        let ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.shared.update_delay_ms.store(ms, Ordering::SeqCst);
    }

    /// Makes subsequent commits of pending changes fail.
    pub fn fail_commits(&self, fail: bool) {
        self.shared.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent opens fail.
    pub fn fail_opens(&self, fail: bool) {
        self.shared.fail_opens.store(fail, Ordering::SeqCst);
    }
}

impl EngineFactory for MemoryFactory {
    type Engine = MemoryEngine;

    fn validate(&self, definition: &IndexDefinition) -> Result<(), IndexError> {
        definition.check_fields()?;
        analyzer::check_definition(definition)
    }

    fn open(&self, path: &Path, definition: &IndexDefinition) -> Result<MemoryEngine, IndexError> {
        self.validate(definition)?;
        if self.shared.fail_opens.load(Ordering::SeqCst) {
            return Err(IndexError::OpenIndex {
                path: path.to_path_buf(),
                message: "injected open failure".into(),
            });
        }
        fs::create_dir_all(path)?;

        {
            let mut live = self.shared.live.lock();
            let count = live.entry(path.to_path_buf()).or_default();
            *count += 1;
            if *count > 1 {
                self.shared.double_open.store(true, Ordering::SeqCst);
            }
        }
        self.shared.opens.fetch_add(1, Ordering::SeqCst);

        let persisted = self
            .shared
            .persisted
            .lock()
            .get(path)
            .cloned()
            .unwrap_or_default();

        Ok(MemoryEngine {
            path: path.to_path_buf(),
            shared: Arc::clone(&self.shared),
            docs: Mutex::new(persisted.docs),
            committed_seq: persisted.seq,
            dirty: AtomicBool::new(false),
        })
    }
}

/// An engine holding documents in a map.
///
/// A query matches documents with a text or string value containing it; `*`
/// matches everything. A query of the form `sleep:<ms>` blocks for that long
/// and matches nothing.
#[derive(Debug)]
pub struct MemoryEngine {
    /// Storage path this engine was opened at.
    path: PathBuf,
    /// State shared with the factory.
    shared: Arc<Shared>,
    /// Current documents, committed or not.
    docs: Mutex<BTreeMap<String, DocumentUpdateRequest>>,
    /// Sequence recovered at open.
    committed_seq: u64,
    /// Set by mutations, cleared by commits.
    dirty: AtomicBool,
}

/// Returns true if any text or string field contains `query`.
fn matches(request: &DocumentUpdateRequest, query: &str) -> bool {
    query == "*"
        || request.fields.iter().any(|field| match field {
            DocField::Text { value, .. } | DocField::String { value, .. } => value.contains(query),
            _ => false,
        })
}

impl Engine for MemoryEngine {
    fn committed_seq(&self) -> u64 {
        self.committed_seq
    }

    fn num_docs(&self) -> Result<u64, IndexError> {
        Ok(self.docs.lock().len() as u64)
    }

    fn apply_update(
        &self,
        permit: &SequencePermit<'_>,
        doc_id: &str,
        request: &DocumentUpdateRequest,
    ) -> Result<(), IndexError> {
        self.shared.updating.fetch_add(1, Ordering::SeqCst);
        let delay = self.shared.update_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            thread::sleep(Duration::from_millis(delay));
        }
        self.docs.lock().insert(doc_id.to_string(), request.clone());
        self.dirty.store(true, Ordering::SeqCst);
        self.shared.applied.lock().push(permit.seq());
        self.shared.updating.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    fn apply_delete(&self, permit: &SequencePermit<'_>, doc_id: &str) -> Result<(), IndexError> {
        self.docs.lock().remove(doc_id);
        self.dirty.store(true, Ordering::SeqCst);
        self.shared.applied.lock().push(permit.seq());
        Ok(())
    }

    fn search(&self, request: &SearchRequest) -> Result<SearchResults, IndexError> {
        self.shared.searching.fetch_add(1, Ordering::SeqCst);
        if let Some(ms) = request.query.strip_prefix("sleep:") {
            let ms = ms.parse().map_err(|_| IndexError::Query {
                query: request.query.clone(),
                message: "bad sleep".into(),
            });
            if let Ok(ms) = ms {
                thread::sleep(Duration::from_millis(ms));
            }
            self.shared.searching.fetch_sub(1, Ordering::SeqCst);
            return ms.map(|_| SearchResults::default());
        }

        let docs = self.docs.lock();
        let matching: Vec<_> = docs
            .iter()
            .filter(|(_, doc)| {
                request.partition.is_none() || doc.partition == request.partition
            })
            .filter(|(_, doc)| matches(doc, &request.query))
            .collect();
        let results = SearchResults {
            total_hits: matching.len(),
            hits: matching
                .into_iter()
                .take(request.limit)
                .map(|(id, _)| SearchHit {
                    id: id.clone(),
                    score: 1.0,
                    fields: Default::default(),
                    order: Vec::new(),
                })
                .collect(),
            ..SearchResults::default()
        };
        self.shared.searching.fetch_sub(1, Ordering::SeqCst);
        Ok(results)
    }

    fn commit(&self, update_seq: u64) -> Result<bool, IndexError> {
        if !self.dirty.swap(false, Ordering::SeqCst) {
            return Ok(false);
        }
        if self.shared.fail_commits.load(Ordering::SeqCst) {
            self.dirty.store(true, Ordering::SeqCst);
            return Err(IndexError::Commit("injected commit failure".into()));
        }
        let docs = self.docs.lock().clone();
        self.shared.persisted.lock().insert(
            self.path.clone(),
            Persisted {
                seq: update_seq,
                docs,
            },
        );
        self.shared.commits.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    fn close(self, delete: bool) -> Result<(), IndexError> {
        if self.shared.searching.load(Ordering::SeqCst) > 0 {
            self.shared
                .closed_during_search
                .store(true, Ordering::SeqCst);
        }
        if self.shared.updating.load(Ordering::SeqCst) > 0 {
            self.shared
                .closed_during_update
                .store(true, Ordering::SeqCst);
        }
        if let Some(count) = self.shared.live.lock().get_mut(&self.path) {
            *count = count.saturating_sub(1);
        }
        self.shared.closes.fetch_add(1, Ordering::SeqCst);

        if delete {
            self.shared.persisted.lock().remove(&self.path);
            match fs::remove_dir_all(&self.path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            self.shared.deletes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// An update request with one text field.
pub fn text_update(seq: u64, value: &str) -> DocumentUpdateRequest {
    DocumentUpdateRequest {
        seq,
        partition: None,
        fields: vec![DocField::Text {
            name: "body".into(),
            value: value.into(),
            store: false,
        }],
    }
}
