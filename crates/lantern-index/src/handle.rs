//! Per-index handles.
//!
//! An [`IndexHandle`] wraps one open engine and enforces two locks:
//!
//! - the update lock, owned by the handle's sequencer, serializes mutations
//!   and orders them by sequence number;
//! - the close lock, a read-write lock around the engine slot. Every operation
//!   holds it shared; [`IndexHandle::close`] holds it exclusively, so the engine
//!   is never released under a running operation.
//!
//! Operations take the close lock with `read_recursive`, which lets a thread
//! that already holds an [`IndexLease`] re-enter while a close is queued. A
//! new lease uses the fair `read_arc`, so once a close is waiting no further
//! leases are granted until it completes; [`IndexHandle::try_lease`] refuses
//! instead of waiting.
//!
//! Lock order: update lock, then close lock. Close never takes the update
//! lock.

use std::{
    fmt,
    ops::Deref,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU8, Ordering},
    },
};

use parking_lot::{RawRwLock, RwLock, lock_api::ArcRwLockReadGuard};
use tracing::{debug, info};

use crate::{
    DocumentDeleteRequest, DocumentUpdateRequest, Engine, IndexDefinition, IndexError, IndexInfo,
    IndexPaths, SearchRequest, SearchResults, sequence::Sequencer,
};

/// Lifecycle of a handle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Serving operations.
    Open,
    /// A close has begun and is waiting for, or running under, the close lock.
    Closing,
    /// The engine has been released.
    Closed,
}

impl LifecycleState {
    /// Decodes the atomic representation.
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Open,
            1 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// Engine slot guarded by the close lock. `None` once closed.
struct Slot<E> {
    /// The open engine.
    engine: Option<E>,
}

/// A shared, open index.
pub struct IndexHandle<E: Engine> {
    /// Index name.
    name: String,
    /// Filesystem locations.
    paths: IndexPaths,
    /// Update lock and sequence.
    sequencer: Sequencer,
    /// Close lock around the engine.
    slot: Arc<RwLock<Slot<E>>>,
    /// Current [`LifecycleState`].
    state: AtomicU8,
    /// When set, close deletes the index instead of committing it.
    delete_on_close: AtomicBool,
}

impl<E: Engine> fmt::Debug for IndexHandle<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexHandle")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("update_seq", &self.sequencer.published())
            .finish()
    }
}

impl<E: Engine> IndexHandle<E> {
    /// Wraps an open engine. The sequence starts at the engine's committed
    /// sequence.
    pub fn new(name: impl Into<String>, paths: IndexPaths, engine: E) -> Self {
        Self {
            name: name.into(),
            paths,
            sequencer: Sequencer::new(engine.committed_seq()),
            slot: Arc::new(RwLock::new(Slot {
                engine: Some(engine),
            })),
            state: AtomicU8::new(LifecycleState::Open as u8),
            delete_on_close: AtomicBool::new(false),
        }
    }

    /// Index name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Filesystem locations of the index.
    pub fn paths(&self) -> &IndexPaths {
        &self.paths
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// True once the engine has been released.
    pub fn is_closed(&self) -> bool {
        self.state() == LifecycleState::Closed
    }

    /// Most recently applied update sequence.
    pub fn update_seq(&self) -> u64 {
        self.sequencer.current()
    }

    /// Update sequence and document count.
    pub fn info(&self) -> Result<IndexInfo, IndexError> {
        let update_seq = self.sequencer.current();
        let num_docs = self.with_engine(|engine| engine.num_docs())?;
        Ok(IndexInfo {
            update_seq,
            num_docs,
        })
    }

    /// Inserts or replaces `doc_id` at `request.seq`.
    pub fn update(&self, doc_id: &str, request: &DocumentUpdateRequest) -> Result<(), IndexError> {
        let permit = self.sequencer.begin(request.seq)?;
        self.with_engine(|engine| {
            engine.apply_update(&permit, doc_id, request)?;
            permit.advance();
            Ok(())
        })
    }

    /// Removes `doc_id` at `request.seq`.
    pub fn delete(&self, doc_id: &str, request: &DocumentDeleteRequest) -> Result<(), IndexError> {
        let permit = self.sequencer.begin(request.seq)?;
        self.with_engine(|engine| {
            engine.apply_delete(&permit, doc_id)?;
            permit.advance();
            Ok(())
        })
    }

    /// Runs a search. Searches run concurrently with each other and with
    /// mutations.
    pub fn search(&self, request: &SearchRequest) -> Result<SearchResults, IndexError> {
        self.with_engine(|engine| engine.search(request))
    }

    /// Commits pending changes with the current sequence.
    ///
    /// Returns `false` when there was nothing to commit.
    pub fn commit(&self) -> Result<bool, IndexError> {
        let update_seq = self.sequencer.current();
        self.with_engine(|engine| engine.commit(update_seq))
    }

    /// Marks the index for deletion when it is closed.
    pub fn set_delete_on_close(&self) {
        self.delete_on_close.store(true, Ordering::Release);
    }

    /// True if the index will be deleted when closed.
    pub fn is_delete_on_close(&self) -> bool {
        self.delete_on_close.load(Ordering::Acquire)
    }

    /// Releases the engine.
    ///
    /// Waits for running operations and outstanding leases. Unless marked for
    /// deletion, pending changes are committed first; a marked index has its
    /// storage, definition and empty parent directories removed instead.
    /// Closing a closed handle does nothing.
    pub fn close(&self) -> Result<(), IndexError> {
        self.state
            .fetch_max(LifecycleState::Closing as u8, Ordering::AcqRel);

        let mut slot = self.slot.write();
        let Some(engine) = slot.engine.take() else {
            return Ok(());
        };
        let result = self.release(engine);
        self.state
            .store(LifecycleState::Closed as u8, Ordering::Release);
        result
    }

    /// Grants a lease that keeps the handle open until dropped.
    ///
    /// Blocks while a close is waiting or running. The lease may observe a
    /// closed handle; check [`IndexLease::is_closed`].
    pub fn lease(self: &Arc<Self>) -> IndexLease<E> {
        IndexLease {
            guard: self.slot.read_arc(),
            handle: Arc::clone(self),
        }
    }

    /// Grants a lease unless a close is waiting or running.
    ///
    /// Never blocks, so a caller that already holds a lease on this handle
    /// cannot deadlock against a queued close.
    pub fn try_lease(self: &Arc<Self>) -> Option<IndexLease<E>> {
        Some(IndexLease {
            guard: self.slot.try_read_arc()?,
            handle: Arc::clone(self),
        })
    }

    /// Runs `f` against the engine while holding the close lock shared.
    fn with_engine<T>(
        &self,
        f: impl FnOnce(&E) -> Result<T, IndexError>,
    ) -> Result<T, IndexError> {
        let slot = self.slot.read_recursive();
        match &slot.engine {
            Some(engine) => f(engine),
            None => Err(IndexError::Closed {
                name: self.name.clone(),
            }),
        }
    }

    /// Commits and closes the engine, or deletes the index when marked.
    ///
    /// Runs under the exclusive close lock, so it must not touch the update
    /// lock: a mutator holding it may be waiting for the close lock.
    fn release(&self, engine: E) -> Result<(), IndexError> {
        if self.is_delete_on_close() {
            engine.close(true)?;
            IndexDefinition::remove(&self.paths.definition)?;
            self.paths.prune_empty_dirs()?;
            info!(index = %self.name, "deleted index");
            return Ok(());
        }

        let update_seq = self.sequencer.published();
        let committed = engine.commit(update_seq);
        let closed = engine.close(false);
        let committed = committed?;
        closed?;
        debug!(index = %self.name, update_seq, committed, "closed index");
        Ok(())
    }
}

/// Shared hold on an [`IndexHandle`] that defers any close until dropped.
///
/// Dereferences to the handle, so operations can be called directly on the
/// lease.
pub struct IndexLease<E: Engine> {
    /// Shared close lock, held for the lease's lifetime.
    guard: ArcRwLockReadGuard<RawRwLock, Slot<E>>,
    /// The leased handle.
    handle: Arc<IndexHandle<E>>,
}

impl<E: Engine> IndexLease<E> {
    /// The leased handle.
    pub fn handle(&self) -> &Arc<IndexHandle<E>> {
        &self.handle
    }

    /// True if the handle was closed before the lease was granted.
    pub fn is_closed(&self) -> bool {
        self.guard.engine.is_none()
    }
}

impl<E: Engine> Deref for IndexLease<E> {
    type Target = IndexHandle<E>;

    fn deref(&self) -> &IndexHandle<E> {
        &self.handle
    }
}

impl<E: Engine> fmt::Debug for IndexLease<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexLease")
            .field("handle", &self.handle)
            .field("closed", &self.is_closed())
            .finish()
    }
}
