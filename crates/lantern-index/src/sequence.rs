//! Per-index update sequence tracking.
//!
//! Every mutation carries a caller-supplied sequence number. The [`Sequencer`]
//! holds the most recently applied one and serializes mutators: a mutation
//! first obtains a [`SequencePermit`], which holds the write half of the update
//! lock for as long as it lives. The permit is the only way to reach the engine's
//! mutation methods, so a sequence check can never be separated from the write
//! it guards.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{RwLock, RwLockWriteGuard};

use crate::IndexError;

/// Monotonic update sequence guarded by the update lock.
#[derive(Debug, Default)]
pub struct Sequencer {
    /// The update lock. Writers are mutations; readers observe the sequence.
    lock: RwLock<()>,
    /// Most recently applied sequence. Only stored while `lock` is held for writing.
    value: AtomicU64,
}

impl Sequencer {
    /// Creates a sequencer starting at `initial`.
    pub fn new(initial: u64) -> Self {
        Self {
            lock: RwLock::new(()),
            value: AtomicU64::new(initial),
        }
    }

    /// Returns the most recently applied sequence.
    ///
    /// Waits for an in-flight mutation to finish first.
    pub fn current(&self) -> u64 {
        let _read = self.lock.read();
        self.value.load(Ordering::Acquire)
    }

    /// Returns the last published sequence without taking the update lock.
    ///
    /// Used while the close lock is held exclusively, where waiting on a
    /// mutator (which itself waits on the close lock) would deadlock.
    pub(crate) fn published(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }

    /// Begins a mutation at sequence `seq`.
    ///
    /// Takes the update lock exclusively and fails with
    /// [`IndexError::OutOfOrderUpdate`] unless `seq` is strictly greater than the
    /// current sequence. On failure the lock is released immediately.
    pub fn begin(&self, seq: u64) -> Result<SequencePermit<'_>, IndexError> {
        let guard = self.lock.write();
        let current = self.value.load(Ordering::Acquire);
        if seq <= current {
            return Err(IndexError::OutOfOrderUpdate {
                current,
                attempted: seq,
            });
        }
        Ok(SequencePermit {
            _guard: guard,
            value: &self.value,
            previous: current,
            next: seq,
        })
    }
}

/// Proof that the holder owns the update lock and has passed the sequence check.
///
/// Dropping a permit without calling [`advance`](Self::advance) leaves the
/// sequence unchanged.
///
/// Only an [`IndexHandle`](crate::IndexHandle) issues permits, for its own
/// update lock. Code outside the crate can receive one in
/// [`Engine`](crate::Engine) methods but cannot create one:
///
/// ```compile_fail
/// let sequencer = lantern_index::Sequencer::new(0);
/// let permit = sequencer.begin(1);
/// ```
#[derive(Debug)]
pub struct SequencePermit<'a> {
    /// Write half of the update lock, held until the permit is dropped.
    _guard: RwLockWriteGuard<'a, ()>,
    /// The sequencer's value.
    value: &'a AtomicU64,
    /// Sequence applied before this mutation.
    previous: u64,
    /// Sequence this mutation will publish.
    next: u64,
}

impl SequencePermit<'_> {
    /// Sequence of the mutation this permit guards.
    pub fn seq(&self) -> u64 {
        self.next
    }

    /// Sequence applied before this mutation.
    pub fn previous(&self) -> u64 {
        self.previous
    }

    /// Publishes the new sequence and releases the update lock.
    pub fn advance(self) {
        self.value.store(self.next, Ordering::Release);
    }
}
