//! Bounded cache of open index handles.
//!
//! The cache owns the mapping from index name to [`IndexHandle`]. It opens
//! handles on demand, keeps them committed, and closes them when they fall out
//! of the size or idle bounds.
//!
//! A background worker thread runs the commit schedule and the idle sweep.
//! Handles removed from the cache are closed on short-lived threads; until that
//! close completes the handle stays parked in a `closing` table. A load of a
//! name with a parked handle opens nothing and reports the name as busy, and
//! [`HandleCache::acquire`] sleeps and retries within its [`AcquireRetry`]
//! bound. This keeps at most one open engine per index even while an eviction
//! is still draining, and a caller whose own lease holds up that close gets
//! [`IndexError::AcquireTimeout`] instead of a deadlock.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
        mpsc::{self, RecvTimeoutError, Sender},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::{
    EngineFactory, IndexDefinition, IndexError, IndexHandle, IndexLease, IndexPaths,
    LifecycleState, PathResolver,
};

/// Lower bound of the background sweep interval.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

/// Upper bound of the background sweep interval.
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Handle type produced by a factory.
type Handle<F> = IndexHandle<<F as EngineFactory>::Engine>;

/// Retry policy for [`HandleCache::acquire`] when it races a close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquireRetry {
    /// Number of attempts before giving up.
    pub attempts: u32,
    /// Sleep between attempts.
    pub backoff: Duration,
}

impl Default for AcquireRetry {
    fn default() -> Self {
        Self {
            attempts: 500,
            backoff: Duration::from_millis(5),
        }
    }
}

/// Cache bounds and schedules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of open handles.
    pub max_indexes_open: usize,
    /// Time after which an open handle is committed.
    pub commit_interval: Duration,
    /// A handle neither accessed nor written for this long is closed.
    pub idle: Duration,
    /// Retry policy for acquire.
    pub acquire: AcquireRetry,
    /// How often the worker looks for idle or commit-due handles.
    pub sweep_interval: Duration,
}

impl CacheConfig {
    /// Creates a config with the default retry policy and a derived sweep
    /// interval.
    pub fn new(max_indexes_open: usize, commit_interval: Duration, idle: Duration) -> Self {
        Self {
            max_indexes_open,
            commit_interval,
            idle,
            acquire: AcquireRetry::default(),
            sweep_interval: sweep_interval_for(commit_interval, idle),
        }
    }

    /// Replaces the retry policy.
    pub fn with_acquire(mut self, acquire: AcquireRetry) -> Self {
        self.acquire = acquire;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new(100, Duration::from_secs(30), Duration::from_secs(300))
    }
}

impl From<&lantern_config::Config> for CacheConfig {
    fn from(config: &lantern_config::Config) -> Self {
        let max_indexes_open = usize::try_from(config.max_indexes_open).unwrap_or(usize::MAX);
        Self::new(max_indexes_open, config.commit_interval(), config.idle()).with_acquire(
            AcquireRetry {
                attempts: u32::try_from(config.acquire.attempts).unwrap_or(u32::MAX),
                backoff: Duration::from_millis(config.acquire.backoff_ms),
            },
        )
    }
}

/// A quarter of the shorter schedule, clamped to a sane range.
fn sweep_interval_for(commit_interval: Duration, idle: Duration) -> Duration {
    (commit_interval.min(idle) / 4).clamp(MIN_SWEEP_INTERVAL, MAX_SWEEP_INTERVAL)
}

/// Snapshot of cache activity counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups served by a cached handle.
    pub hits: u64,
    /// Lookups that had to load.
    pub misses: u64,
    /// Handles opened.
    pub loads: u64,
    /// Failed opens.
    pub load_failures: u64,
    /// Handles removed by the size or idle bound.
    pub evictions: u64,
    /// Scheduled commits that wrote data.
    pub commits: u64,
    /// Handles reopened after a failed commit.
    pub reopens: u64,
}

/// Live counters behind [`CacheStats`].
#[derive(Debug, Default)]
struct Counters {
    /// See [`CacheStats::hits`].
    hits: AtomicU64,
    /// See [`CacheStats::misses`].
    misses: AtomicU64,
    /// See [`CacheStats::loads`].
    loads: AtomicU64,
    /// See [`CacheStats::load_failures`].
    load_failures: AtomicU64,
    /// See [`CacheStats::evictions`].
    evictions: AtomicU64,
    /// See [`CacheStats::commits`].
    commits: AtomicU64,
    /// See [`CacheStats::reopens`].
    reopens: AtomicU64,
}

impl Counters {
    /// Increments one counter.
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Reads every counter.
    fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            load_failures: self.load_failures.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            reopens: self.reopens.load(Ordering::Relaxed),
        }
    }
}

/// One cached handle with its schedule bookkeeping.
struct Entry<F: EngineFactory> {
    /// The cached handle.
    handle: Arc<Handle<F>>,
    /// Last lookup.
    last_access: Instant,
    /// Last load or commit that wrote data.
    last_write: Instant,
    /// Last scheduled commit attempt.
    last_commit: Instant,
    /// A refresh is queued or running.
    refreshing: bool,
}

impl<F: EngineFactory> Entry<F> {
    /// A fresh entry for a just-loaded handle.
    fn new(handle: Arc<Handle<F>>) -> Self {
        let now = Instant::now();
        Self {
            handle,
            last_access: now,
            last_write: now,
            last_commit: now,
            refreshing: false,
        }
    }
}

/// Messages to the maintenance worker.
enum Task<F: EngineFactory> {
    /// Commit one index.
    Refresh(String),
    /// Close a parked handle that no closer thread could be spawned for.
    Close(Arc<Handle<F>>),
    /// Stop the worker.
    Shutdown,
}

/// State shared by the cache, its worker and its closer threads.
struct Inner<F: EngineFactory> {
    /// Bounds and schedules.
    config: CacheConfig,
    /// Opens engines.
    factory: F,
    /// Maps names to paths.
    resolver: PathResolver,
    /// Cached handles by name.
    entries: Mutex<HashMap<String, Entry<F>>>,
    /// Per-name locks serializing loads of one name.
    load_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    /// Removed handles whose close has not completed, by name.
    closing: Mutex<HashMap<String, Vec<Arc<Handle<F>>>>>,
    /// Outstanding closer threads.
    closers: Mutex<Vec<JoinHandle<()>>>,
    /// Queue to the worker. `None` after shutdown.
    tasks: Mutex<Option<Sender<Task<F>>>>,
    /// Activity counters.
    counters: Counters,
}

/// Bounded, self-maintaining cache of open index handles.
pub struct HandleCache<F: EngineFactory> {
    /// Shared state.
    inner: Arc<Inner<F>>,
    /// The maintenance worker. `None` after shutdown.
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<F: EngineFactory> HandleCache<F> {
    /// Creates a cache and starts its maintenance worker.
    pub fn new(config: CacheConfig, resolver: PathResolver, factory: F) -> Result<Self, IndexError> {
        let (sender, receiver) = mpsc::channel();
        let sweep_interval = config.sweep_interval;
        let inner = Arc::new(Inner {
            config,
            factory,
            resolver,
            entries: Mutex::new(HashMap::new()),
            load_locks: Mutex::new(HashMap::new()),
            closing: Mutex::new(HashMap::new()),
            closers: Mutex::new(Vec::new()),
            tasks: Mutex::new(Some(sender)),
            counters: Counters::default(),
        });

        let worker_inner = Arc::clone(&inner);
        let worker = thread::Builder::new()
            .name("lantern-cache".into())
            .spawn(move || {
                let mut last_sweep = Instant::now();
                loop {
                    match receiver.recv_timeout(sweep_interval) {
                        Ok(Task::Refresh(name)) => worker_inner.refresh(&name),
                        Ok(Task::Close(handle)) => worker_inner.close_parked(&handle),
                        Ok(Task::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {}
                    }
                    if last_sweep.elapsed() >= sweep_interval {
                        worker_inner.sweep();
                        last_sweep = Instant::now();
                    }
                }
                debug!("cache worker stopped");
            })?;

        Ok(Self {
            inner,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// The configuration the cache runs with.
    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// The engine factory.
    pub fn factory(&self) -> &F {
        &self.inner.factory
    }

    /// Returns the handle for `name`, opening it if needed.
    ///
    /// Waits out a close of an earlier handle for `name` within the retry
    /// bound. The handle may be closed by the time the caller uses it; prefer
    /// [`acquire`](Self::acquire).
    pub fn get(&self, name: &str) -> Result<Arc<Handle<F>>, IndexError> {
        let retry = self.inner.config.acquire;
        for attempt in 1..=retry.attempts {
            if let Some(handle) = self.inner.get(name)? {
                return Ok(handle);
            }
            debug!(index = name, attempt, "index is still closing, retrying");
            thread::sleep(retry.backoff);
        }
        Err(IndexError::AcquireTimeout {
            name: name.to_string(),
            attempts: retry.attempts,
        })
    }

    /// Returns a lease on a live handle for `name`.
    ///
    /// If the cached handle turns out to be closed by a concurrent eviction,
    /// or an earlier handle for `name` is still closing, sleeps and retries up
    /// to the configured limit, then fails with [`IndexError::AcquireTimeout`].
    pub fn acquire(&self, name: &str) -> Result<IndexLease<F::Engine>, IndexError> {
        let retry = self.inner.config.acquire;
        for attempt in 1..=retry.attempts {
            match self.inner.get(name)?.map(|handle| handle.try_lease()) {
                Some(Some(lease)) if !lease.is_closed() => return Ok(lease),
                Some(_) => debug!(index = name, attempt, "handle is closing, retrying"),
                None => debug!(index = name, attempt, "index is still closing, retrying"),
            }
            thread::sleep(retry.backoff);
        }
        Err(IndexError::AcquireTimeout {
            name: name.to_string(),
            attempts: retry.attempts,
        })
    }

    /// Removes `name` from the cache and closes its handle in the background.
    ///
    /// Safe to call while holding a lease on the handle; the close waits for
    /// the lease to be dropped.
    pub fn invalidate(&self, name: &str) {
        let removed = self.inner.entries.lock().remove(name).map(|entry| {
            self.inner.park(&entry.handle);
            entry.handle
        });
        if let Some(handle) = removed {
            debug!(index = name, cause = "invalidated", "removing index from cache");
            self.inner.schedule_close(handle);
        }
    }

    /// Closes any removed handles for `name` that are still draining, waiting
    /// for each close to finish.
    pub fn drain(&self, name: &str) {
        self.inner.drain_closing(name);
    }

    /// True if a handle for `name` is cached.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.entries.lock().contains_key(name)
    }

    /// Number of cached handles.
    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    /// True if no handle is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the activity counters.
    pub fn stats(&self) -> CacheStats {
        self.inner.counters.snapshot()
    }

    /// Waits for every background close started so far.
    pub fn wait_for_closes(&self) {
        let closers: Vec<_> = self.inner.closers.lock().drain(..).collect();
        for closer in closers {
            if closer.join().is_err() {
                error!("index closer thread panicked");
            }
        }
    }

    /// Stops the worker and closes every handle, committing pending changes.
    ///
    /// The cache remains usable afterwards, but nothing commits or evicts in
    /// the background any more. Called on drop.
    pub fn shutdown(&self) {
        if let Some(sender) = self.inner.tasks.lock().take()
            && sender.send(Task::Shutdown).is_err()
        {
            debug!("cache worker already stopped");
        }
        if let Some(worker) = self.worker.lock().take()
            && worker.join().is_err()
        {
            error!("cache worker panicked");
        }

        let handles: Vec<_> = self
            .inner
            .entries
            .lock()
            .drain()
            .map(|(_, entry)| entry.handle)
            .collect();
        let count = handles.len();
        for handle in handles {
            if let Err(e) = handle.close() {
                error!(index = %handle.name(), error = %e, "failed to close index");
            }
        }

        let parked: Vec<_> = self
            .inner
            .closing
            .lock()
            .values()
            .flatten()
            .map(Arc::clone)
            .collect();
        for handle in parked {
            self.inner.close_parked(&handle);
        }
        self.wait_for_closes();
        if count > 0 {
            info!(closed = count, "index cache shut down");
        }
    }
}

impl<F: EngineFactory> Drop for HandleCache<F> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<F: EngineFactory> Inner<F> {
    /// Looks up or loads the handle for `name`.
    ///
    /// Returns `None` while an earlier handle for `name` is still closing.
    fn get(self: &Arc<Self>, name: &str) -> Result<Option<Arc<Handle<F>>>, IndexError> {
        let paths = self.resolver.index_paths(name)?;

        if let Some(handle) = self.lookup(name) {
            Counters::bump(&self.counters.hits);
            return Ok(Some(handle));
        }
        Counters::bump(&self.counters.misses);

        let load_lock = self.load_lock(name);
        let result = {
            let _loading = load_lock.lock();
            match self.lookup(name) {
                Some(handle) => Ok(Some(handle)),
                None => self.load(name, paths).map(|loaded| {
                    if let Some(handle) = &loaded {
                        self.insert(name, Arc::clone(handle));
                    }
                    loaded
                }),
            }
        };
        self.forget_load_lock(name, load_lock);
        result
    }

    /// Returns the cached handle for `name` unless it has begun closing, and
    /// records the access. Queues a refresh when the entry is due for a commit.
    fn lookup(&self, name: &str) -> Option<Arc<Handle<F>>> {
        let mut entries = self.entries.lock();
        let entry = entries.get_mut(name)?;
        if entry.handle.state() != LifecycleState::Open {
            return None;
        }

        let now = Instant::now();
        entry.last_access = now;
        if !entry.refreshing && now.duration_since(entry.last_commit) >= self.config.commit_interval
        {
            entry.refreshing = true;
            self.enqueue(Task::Refresh(name.to_string()));
        }
        Some(Arc::clone(&entry.handle))
    }

    /// Opens `name` from its persisted definition.
    ///
    /// Returns `None` without opening anything while a removed handle for
    /// `name` is still parked: its engine may still be open, and a close that
    /// deletes the index has not yet removed the definition. Must be called
    /// with the name's load lock held.
    fn load(&self, name: &str, paths: IndexPaths) -> Result<Option<Arc<Handle<F>>>, IndexError> {
        if self.closing.lock().contains_key(name) {
            return Ok(None);
        }

        let opened = IndexDefinition::load(&paths.definition, name)
            .and_then(|definition| self.factory.open(&paths.storage, &definition));
        match opened {
            Ok(engine) => {
                Counters::bump(&self.counters.loads);
                let handle = IndexHandle::new(name, paths, engine);
                info!(index = name, update_seq = handle.update_seq(), "opened index");
                Ok(Some(Arc::new(handle)))
            }
            Err(e) => {
                Counters::bump(&self.counters.load_failures);
                Err(e)
            }
        }
    }

    /// Inserts a freshly loaded handle and enforces the size bound.
    fn insert(self: &Arc<Self>, name: &str, handle: Arc<Handle<F>>) {
        let evicted = {
            let mut entries = self.entries.lock();
            // Any entry replaced here holds a closed handle.
            entries.insert(name.to_string(), Entry::new(handle));

            let mut evicted = Vec::new();
            while entries.len() > self.config.max_indexes_open {
                let victim = entries
                    .iter()
                    .filter(|(key, _)| key.as_str() != name)
                    .min_by_key(|(_, entry)| entry.last_access)
                    .map(|(key, _)| key.clone());
                let Some(victim) = victim else { break };
                if let Some(entry) = entries.remove(&victim) {
                    self.park(&entry.handle);
                    evicted.push(entry.handle);
                }
            }
            evicted
        };

        for handle in evicted {
            Counters::bump(&self.counters.evictions);
            debug!(index = %handle.name(), cause = "size", "evicting index");
            self.schedule_close(handle);
        }
    }

    /// Commits `name`, reopening it if the commit fails.
    fn refresh(self: &Arc<Self>, name: &str) {
        let Some(handle) = self
            .entries
            .lock()
            .get(name)
            .map(|entry| Arc::clone(&entry.handle))
        else {
            return;
        };

        match handle.commit() {
            Ok(committed) => {
                if committed {
                    Counters::bump(&self.counters.commits);
                    info!(index = name, update_seq = handle.update_seq(), "committed index");
                }
                self.finish_refresh(name, &handle, committed);
            }
            Err(IndexError::Closed { .. }) => self.finish_refresh(name, &handle, false),
            Err(e) => {
                error!(index = name, error = %e, "commit failed, reopening index");
                self.reopen(name, &handle);
            }
        }
    }

    /// Records a completed refresh on the entry if it still holds `handle`.
    fn finish_refresh(&self, name: &str, handle: &Arc<Handle<F>>, committed: bool) {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(name)
            && Arc::ptr_eq(&entry.handle, handle)
        {
            let now = Instant::now();
            entry.last_commit = now;
            if committed {
                entry.last_write = now;
            }
            entry.refreshing = false;
        }
    }

    /// Closes `old`, then replaces it with a fresh handle if the entry still
    /// refers to it. Removes the entry if reopening fails.
    ///
    /// `old` is parked while it closes so that no load opens the index again
    /// before the old engine is released.
    fn reopen(self: &Arc<Self>, name: &str, old: &Arc<Handle<F>>) {
        self.park(old);
        if let Err(e) = old.close() {
            warn!(index = name, error = %e, "error closing index before reopen");
        }
        self.unpark(old);

        let load_lock = self.load_lock(name);
        {
            let _loading = load_lock.lock();
            let current = self
                .entries
                .lock()
                .get(name)
                .is_some_and(|entry| Arc::ptr_eq(&entry.handle, old));
            if current {
                let reopened = self
                    .resolver
                    .index_paths(name)
                    .and_then(|paths| self.load(name, paths));
                let mut entries = self.entries.lock();
                let still_current = entries
                    .get(name)
                    .is_some_and(|entry| Arc::ptr_eq(&entry.handle, old));
                match reopened {
                    Ok(Some(handle)) if still_current => {
                        Counters::bump(&self.counters.reopens);
                        warn!(index = name, "reopened index after failed commit");
                        entries.insert(name.to_string(), Entry::new(handle));
                    }
                    Ok(Some(handle)) => {
                        drop(entries);
                        self.park(&handle);
                        self.schedule_close(handle);
                    }
                    Ok(None) => {
                        debug!(index = name, "index is still closing, reopening on next access");
                        if still_current {
                            entries.remove(name);
                        }
                    }
                    Err(e) => {
                        error!(index = name, error = %e, "failed to reopen index");
                        if still_current {
                            entries.remove(name);
                        }
                    }
                }
            }
        }
        self.forget_load_lock(name, load_lock);
    }

    /// Evicts idle entries and refreshes those due for a commit.
    fn sweep(self: &Arc<Self>) {
        let now = Instant::now();
        let (idle, due) = {
            let mut entries = self.entries.lock();
            let idle_names: Vec<String> = entries
                .iter()
                .filter(|(_, entry)| {
                    now.duration_since(entry.last_access) >= self.config.idle
                        && now.duration_since(entry.last_write) >= self.config.idle
                })
                .map(|(name, _)| name.clone())
                .collect();

            let mut idle = Vec::with_capacity(idle_names.len());
            for name in idle_names {
                if let Some(entry) = entries.remove(&name) {
                    self.park(&entry.handle);
                    idle.push(entry.handle);
                }
            }

            let mut due = Vec::new();
            for (name, entry) in entries.iter_mut() {
                if !entry.refreshing
                    && now.duration_since(entry.last_commit) >= self.config.commit_interval
                {
                    entry.refreshing = true;
                    due.push(name.clone());
                }
            }
            (idle, due)
        };

        for handle in idle {
            Counters::bump(&self.counters.evictions);
            debug!(index = %handle.name(), cause = "idle", "evicting index");
            self.schedule_close(handle);
        }
        for name in due {
            self.refresh(&name);
        }
    }

    /// Queues a task for the worker. Dropped silently after shutdown.
    fn enqueue(&self, task: Task<F>) {
        if let Some(sender) = self.tasks.lock().as_ref()
            && sender.send(task).is_err()
        {
            debug!("cache worker stopped, dropping task");
        }
    }

    /// Records a removed handle whose close has not completed.
    fn park(&self, handle: &Arc<Handle<F>>) {
        self.closing
            .lock()
            .entry(handle.name().to_string())
            .or_default()
            .push(Arc::clone(handle));
    }

    /// Forgets a parked handle after its close completed.
    fn unpark(&self, handle: &Arc<Handle<F>>) {
        let mut closing = self.closing.lock();
        if let Some(parked) = closing.get_mut(handle.name()) {
            parked.retain(|h| !Arc::ptr_eq(h, handle));
            if parked.is_empty() {
                closing.remove(handle.name());
            }
        }
    }

    /// Closes every parked handle for `name`, waiting for each close.
    ///
    /// The handles stay parked until their close returns, so no load of `name`
    /// can open a second engine in the meantime.
    fn drain_closing(&self, name: &str) {
        let parked = self.closing.lock().get(name).cloned().unwrap_or_default();
        for handle in parked {
            self.close_parked(&handle);
        }
    }

    /// Closes a parked handle, then forgets it. Closing twice is harmless.
    fn close_parked(&self, handle: &Arc<Handle<F>>) {
        if let Err(e) = handle.close() {
            error!(index = %handle.name(), error = %e, "failed to close index");
        }
        self.unpark(handle);
    }

    /// Closes a parked handle on a background thread.
    fn schedule_close(self: &Arc<Self>, handle: Arc<Handle<F>>) {
        let inner = Arc::clone(self);
        let closing = Arc::clone(&handle);
        let spawned = thread::Builder::new()
            .name("lantern-close".into())
            .spawn(move || inner.close_parked(&closing));

        match spawned {
            Ok(closer) => {
                let mut closers = self.closers.lock();
                closers.retain(|c| !c.is_finished());
                closers.push(closer);
            }
            Err(e) => {
                warn!(
                    index = %handle.name(),
                    error = %e,
                    "cannot spawn closer thread, closing on the worker"
                );
                self.enqueue(Task::Close(handle));
            }
        }
    }

    /// Returns the load lock for `name`, creating it if needed.
    fn load_lock(&self, name: &str) -> Arc<Mutex<()>> {
        Arc::clone(self.load_locks.lock().entry(name.to_string()).or_default())
    }

    /// Releases this caller's reference to a load lock and drops the lock once
    /// nobody else holds it.
    fn forget_load_lock(&self, name: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.load_locks.lock();
        drop(lock);
        if locks.get(name).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(name);
        }
    }
}
