//! Bounded worker-pool dispatcher for object transfers.
//!
//! ```text
//! caller --get/put--> [sync_channel, capacity N] --> worker 1..W
//!                                                     |  ObjectCache (own remote)
//!                                                     |  Snapshot (shared, locked)
//!                                                     +-> FaultCell (first error wins)
//! ```
//!
//! `get`/`put` block while the queue is full. The first worker error is
//! kept in a write-once cell and handed back on the next `get`, `put` or
//! `join` as [`SyncError::Fault`]. Only a clean `join` saves the snapshot.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{sync_channel, SyncSender};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use exile_core::{ObjectHash, SNAPSHOT_NAME};

use crate::cache::ObjectCache;
use crate::error::SyncError;
use crate::remote::RemoteFactory;
use crate::snapshot::Snapshot;
use crate::worker::Worker;

pub const DEFAULT_WORKERS: usize = 6;
pub const DEFAULT_QUEUE_CAPACITY: usize = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Worker threads; at least one is always started.
    pub workers: usize,
    /// Items that may wait in the queue before `get`/`put` block.
    pub queue_capacity: usize,
    /// Transfer even when the snapshot says the destination is current.
    pub force: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            force: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Get,
    Put,
}

/// One queued transfer. For `Get`, `path` is the destination; for `Put`, the
/// source.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub operation: Operation,
    pub hash: ObjectHash,
    pub path: PathBuf,
}

/// Counts of what the workers did, returned by [`Dispatcher::join`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferSummary {
    pub fetched: usize,
    pub served_from_cache: usize,
    pub up_to_date: usize,
    pub uploaded: usize,
}

impl TransferSummary {
    pub fn total(&self) -> usize {
        self.fetched + self.served_from_cache + self.up_to_date + self.uploaded
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) fetched: AtomicUsize,
    pub(crate) served_from_cache: AtomicUsize,
    pub(crate) up_to_date: AtomicUsize,
    pub(crate) uploaded: AtomicUsize,
}

impl Counters {
    fn summary(&self) -> TransferSummary {
        TransferSummary {
            fetched: self.fetched.load(Ordering::Relaxed),
            served_from_cache: self.served_from_cache.load(Ordering::Relaxed),
            up_to_date: self.up_to_date.load(Ordering::Relaxed),
            uploaded: self.uploaded.load(Ordering::Relaxed),
        }
    }
}

/// Write-once record of the first worker failure.
#[derive(Debug, Default)]
pub(crate) struct FaultCell(OnceLock<Arc<SyncError>>);

impl FaultCell {
    /// Keep `err` if it is the first; log and drop it otherwise.
    pub(crate) fn record(&self, err: SyncError) {
        match self.0.set(Arc::new(err)) {
            Ok(()) => {
                if let Some(first) = self.0.get() {
                    tracing::debug!("worker fault: {first}");
                }
            }
            Err(later) => tracing::warn!("additional failure after the first: {later}"),
        }
    }

    pub(crate) fn is_set(&self) -> bool {
        self.0.get().is_some()
    }

    pub(crate) fn check(&self) -> Result<(), SyncError> {
        match self.0.get() {
            Some(first) => Err(SyncError::Fault(Arc::clone(first))),
            None => Ok(()),
        }
    }
}

/// State every worker of one dispatcher shares.
pub(crate) struct Shared {
    pub(crate) root: PathBuf,
    pub(crate) force: bool,
    pub(crate) snapshot: Mutex<Snapshot>,
    pub(crate) fault: FaultCell,
    pub(crate) stats: Counters,
}

pub struct Dispatcher {
    sender: Option<SyncSender<WorkItem>>,
    workers: Vec<JoinHandle<()>>,
    shared: Arc<Shared>,
}

impl Dispatcher {
    /// Start the worker pool.
    ///
    /// `root` is the manifest directory; the snapshot is read from
    /// `<root>/.exile.snapshot`. Every worker gets its own connection from
    /// `factory` and its own [`ObjectCache`] handle on `cache_root`.
    pub fn new(
        root: &Path,
        cache_root: &Path,
        factory: &dyn RemoteFactory,
        options: DispatchOptions,
    ) -> Result<Self, SyncError> {
        let shared = Arc::new(Shared {
            root: root.to_path_buf(),
            force: options.force,
            snapshot: Mutex::new(Snapshot::load(&root.join(SNAPSHOT_NAME))),
            fault: FaultCell::default(),
            stats: Counters::default(),
        });

        let (sender, receiver) = sync_channel(options.queue_capacity);
        let queue = Arc::new(Mutex::new(receiver));
        let count = options.workers.max(1);

        let mut workers = Vec::with_capacity(count);
        for n in 0..count {
            let worker = Worker {
                cache: ObjectCache::open(cache_root, factory.connect()?)?,
                queue: Arc::clone(&queue),
                shared: Arc::clone(&shared),
            };
            let handle = thread::Builder::new()
                .name(format!("exile-worker-{n}"))
                .spawn(move || worker.run())
                .map_err(SyncError::Spawn)?;
            workers.push(handle);
        }
        tracing::debug!("started {count} workers");

        Ok(Self {
            sender: Some(sender),
            workers,
            shared,
        })
    }

    /// Queue a download of `hash` to `dest`.
    pub fn get(&self, hash: &ObjectHash, dest: &Path) -> Result<(), SyncError> {
        self.submit(WorkItem {
            operation: Operation::Get,
            hash: hash.clone(),
            path: dest.to_path_buf(),
        })
    }

    /// Queue an upload of `source` under `hash`.
    pub fn put(&self, source: &Path, hash: &ObjectHash) -> Result<(), SyncError> {
        self.submit(WorkItem {
            operation: Operation::Put,
            hash: hash.clone(),
            path: source.to_path_buf(),
        })
    }

    fn submit(&self, item: WorkItem) -> Result<(), SyncError> {
        self.shared.fault.check()?;
        let Some(sender) = &self.sender else {
            return Err(SyncError::QueueClosed);
        };
        // Fails only once every worker has stopped and dropped the receiver.
        if sender.send(item).is_err() {
            self.shared.fault.check()?;
            return Err(SyncError::QueueClosed);
        }
        Ok(())
    }

    /// Close the queue, wait for every queued item, and save the snapshot if
    /// nothing failed.
    pub fn join(mut self) -> Result<TransferSummary, SyncError> {
        self.shutdown();
        self.shared.fault.check()?;
        self.shared.snapshot.lock().save()?;
        Ok(self.shared.stats.summary())
    }

    fn shutdown(&mut self) {
        self.sender.take();
        for handle in self.workers.drain(..) {
            let name = handle.thread().name().unwrap_or("exile-worker").to_owned();
            if handle.join().is_err() {
                tracing::error!("worker {name} panicked");
            }
        }
    }
}

impl Drop for Dispatcher {
    /// Stops the workers without saving the snapshot.
    fn drop(&mut self) {
        self.shutdown();
    }
}
