//! Dispatcher worker threads.
//!
//! Each worker owns an [`ObjectCache`] over a private remote connection and
//! pulls [`WorkItem`]s off the shared queue until the queue closes or a
//! fault is recorded. A fault halts the worker that hit it; the others stop
//! at their next check.

use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use parking_lot::Mutex;

use exile_core::paths::resolve_components;
use exile_core::{ObjectHash, PROGRESS_TARGET};

use crate::cache::{CacheOutcome, ObjectCache};
use crate::dispatch::{Operation, Shared, WorkItem};
use crate::error::SyncError;
use crate::snapshot::{mtime_seconds, SnapshotEntry};

pub(crate) struct Worker {
    pub(crate) cache: ObjectCache,
    pub(crate) queue: Arc<Mutex<Receiver<WorkItem>>>,
    pub(crate) shared: Arc<Shared>,
}

impl Worker {
    pub(crate) fn run(mut self) {
        let name = std::thread::current()
            .name()
            .unwrap_or("exile-worker")
            .to_owned();
        let _guard = PanicGuard {
            shared: Arc::clone(&self.shared),
            name: name.clone(),
        };

        loop {
            if self.shared.fault.is_set() {
                break;
            }
            let received = {
                let queue = self.queue.lock();
                if self.shared.fault.is_set() {
                    break;
                }
                queue.recv()
            };
            let Ok(item) = received else {
                break;
            };
            if self.shared.fault.is_set() {
                tracing::debug!("{name}: dropping {:?} {}", item.operation, item.path.display());
                break;
            }
            if let Err(err) = self.execute(&item) {
                self.shared.fault.record(err);
                break;
            }
        }
        tracing::debug!("{name}: stopped");
    }

    fn execute(&mut self, item: &WorkItem) -> Result<(), SyncError> {
        // Paths outside the root have no snapshot entry and are never skipped.
        let parts = resolve_components(&self.shared.root, &item.path).ok();
        let stats = &self.shared.stats;

        match item.operation {
            Operation::Get => {
                if !self.shared.force && self.is_up_to_date(parts.as_deref(), &item.hash, &item.path)
                {
                    tracing::debug!("up to date: {}", item.path.display());
                    stats.up_to_date.fetch_add(1, Ordering::Relaxed);
                    return Ok(());
                }
                tracing::info!(target: PROGRESS_TARGET, "resolving: {}", item.path.display());
                match self.cache.get(&item.hash, &item.path)? {
                    CacheOutcome::Fetched => stats.fetched.fetch_add(1, Ordering::Relaxed),
                    CacheOutcome::Cached => stats.served_from_cache.fetch_add(1, Ordering::Relaxed),
                };
            }
            Operation::Put => {
                self.cache.put(&item.path, &item.hash)?;
                stats.uploaded.fetch_add(1, Ordering::Relaxed);
            }
        }

        if let Some(parts) = parts {
            self.record(&parts, &item.hash, &item.path);
        }
        Ok(())
    }

    /// The snapshot says `dest` already holds `hash` and the file has not
    /// been touched since. Any stat failure means "no".
    fn is_up_to_date(&self, parts: Option<&[String]>, hash: &ObjectHash, dest: &Path) -> bool {
        let Some(parts) = parts else {
            return false;
        };
        let Some(recorded) = self.shared.snapshot.lock().lookup(parts).cloned() else {
            return false;
        };
        match mtime_seconds(dest) {
            Ok(observed) => recorded.is_current(hash, observed),
            Err(_) => false,
        }
    }

    fn record(&self, parts: &[String], hash: &ObjectHash, path: &Path) {
        match mtime_seconds(path) {
            Ok(mtime) => self
                .shared
                .snapshot
                .lock()
                .record(parts, SnapshotEntry(hash.clone(), mtime)),
            Err(e) => tracing::warn!("not recording {} in snapshot: {e}", path.display()),
        }
    }
}

/// Turns a worker panic into a recorded fault so callers stop submitting.
struct PanicGuard {
    shared: Arc<Shared>,
    name: String,
}

impl Drop for PanicGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.shared.fault.record(SyncError::WorkerPanicked {
                name: std::mem::take(&mut self.name),
            });
        }
    }
}
