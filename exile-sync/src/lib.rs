//! # exile-sync
//!
//! Object cache, resolve snapshot and concurrent transfer dispatch.
//!
//! Open a [`Workspace`] over a manifest and call [`Workspace::add`] or
//! [`Workspace::resolve`]; both run their transfers through a
//! [`Dispatcher`] backed by the configured remote adapter.

pub mod adapters;
pub mod cache;
pub mod dispatch;
pub mod error;
mod fsutil;
pub mod remote;
pub mod snapshot;
mod worker;
pub mod workspace;

pub use cache::{CacheInfo, CacheOutcome, ObjectCache};
pub use dispatch::{
    DispatchOptions, Dispatcher, Operation, TransferSummary, WorkItem, DEFAULT_QUEUE_CAPACITY,
    DEFAULT_WORKERS,
};
pub use error::{RemoteError, SyncError};
pub use remote::{Remote, RemoteFactory};
pub use snapshot::{Snapshot, SnapshotEntry};
pub use workspace::{AddReport, ResolveReport, Workspace};
