//! Error types for exile-sync.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use exile_core::{ManifestError, ObjectHash};

/// Failures reported by a remote adapter.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The remote has no object with this hash.
    #[error("object {hash} not found on remote")]
    ObjectNotFound { hash: ObjectHash },

    /// Any other backend failure.
    #[error("remote backend error: {0}")]
    Backend(String),
}

/// All errors that can arise from cache, snapshot and dispatch operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An error from the remote adapter, propagated unchanged.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// An error from the manifest layer.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// The adapter reported success but left nothing in the cache.
    #[error("failed to download object {hash}")]
    MissingAfterFetch { hash: ObjectHash },

    /// Something other than a regular file sits at an object's cache path.
    #[error("stray non-file object in cache: {path}")]
    NotAFile { path: PathBuf },

    /// Every fetch attempt produced content with the wrong digest.
    #[error("object {hash} is corrupt on remote after {attempts} attempts (got {actual})")]
    Corrupt {
        hash: ObjectHash,
        attempts: usize,
        actual: ObjectHash,
    },

    /// The cache path exists and is not a directory.
    #[error("cache path is not a directory: {path}")]
    CacheNotDirectory { path: PathBuf },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error (snapshot).
    #[error("snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Directory walk error while collecting files to add.
    #[error("walk error: {0}")]
    Walk(#[from] ignore::Error),

    /// A worker failed earlier in this run; carries the first failure.
    #[error("transfer aborted")]
    Fault(#[source] Arc<SyncError>),

    /// A worker thread panicked.
    #[error("worker thread {name} panicked")]
    WorkerPanicked { name: String },

    /// A worker thread could not be started.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// Every worker has stopped and no failure was recorded.
    #[error("dispatcher queue is closed")]
    QueueClosed,
}

impl SyncError {
    /// The underlying failure, looking through [`SyncError::Fault`].
    pub fn root_cause(&self) -> &SyncError {
        match self {
            SyncError::Fault(first) => first.root_cause(),
            other => other,
        }
    }
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

/// Convenience constructor for [`RemoteError::Io`].
pub(crate) fn remote_io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RemoteError {
    RemoteError::Io {
        path: path.into(),
        source,
    }
}
