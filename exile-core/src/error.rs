//! Error types for exile-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::tree::NodeKind;

/// Fatal configuration errors: the manifest or its remote section cannot be
/// used.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// No `exile.manifest` at or above the starting directory.
    #[error("no '{name}' file found in {start} or any parent directory")]
    NotFound { name: &'static str, start: PathBuf },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed manifest JSON, including invalid hashes in the file tree.
    #[error("failed to parse manifest at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// JSON serialization error (save path).
    #[error("manifest JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A string that is not a 40-character lowercase hex digest.
    #[error("invalid object hash '{0}': expected 40 lowercase hex characters")]
    InvalidHash(String),

    /// The remote `type` does not name a known adapter.
    #[error("unknown remote type '{0}'")]
    UnknownRemote(String),

    /// The remote section is present but unusable by its adapter.
    #[error("invalid '{kind}' remote configuration: {reason}")]
    InvalidRemote { kind: String, reason: String },
}

/// Non-fatal per-path errors. Callers log these and skip the path.
#[derive(Debug, Error)]
pub enum PathError {
    /// The path does not lie under the manifest root.
    #[error("skipping path outside manifest scope: {}", path.display())]
    OutsideRoot { path: PathBuf, root: PathBuf },

    /// The path names the manifest root itself where a file was expected.
    #[error("path is the manifest root, not a file: {}", path.display())]
    IsRoot { path: PathBuf },

    /// The path could not be made absolute.
    #[error("cannot resolve path {}: {source}", path.display())]
    Unresolvable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A component of the path is not valid UTF-8.
    #[error("path is not valid UTF-8: {}", path.display())]
    NotUtf8 { path: PathBuf },

    /// A tracked node of the other kind is in the way.
    #[error("{} is tracked as a {found}, refusing to replace it", path.display())]
    Conflict { path: PathBuf, found: NodeKind },
}

/// Convenience constructor for [`ManifestError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ManifestError {
    ManifestError::Io {
        path: path.into(),
        source,
    }
}
