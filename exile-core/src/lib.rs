//! exile core library: manifest model, path trees, hashing, errors.
//!
//! - [`manifest`]: the `exile.manifest` file and its tracked tree
//! - [`tree`]: nested path trees shared by the manifest and the snapshot
//! - [`paths`]: filesystem path to tree component translation
//! - [`hash`]: streaming content digests
//! - [`error`]: [`ManifestError`] and [`PathError`]

pub mod error;
pub mod hash;
pub mod manifest;
pub mod paths;
pub mod tree;
pub mod types;

pub use error::{ManifestError, PathError};
pub use manifest::{
    find_manifest, Manifest, ManifestTree, RemoteConfig, CACHE_DIR, MANIFEST_NAME, SNAPSHOT_NAME,
};
pub use tree::{FileTree, Leaves, Node, NodeKind};
pub use types::ObjectHash;

/// Log target for per-file progress (`adding:`, `resolving:`, transfers).
///
/// Progress is logged at `info` under this target so a front end can show
/// it while hiding warnings.
pub const PROGRESS_TARGET: &str = "exile::progress";
