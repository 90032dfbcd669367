//! The `exile.manifest` file and its tree of tracked paths.
//!
//! # Storage layout
//!
//! ```text
//! <root>/
//!   exile.manifest     {"remote": {"type": ..., ...}, "files": {<tree>}}
//!   .exile.cache/      one file per object, named by hash
//!   .exile.snapshot    resolve snapshot, same tree shape as "files"
//! ```
//!
//! The directory holding the manifest is the root of every tracked path.
//! Saves use the same atomic `.tmp` + rename pattern as the snapshot.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ManifestError, PathError};
use crate::paths::{absolutize, resolve_components};
use crate::tree::{FileTree, Leaves, Node};
use crate::types::ObjectHash;

pub const MANIFEST_NAME: &str = "exile.manifest";
pub const CACHE_DIR: &str = ".exile.cache";
pub const SNAPSHOT_NAME: &str = ".exile.snapshot";

// ---------------------------------------------------------------------------
// Remote configuration
// ---------------------------------------------------------------------------

/// The manifest's `remote` section. `type` picks the adapter; every other
/// key is handed to it untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub settings: serde_json::Map<String, serde_json::Value>,
}

impl RemoteConfig {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            settings: serde_json::Map::new(),
        }
    }

    pub fn with_setting(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.settings.insert(key.to_owned(), value.into());
        self
    }

    /// A string setting; `None` if absent or not a string.
    pub fn setting_str(&self, key: &str) -> Option<&str> {
        self.settings.get(key).and_then(serde_json::Value::as_str)
    }
}

// ---------------------------------------------------------------------------
// ManifestTree
// ---------------------------------------------------------------------------

/// Tracked paths under `root`, mapped to their content hashes.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestTree {
    root: PathBuf,
    files: FileTree<ObjectHash>,
}

impl ManifestTree {
    /// `root` must be canonical; every path is resolved relative to it.
    pub fn new(root: PathBuf, files: FileTree<ObjectHash>) -> Self {
        Self { root, files }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn files(&self) -> &FileTree<ObjectHash> {
        &self.files
    }

    /// Components of `path` relative to the root.
    ///
    /// Paths outside the root are logged and reported as
    /// [`PathError::OutsideRoot`]; callers skip them.
    pub fn resolve_path(&self, path: &Path) -> Result<Vec<String>, PathError> {
        resolve_components(&self.root, path).inspect_err(|err| tracing::warn!("{err}"))
    }

    /// The tracked hash of a file; `None` for directories and untracked paths.
    pub fn get(&self, path: &Path) -> Option<&ObjectHash> {
        let parts = self.resolve_path(path).ok()?;
        self.files.get(&parts)
    }

    /// Tracked files under `path`, relative to the root. A directory expands
    /// recursively; an untracked path logs a warning and yields nothing.
    pub fn leaves(&self, path: &Path) -> Leaves<'_, ObjectHash> {
        let Ok(parts) = self.resolve_path(path) else {
            return Leaves::empty();
        };
        match self.files.leaves(&parts) {
            Some(leaves) => leaves,
            None => {
                tracing::warn!("path is not tracked: {}", path.display());
                Leaves::empty()
            }
        }
    }

    /// Track `path` with `hash`.
    ///
    /// Returns `true` only if the stored hash changed, so callers upload only
    /// on change. A tracked node of the other kind in the way is a
    /// [`PathError::Conflict`]; nothing is overwritten.
    pub fn add(&mut self, path: &Path, hash: ObjectHash) -> Result<bool, PathError> {
        let parts = self.resolve_path(path)?;
        if parts.is_empty() {
            return Err(PathError::IsRoot {
                path: path.to_path_buf(),
            });
        }

        if self.files.get(&parts) == Some(&hash) {
            return Ok(false);
        }
        self.files
            .insert(&parts, hash)
            .map_err(|conflict| PathError::Conflict {
                path: parts[..=conflict.depth].iter().collect(),
                found: conflict.found,
            })?;

        let relative: PathBuf = parts.iter().collect();
        tracing::info!(target: crate::PROGRESS_TARGET, "adding: {}", relative.display());
        Ok(true)
    }

    /// Stop tracking everything at or below `path` and return the detached
    /// subtree.
    pub fn remove(&mut self, path: &Path) -> Option<Node<ObjectHash>> {
        let parts = self.resolve_path(path).ok()?;
        let removed = self.files.remove(&parts);
        if removed.is_none() {
            tracing::warn!("path is not tracked: {}", path.display());
        }
        removed
    }
}

// ---------------------------------------------------------------------------
// Manifest file
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ManifestDocument {
    remote: RemoteConfig,
    #[serde(default)]
    files: FileTree<ObjectHash>,
}

#[derive(Serialize)]
struct ManifestDocumentRef<'a> {
    files: &'a FileTree<ObjectHash>,
    remote: &'a RemoteConfig,
}

/// A loaded manifest: remote configuration plus the tracked tree.
#[derive(Debug, Clone)]
pub struct Manifest {
    path: PathBuf,
    pub remote: RemoteConfig,
    pub tree: ManifestTree,
}

impl Manifest {
    /// Load the manifest at or above `start`.
    pub fn discover(start: &Path) -> Result<Self, ManifestError> {
        let path = find_manifest(start)?;
        Self::load(&path)
    }

    /// Load the manifest at `path`.
    ///
    /// Returns `ManifestError::Parse` (with path and serde_json context) if
    /// the JSON is malformed or a tracked hash is invalid.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        let document: ManifestDocument =
            serde_json::from_str(&contents).map_err(|source| ManifestError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let path = path.canonicalize().map_err(|e| io_err(path, e))?;
        let root = path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| io_err(&path, std::io::Error::other("manifest has no parent")))?;

        tracing::debug!("loaded manifest {}", path.display());
        Ok(Self {
            path,
            remote: document.remote,
            tree: ManifestTree::new(root, document.files),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn root(&self) -> &Path {
        self.tree.root()
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root().join(CACHE_DIR)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.root().join(SNAPSHOT_NAME)
    }

    /// Serialize with four-space indentation and sorted keys.
    pub fn to_json(&self) -> Result<String, ManifestError> {
        // Going through `Value` sorts the flattened remote settings too.
        let document = serde_json::to_value(ManifestDocumentRef {
            files: self.tree.files(),
            remote: &self.remote,
        })?;
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        document.serialize(&mut serializer)?;
        buf.push(b'\n');
        String::from_utf8(buf)
            .map_err(|e| io_err(&self.path, std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
    }

    /// Save back to [`Manifest::path`] atomically.
    ///
    /// Writes to `<path>.tmp` then renames to `<path>`.
    pub fn save(&self) -> Result<(), ManifestError> {
        let json = self.to_json()?;
        let tmp = self.path.with_extension("manifest.tmp");
        std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_err(&self.path, e));
        }
        Ok(())
    }
}

/// Find `exile.manifest` in `start` or the nearest ancestor holding one.
pub fn find_manifest(start: &Path) -> Result<PathBuf, ManifestError> {
    let start = absolutize(start).map_err(|e| io_err(start, e))?;
    start
        .ancestors()
        .map(|dir| dir.join(MANIFEST_NAME))
        .find(|candidate| candidate.is_file())
        .ok_or(ManifestError::NotFound {
            name: MANIFEST_NAME,
            start,
        })
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
