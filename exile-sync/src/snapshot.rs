//! Resolve snapshot: which hash was last materialized at each path, and the
//! file's modification time right after.
//!
//! Persists a JSON tree at `<root>/.exile.snapshot`, shaped like the
//! manifest's `files` section with `["<hash>", <mtime>]` leaves. Writes use
//! the same atomic `.tmp` + rename pattern as the manifest.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};

use exile_core::{FileTree, ObjectHash};

use crate::error::{io_err, SyncError};

/// `(hash, mtime)` recorded for one path; mtime is seconds since the epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry(pub ObjectHash, pub f64);

impl SnapshotEntry {
    /// Whether a file currently at mtime `observed` still holds `hash`.
    ///
    /// True only if the recorded hash matches and the file has not been
    /// modified after the recording.
    pub fn is_current(&self, hash: &ObjectHash, observed: f64) -> bool {
        self.0 == *hash && observed <= self.1
    }
}

/// Modification time of `path` in seconds since the epoch.
pub fn mtime_seconds(path: &Path) -> std::io::Result<f64> {
    let modified = std::fs::metadata(path)?.modified()?;
    let since_epoch = modified
        .duration_since(UNIX_EPOCH)
        .map_err(std::io::Error::other)?;
    Ok(since_epoch.as_secs_f64())
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    path: PathBuf,
    entries: FileTree<SnapshotEntry>,
}

impl Snapshot {
    pub fn empty(path: PathBuf) -> Self {
        Self {
            path,
            entries: FileTree::new(),
        }
    }

    /// Load the snapshot at `path`.
    ///
    /// A missing or unreadable snapshot is an empty one; it only ever costs
    /// a redundant transfer.
    pub fn load(path: &Path) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("ignoring unreadable snapshot {}: {e}", path.display());
                }
                return Self::empty(path.to_path_buf());
            }
        };
        match serde_json::from_str(&contents) {
            Ok(entries) => Self {
                path: path.to_path_buf(),
                entries,
            },
            Err(e) => {
                tracing::warn!("ignoring malformed snapshot {}: {e}", path.display());
                Self::empty(path.to_path_buf())
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &FileTree<SnapshotEntry> {
        &self.entries
    }

    /// The entry recorded at path components `parts`.
    pub fn lookup(&self, parts: &[String]) -> Option<&SnapshotEntry> {
        self.entries.get(parts)
    }

    /// Record `entry` at `parts`, replacing whatever node is in the way.
    pub fn record(&mut self, parts: &[String], entry: SnapshotEntry) {
        if parts.is_empty() {
            return;
        }
        if let Err(conflict) = self.entries.insert(parts, entry.clone()) {
            self.entries.remove(&parts[..=conflict.depth]);
            if let Err(conflict) = self.entries.insert(parts, entry) {
                tracing::debug!("snapshot entry not recorded: {conflict:?}");
            }
        }
    }

    /// Save atomically.
    ///
    /// Writes to `<path>.tmp` then renames to `<path>`.
    pub fn save(&self) -> Result<(), SyncError> {
        let json = serde_json::to_string(&self.entries)?;
        let tmp = self.path.with_extension("snapshot.tmp");
        std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_err(&self.path, e));
        }
        tracing::debug!("saved snapshot {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exile_core::hash::hash_bytes;
    use tempfile::TempDir;

    fn parts(path: &str) -> Vec<String> {
        path.split('/').map(str::to_owned).collect()
    }

    #[test]
    fn missing_snapshot_is_empty() {
        let tmp = TempDir::new().unwrap();
        let snap = Snapshot::load(&tmp.path().join(".exile.snapshot"));
        assert!(snap.entries().is_empty());
    }

    #[test]
    fn malformed_snapshot_is_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".exile.snapshot");
        std::fs::write(&path, b"{not json").unwrap();
        assert!(Snapshot::load(&path).entries().is_empty());
    }

    #[test]
    fn roundtrip_save_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".exile.snapshot");
        let mut snap = Snapshot::empty(path.clone());
        let entry = SnapshotEntry(hash_bytes(b"A"), 1_700_000_000.123_456_7);
        snap.record(&parts("a/b"), entry.clone());
        snap.save().unwrap();

        let loaded = Snapshot::load(&path);
        assert_eq!(loaded.lookup(&parts("a/b")), Some(&entry));
        assert!(!path.with_extension("snapshot.tmp").exists());
    }

    #[test]
    fn leaves_are_hash_mtime_pairs() {
        let mut snap = Snapshot::empty(PathBuf::from("unused"));
        snap.record(&parts("d/f"), SnapshotEntry(hash_bytes(b"F"), 12.5));
        let json = serde_json::to_value(snap.entries()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"d": {"f": [hash_bytes(b"F").as_str(), 12.5]}})
        );
    }

    #[test]
    fn record_replaces_conflicting_nodes() {
        let mut snap = Snapshot::empty(PathBuf::from("unused"));
        snap.record(&parts("a"), SnapshotEntry(hash_bytes(b"1"), 1.0));
        snap.record(&parts("a/b"), SnapshotEntry(hash_bytes(b"2"), 2.0));
        assert_eq!(snap.lookup(&parts("a")), None);
        assert!(snap.lookup(&parts("a/b")).is_some());

        snap.record(&parts("a"), SnapshotEntry(hash_bytes(b"3"), 3.0));
        assert_eq!(snap.lookup(&parts("a/b")), None);
        assert_eq!(snap.lookup(&parts("a")).map(|e| e.1), Some(3.0));
    }

    #[test]
    fn entry_freshness() {
        let entry = SnapshotEntry(hash_bytes(b"A"), 100.0);
        assert!(entry.is_current(&hash_bytes(b"A"), 100.0));
        assert!(entry.is_current(&hash_bytes(b"A"), 99.0));
        assert!(!entry.is_current(&hash_bytes(b"A"), 100.5));
        assert!(!entry.is_current(&hash_bytes(b"B"), 50.0));
    }

    #[test]
    fn mtime_of_missing_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(mtime_seconds(&tmp.path().join("gone")).is_err());
    }
}
