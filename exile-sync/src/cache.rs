//! Object cache: a flat directory of objects named by hash, in front of
//! one remote adapter.
//!
//! An object is fetched from the remote at most once per cache directory;
//! afterwards every `get` is a local copy. The cache has no internal
//! locking; the dispatcher gives each worker its own handle.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use exile_core::{hash::hash_file, ObjectHash, PROGRESS_TARGET};

use crate::error::{io_err, SyncError};
use crate::fsutil::copy_into_place;
use crate::remote::Remote;

/// Fetch attempts (including the first) before a mismatching object is
/// reported as corrupt.
pub const MAX_FETCH_ATTEMPTS: usize = 3;

/// Where the bytes for a `get` came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// Downloaded from the remote into the cache first.
    Fetched,
    /// Already present in the cache.
    Cached,
}

/// Summary of a cache directory, for `exile cache info`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheInfo {
    pub objects: usize,
    pub bytes: u64,
    pub newest: Option<DateTime<Utc>>,
}

pub struct ObjectCache {
    root: PathBuf,
    remote: Box<dyn Remote>,
}

impl ObjectCache {
    /// Open the cache at `root`, creating the directory if needed.
    pub fn open(root: &Path, remote: Box<dyn Remote>) -> Result<Self, SyncError> {
        if root.exists() && !root.is_dir() {
            return Err(SyncError::CacheNotDirectory {
                path: root.to_path_buf(),
            });
        }
        std::fs::create_dir_all(root).map_err(|e| io_err(root, e))?;
        Ok(Self {
            root: root.to_path_buf(),
            remote,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn object_path(&self, hash: &ObjectHash) -> PathBuf {
        self.root.join(hash.as_str())
    }

    /// Materialize object `hash` at `dest`, fetching it into the cache first
    /// if absent. `dest` always receives a copy; the cached object stays.
    pub fn get(&mut self, hash: &ObjectHash, dest: &Path) -> Result<CacheOutcome, SyncError> {
        let cached = self.object_path(hash);
        let outcome = match std::fs::metadata(&cached) {
            Ok(meta) if meta.is_file() => CacheOutcome::Cached,
            Ok(_) => return Err(SyncError::NotAFile { path: cached }),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.fetch(hash, &cached)?;
                CacheOutcome::Fetched
            }
            Err(e) => return Err(io_err(&cached, e)),
        };

        copy_into_place(&cached, dest).map_err(|e| io_err(dest, e))?;
        tracing::debug!("resolved {} -> {}", hash, dest.display());
        Ok(outcome)
    }

    /// Copy `source` into the cache under `hash`, then upload it.
    pub fn put(&mut self, source: &Path, hash: &ObjectHash) -> Result<(), SyncError> {
        let cached = self.object_path(hash);
        if !cached.is_file() {
            copy_into_place(source, &cached).map_err(|e| io_err(&cached, e))?;
        }
        tracing::info!(target: PROGRESS_TARGET, "uploading: {hash}");
        self.remote.put(&cached, hash)?;
        Ok(())
    }

    fn fetch(&mut self, hash: &ObjectHash, cached: &Path) -> Result<(), SyncError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            tracing::info!(target: PROGRESS_TARGET, "downloading: {hash}");
            self.remote.get(hash, cached)?;

            match std::fs::metadata(cached) {
                Ok(meta) if meta.is_file() => {}
                Ok(_) => {
                    return Err(SyncError::NotAFile {
                        path: cached.to_path_buf(),
                    })
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    return Err(SyncError::MissingAfterFetch { hash: hash.clone() })
                }
                Err(e) => return Err(io_err(cached, e)),
            }

            let actual = hash_file(cached).map_err(|e| io_err(cached, e))?;
            if &actual == hash {
                return Ok(());
            }
            std::fs::remove_file(cached).map_err(|e| io_err(cached, e))?;
            if attempt >= MAX_FETCH_ATTEMPTS {
                return Err(SyncError::Corrupt {
                    hash: hash.clone(),
                    attempts: attempt,
                    actual,
                });
            }
            tracing::warn!(
                "download of {hash} has digest {actual}, retrying ({attempt}/{MAX_FETCH_ATTEMPTS})"
            );
        }
    }

    /// Count the objects under `root`. A missing directory is an empty cache.
    pub fn info(root: &Path) -> Result<CacheInfo, SyncError> {
        let mut info = CacheInfo::default();
        let entries = match std::fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(info),
            Err(e) => return Err(io_err(root, e)),
        };
        for entry in entries {
            let entry = entry.map_err(|e| io_err(root, e))?;
            // Staging files are hidden; objects are bare hashes.
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            let meta = entry.metadata().map_err(|e| io_err(entry.path(), e))?;
            if !meta.is_file() {
                continue;
            }
            info.objects += 1;
            info.bytes += meta.len();
            if let Ok(modified) = meta.modified() {
                let modified = DateTime::<Utc>::from(modified);
                info.newest = Some(info.newest.map_or(modified, |n| n.max(modified)));
            }
        }
        Ok(info)
    }

    /// Delete the cache directory. Returns `false` if there was none.
    pub fn purge(root: &Path) -> Result<bool, SyncError> {
        match std::fs::symlink_metadata(root) {
            Ok(meta) if meta.is_dir() => {
                std::fs::remove_dir_all(root).map_err(|e| io_err(root, e))?;
                tracing::info!(target: PROGRESS_TARGET, "removed cache: {}", root.display());
                Ok(true)
            }
            Ok(_) => Err(SyncError::CacheNotDirectory {
                path: root.to_path_buf(),
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_err(root, e)),
        }
    }
}
