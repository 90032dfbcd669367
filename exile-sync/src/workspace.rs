//! One exile session over a manifest: add, resolve, untrack and cache
//! maintenance.
//!
//! Each transfer command builds a [`Dispatcher`], feeds it, and joins it
//! before anything is written back. A failed `add` therefore never records
//! hashes whose upload did not finish.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use exile_core::hash::hash_file;
use exile_core::{
    Manifest, ObjectHash, PathError, CACHE_DIR, MANIFEST_NAME, PROGRESS_TARGET, SNAPSHOT_NAME,
};

use crate::adapters::factory_for;
use crate::cache::{CacheInfo, ObjectCache};
use crate::dispatch::{DispatchOptions, Dispatcher, TransferSummary};
use crate::error::{io_err, SyncError};
use crate::remote::RemoteFactory;

/// Outcome of [`Workspace::add`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddReport {
    /// Files whose tracked hash changed, relative to the root.
    pub added: Vec<PathBuf>,
    /// Files already tracked with the same content.
    pub unchanged: usize,
    /// Paths skipped with a warning.
    pub skipped: usize,
    pub transfers: TransferSummary,
}

/// Outcome of [`Workspace::resolve`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveReport {
    /// Tracked files handed to the dispatcher.
    pub files: usize,
    pub transfers: TransferSummary,
}

#[derive(Debug)]
pub struct Workspace {
    manifest: Manifest,
}

impl Workspace {
    /// Open the manifest at or above `start`.
    pub fn discover(start: &Path) -> Result<Self, SyncError> {
        Ok(Self::new(Manifest::discover(start)?))
    }

    pub fn new(manifest: Manifest) -> Self {
        Self { manifest }
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn root(&self) -> &Path {
        self.manifest.root()
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.manifest.cache_dir()
    }

    /// The adapter factory configured in the manifest's `remote` section.
    pub fn remote_factory(&self) -> Result<Box<dyn RemoteFactory>, SyncError> {
        Ok(factory_for(&self.manifest.remote, self.root())?)
    }

    /// Hash and track `paths`, uploading every file whose hash changed.
    ///
    /// Directories are walked recursively. The manifest is saved only after
    /// every upload has finished.
    pub fn add(
        &mut self,
        paths: &[PathBuf],
        factory: &dyn RemoteFactory,
        options: DispatchOptions,
    ) -> Result<AddReport, SyncError> {
        let mut report = AddReport::default();
        let files = self.collect_files(paths, &mut report.skipped)?;

        let dispatcher = Dispatcher::new(self.root(), &self.cache_dir(), factory, options)?;
        for file in files {
            let hash = hash_file(&file).map_err(|e| io_err(&file, e))?;
            match self.manifest.tree.add(&file, hash.clone()) {
                Ok(true) => {
                    dispatcher.put(&file, &hash)?;
                    report.added.push(self.relative(&file));
                }
                Ok(false) => report.unchanged += 1,
                Err(PathError::OutsideRoot { .. }) => report.skipped += 1,
                Err(err) => {
                    tracing::warn!("{err}");
                    report.skipped += 1;
                }
            }
        }
        report.transfers = dispatcher.join()?;

        if !report.added.is_empty() {
            self.manifest.save()?;
        }
        Ok(report)
    }

    /// Materialize tracked files under `paths`; no paths means everything.
    pub fn resolve(
        &self,
        paths: &[PathBuf],
        factory: &dyn RemoteFactory,
        options: DispatchOptions,
    ) -> Result<ResolveReport, SyncError> {
        let targets = self.tracked_under(paths);

        let dispatcher = Dispatcher::new(self.root(), &self.cache_dir(), factory, options)?;
        for (path, hash) in &targets {
            dispatcher.get(hash, path)?;
        }
        let transfers = dispatcher.join()?;

        Ok(ResolveReport {
            files: targets.len(),
            transfers,
        })
    }

    /// Stop tracking `paths`. Returns the number of files untracked; call
    /// [`Workspace::save`] to persist.
    pub fn untrack(&mut self, paths: &[PathBuf]) -> usize {
        let mut removed = 0;
        for path in paths {
            if let Some(node) = self.manifest.tree.remove(path) {
                let count = node.leaves().count();
                tracing::info!(
                    target: PROGRESS_TARGET,
                    "untracked {count} file(s) under {}",
                    path.display()
                );
                removed += count;
            }
        }
        removed
    }

    pub fn save(&self) -> Result<(), SyncError> {
        Ok(self.manifest.save()?)
    }

    pub fn cache_info(&self) -> Result<CacheInfo, SyncError> {
        ObjectCache::info(&self.cache_dir())
    }

    /// Delete the object cache. Returns `false` if there was none.
    pub fn purge_cache(&self) -> Result<bool, SyncError> {
        ObjectCache::purge(&self.cache_dir())
    }

    /// Absolute destination → hash for every tracked file under `paths`,
    /// deduplicated and in path order.
    fn tracked_under(&self, paths: &[PathBuf]) -> BTreeMap<PathBuf, ObjectHash> {
        let tree = &self.manifest.tree;
        let root = self.root();
        let mut targets = BTreeMap::new();
        let mut collect = |path: &Path| {
            for (relative, hash) in tree.leaves(path) {
                targets.insert(root.join(relative), hash.clone());
            }
        };
        if paths.is_empty() {
            collect(root);
        } else {
            paths.iter().for_each(|p| collect(p));
        }
        targets
    }

    /// Regular files named by `paths`, with directories expanded.
    fn collect_files(
        &self,
        paths: &[PathBuf],
        skipped: &mut usize,
    ) -> Result<Vec<PathBuf>, SyncError> {
        let mut files = Vec::new();
        for path in paths {
            if path.is_file() {
                files.push(path.clone());
            } else if path.is_dir() {
                walk_files(path, &mut files)?;
            } else {
                tracing::warn!("no such file, skipping: {}", path.display());
                *skipped += 1;
            }
        }
        Ok(files)
    }

    fn relative(&self, file: &Path) -> PathBuf {
        self.manifest
            .tree
            .resolve_path(file)
            .map(|parts| parts.iter().collect())
            .unwrap_or_else(|_| file.to_path_buf())
    }
}

/// Every regular file under `dir`, skipping exile's own bookkeeping.
fn walk_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), SyncError> {
    let mut builder = WalkBuilder::new(dir);
    builder
        .standard_filters(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(|e| {
            let name = e.file_name();
            name != CACHE_DIR && name != MANIFEST_NAME && name != SNAPSHOT_NAME
        });

    for result in builder.build() {
        let entry = result?;
        if entry.path().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(())
}
