//! End-to-end add / resolve scenarios against a `local` remote in a temp
//! directory, with a counting wrapper around the adapter.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use exile_core::{hash::hash_bytes, ObjectHash, MANIFEST_NAME, SNAPSHOT_NAME};
use exile_sync::{
    adapters::LocalFactory, DispatchOptions, Remote, RemoteError, RemoteFactory, SyncError,
    Workspace,
};
use filetime::{set_file_mtime, FileTime};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Calls {
    gets: AtomicUsize,
    puts: AtomicUsize,
}

struct CountingFactory {
    inner: LocalFactory,
    calls: Arc<Calls>,
}

struct CountingRemote {
    inner: Box<dyn Remote>,
    calls: Arc<Calls>,
}

impl RemoteFactory for CountingFactory {
    fn connect(&self) -> Result<Box<dyn Remote>, RemoteError> {
        Ok(Box::new(CountingRemote {
            inner: self.inner.connect()?,
            calls: Arc::clone(&self.calls),
        }))
    }
}

impl Remote for CountingRemote {
    fn get(&mut self, hash: &ObjectHash, dest: &Path) -> Result<(), RemoteError> {
        self.calls.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(hash, dest)
    }

    fn put(&mut self, source: &Path, hash: &ObjectHash) -> Result<(), RemoteError> {
        self.calls.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(source, hash)
    }
}

struct BrokenFactory;
struct BrokenRemote;

impl RemoteFactory for BrokenFactory {
    fn connect(&self) -> Result<Box<dyn Remote>, RemoteError> {
        Ok(Box::new(BrokenRemote))
    }
}

impl Remote for BrokenRemote {
    fn get(&mut self, _: &ObjectHash, _: &Path) -> Result<(), RemoteError> {
        Err(RemoteError::Backend("connection refused".into()))
    }

    fn put(&mut self, _: &Path, _: &ObjectHash) -> Result<(), RemoteError> {
        Err(RemoteError::Backend("connection refused".into()))
    }
}

struct Fixture {
    _tmp: TempDir,
    root: PathBuf,
    store: PathBuf,
    calls: Arc<Calls>,
}

impl Fixture {
    /// Project with a = "A", b = "B", c/d = "D" and a manifest whose local
    /// remote lives next to it.
    fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let tmp = TempDir::new().expect("tempdir");
        let base = tmp.path().canonicalize().unwrap();
        let root = base.join("project");
        let store = base.join("store");
        fs::create_dir_all(root.join("c")).unwrap();
        fs::create_dir_all(&store).unwrap();
        fs::write(
            root.join(MANIFEST_NAME),
            r#"{"remote": {"type": "local", "location": "../store"}}"#,
        )
        .unwrap();
        fs::write(root.join("a"), b"A").unwrap();
        fs::write(root.join("b"), b"B").unwrap();
        fs::write(root.join("c/d"), b"D").unwrap();
        Self {
            _tmp: tmp,
            root,
            store,
            calls: Arc::default(),
        }
    }

    fn workspace(&self) -> Workspace {
        Workspace::discover(&self.root).expect("discover")
    }

    fn factory(&self) -> CountingFactory {
        CountingFactory {
            inner: LocalFactory::new(self.store.clone()).unwrap(),
            calls: Arc::clone(&self.calls),
        }
    }

    fn gets(&self) -> usize {
        self.calls.gets.load(Ordering::SeqCst)
    }

    fn add_all(&self) {
        let mut ws = self.workspace();
        let paths = vec![self.root.join("a"), self.root.join("b"), self.root.join("c")];
        ws.add(&paths, &self.factory(), DispatchOptions::default())
            .expect("add");
    }

    fn remove_worktree_files(&self) {
        for f in ["a", "b", "c/d"] {
            fs::remove_file(self.root.join(f)).unwrap();
        }
    }
}

fn forced() -> DispatchOptions {
    DispatchOptions {
        force: true,
        ..DispatchOptions::default()
    }
}

// ---------------------------------------------------------------------------
// 1. add
// ---------------------------------------------------------------------------

#[test]
fn add_records_hashes_and_uploads_objects() {
    let fx = Fixture::new();
    let mut ws = fx.workspace();
    let paths = vec![fx.root.join("a"), fx.root.join("b"), fx.root.join("c")];
    let report = ws
        .add(&paths, &fx.factory(), DispatchOptions::default())
        .unwrap();

    assert_eq!(report.added.len(), 3);
    assert_eq!(report.transfers.uploaded, 3);

    let manifest: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(fx.root.join(MANIFEST_NAME)).unwrap()).unwrap();
    assert_eq!(manifest["files"]["a"], hash_bytes(b"A").as_str());
    assert_eq!(manifest["files"]["b"], hash_bytes(b"B").as_str());
    assert_eq!(manifest["files"]["c"]["d"], hash_bytes(b"D").as_str());

    for data in [b"A", b"B", b"D"] {
        let hash = hash_bytes(data);
        assert_eq!(fs::read(fx.store.join(hash.as_str())).unwrap(), data);
        assert!(fx.root.join(".exile.cache").join(hash.as_str()).is_file());
    }
    // Nothing but the three objects lands in either location.
    assert_eq!(fs::read_dir(&fx.store).unwrap().count(), 3);
    assert_eq!(fs::read_dir(fx.root.join(".exile.cache")).unwrap().count(), 3);
}

#[test]
fn re_adding_unchanged_files_uploads_nothing() {
    let fx = Fixture::new();
    fx.add_all();
    let puts_before = fx.calls.puts.load(Ordering::SeqCst);

    let mut ws = fx.workspace();
    let report = ws
        .add(&[fx.root.join("c")], &fx.factory(), DispatchOptions::default())
        .unwrap();
    assert!(report.added.is_empty());
    assert_eq!(report.unchanged, 1);
    assert_eq!(fx.calls.puts.load(Ordering::SeqCst), puts_before);
}

#[test]
fn failed_upload_leaves_manifest_unsaved() {
    let fx = Fixture::new();
    let before = fs::read_to_string(fx.root.join(MANIFEST_NAME)).unwrap();

    let mut ws = fx.workspace();
    let err = ws
        .add(&[fx.root.join("a")], &BrokenFactory, DispatchOptions::default())
        .unwrap_err();
    assert!(matches!(err, SyncError::Fault(_)), "got: {err}");
    assert_eq!(fs::read_to_string(fx.root.join(MANIFEST_NAME)).unwrap(), before);
}

// ---------------------------------------------------------------------------
// 2. resolve
// ---------------------------------------------------------------------------

#[test]
fn warm_cache_resolve_needs_no_remote() {
    let fx = Fixture::new();
    fx.add_all();
    fx.remove_worktree_files();

    let report = fx
        .workspace()
        .resolve(&[], &fx.factory(), DispatchOptions::default())
        .unwrap();

    assert_eq!(report.files, 3);
    assert_eq!(report.transfers.served_from_cache, 3);
    assert_eq!(fx.gets(), 0);
    assert_eq!(fs::read(fx.root.join("c/d")).unwrap(), b"D");
}

#[test]
fn cold_cache_round_trip_fetches_once_per_object() {
    let fx = Fixture::new();
    fx.add_all();
    let ws = fx.workspace();
    assert!(ws.purge_cache().unwrap());
    fx.remove_worktree_files();

    let report = ws
        .resolve(&[], &fx.factory(), DispatchOptions::default())
        .unwrap();
    assert_eq!(report.transfers.fetched, 3);
    assert_eq!(fx.gets(), 3);
    assert_eq!(fs::read(fx.root.join("a")).unwrap(), b"A");
    assert_eq!(fs::read(fx.root.join("b")).unwrap(), b"B");
    assert_eq!(fs::read(fx.root.join("c/d")).unwrap(), b"D");

    // Resolving again into fresh destinations reuses the cache.
    fx.remove_worktree_files();
    ws.resolve(&[], &fx.factory(), forced()).unwrap();
    assert_eq!(fx.gets(), 3);
}

#[test]
fn second_resolve_is_a_no_op() {
    let fx = Fixture::new();
    fx.add_all();
    let ws = fx.workspace();

    let first = ws
        .resolve(&[], &fx.factory(), DispatchOptions::default())
        .unwrap();
    let second = ws
        .resolve(&[], &fx.factory(), DispatchOptions::default())
        .unwrap();

    assert_eq!(first.transfers.up_to_date, 3, "add already recorded sources");
    assert_eq!(second.transfers.up_to_date, 3);
    assert_eq!(fx.gets(), 0);
}

#[test]
fn touched_file_is_resolved_again_and_force_always_is() {
    let fx = Fixture::new();
    fx.add_all();
    let ws = fx.workspace();

    let a = fx.root.join("a");
    fs::write(&a, b"local edit").unwrap();
    let later = FileTime::from_system_time(SystemTime::now() + Duration::from_secs(60));
    set_file_mtime(&a, later).unwrap();

    let report = ws
        .resolve(&[a.clone()], &fx.factory(), DispatchOptions::default())
        .unwrap();
    assert_eq!(report.transfers.served_from_cache, 1);
    assert_eq!(fs::read(&a).unwrap(), b"A");

    let report = ws.resolve(&[a.clone()], &fx.factory(), forced()).unwrap();
    assert_eq!(report.transfers.up_to_date, 0);
    assert_eq!(report.transfers.served_from_cache, 1);
}

#[test]
fn resolving_a_directory_expands_it() {
    let fx = Fixture::new();
    fx.add_all();
    fx.remove_worktree_files();

    let report = fx
        .workspace()
        .resolve(&[fx.root.join("c")], &fx.factory(), DispatchOptions::default())
        .unwrap();
    assert_eq!(report.files, 1);
    assert!(fx.root.join("c/d").is_file());
    assert!(!fx.root.join("a").exists());
}

#[test]
fn remote_fault_aborts_resolve_without_saving_snapshot() {
    let fx = Fixture::new();
    fx.add_all();
    let ws = fx.workspace();
    ws.purge_cache().unwrap();
    fx.remove_worktree_files();
    let snapshot_before = fs::read(fx.root.join(SNAPSHOT_NAME)).unwrap();

    let err = ws
        .resolve(&[], &BrokenFactory, DispatchOptions::default())
        .unwrap_err();
    assert!(matches!(err, SyncError::Fault(_)), "got: {err}");
    assert!(matches!(
        err.root_cause(),
        SyncError::Remote(RemoteError::Backend(_))
    ));
    assert_eq!(fs::read(fx.root.join(SNAPSHOT_NAME)).unwrap(), snapshot_before);
    assert!(!fx.root.join("a").exists());
    assert!(!fx.root.join("b").exists());
    assert!(!fx.root.join("c").join("d").exists());
}

// ---------------------------------------------------------------------------
// 3. untrack
// ---------------------------------------------------------------------------

#[test]
fn untrack_and_save_drops_entries() {
    let fx = Fixture::new();
    fx.add_all();

    let mut ws = fx.workspace();
    assert_eq!(ws.untrack(&[fx.root.join("c")]), 1);
    ws.save().unwrap();

    let ws = fx.workspace();
    assert_eq!(ws.manifest().tree.get(&fx.root.join("c/d")), None);
    assert_eq!(
        ws.manifest().tree.get(&fx.root.join("a")),
        Some(&hash_bytes(b"A"))
    );
}
