//! Write-to-temp-then-rename file placement.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A unique hidden sibling of `dest` to stage writes in.
pub(crate) fn tmp_sibling(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    dest.with_file_name(format!(".{name}.{}-{n}.exile-tmp", std::process::id()))
}

/// Copy `src` to `dest`, creating parent directories.
///
/// The bytes land in a temp sibling first and are renamed into place, so
/// `dest` is either untouched or complete.
pub(crate) fn copy_into_place(src: &Path, dest: &Path) -> io::Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = tmp_sibling(dest);
    let result = std::fs::copy(src, &tmp).and_then(|_| std::fs::rename(&tmp, dest));
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    result
}

/// Write `bytes` to `dest` the same way [`copy_into_place`] copies.
pub(crate) fn write_into_place(bytes: &[u8], dest: &Path) -> io::Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = tmp_sibling(dest);
    let result = std::fs::write(&tmp, bytes).and_then(|_| std::fs::rename(&tmp, dest));
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    result
}
