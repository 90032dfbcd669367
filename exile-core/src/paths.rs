//! Filesystem path → tree component translation.

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use crate::error::PathError;

/// Make `path` absolute against the current directory and normalize it.
///
/// `.` and `..` are resolved lexically, then the longest prefix that exists
/// on disk is canonicalized so a symlinked ancestor compares equal to a
/// canonical manifest root. The path itself need not exist.
pub fn absolutize(path: &Path) -> std::io::Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut lexical = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                lexical.pop();
            }
            other => lexical.push(other),
        }
    }

    let mut existing = lexical.as_path();
    let mut missing: Vec<&OsStr> = Vec::new();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            return Ok(missing
                .iter()
                .rev()
                .fold(canonical, |acc, name| acc.join(name)));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name);
                existing = parent;
            }
            _ => break,
        }
    }
    Ok(lexical)
}

/// Components of `path` relative to `root`, which must be canonical.
///
/// The root itself resolves to an empty component list. Components that
/// are not valid UTF-8 cannot be stored in the manifest and are rejected.
pub fn resolve_components(root: &Path, path: &Path) -> Result<Vec<String>, PathError> {
    let absolute = absolutize(path).map_err(|source| PathError::Unresolvable {
        path: path.to_path_buf(),
        source,
    })?;
    let Ok(relative) = absolute.strip_prefix(root) else {
        return Err(PathError::OutsideRoot {
            path: absolute,
            root: root.to_path_buf(),
        });
    };
    relative
        .components()
        .map(|c| {
            c.as_os_str()
                .to_str()
                .map(str::to_owned)
                .ok_or_else(|| PathError::NotUtf8 {
                    path: absolute.clone(),
                })
        })
        .collect()
}
