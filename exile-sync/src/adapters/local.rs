//! `local` adapter: objects are plain files in a directory.
//!
//! ```json
//! {"type": "local", "location": "/srv/exile-objects"}
//! ```

use std::path::{Path, PathBuf};

use exile_core::{ManifestError, ObjectHash, RemoteConfig};

use crate::error::{remote_io_err, RemoteError};
use crate::fsutil::copy_into_place;
use crate::remote::{Remote, RemoteFactory};

pub const KIND: &str = "local";

#[derive(Debug, Clone)]
pub struct LocalFactory {
    location: PathBuf,
}

impl LocalFactory {
    /// `location` must be an existing directory.
    pub fn new(location: PathBuf) -> Result<Self, ManifestError> {
        if !location.is_dir() {
            return Err(ManifestError::InvalidRemote {
                kind: KIND.to_owned(),
                reason: format!("location is not a directory: {}", location.display()),
            });
        }
        Ok(Self { location })
    }

    /// Read `location` from the remote section. A relative location is
    /// taken relative to `root`.
    pub fn from_config(config: &RemoteConfig, root: &Path) -> Result<Self, ManifestError> {
        let location = config
            .setting_str("location")
            .ok_or_else(|| ManifestError::InvalidRemote {
                kind: KIND.to_owned(),
                reason: "missing string setting 'location'".to_owned(),
            })?;
        Self::new(root.join(location))
    }

    pub fn location(&self) -> &Path {
        &self.location
    }
}

impl RemoteFactory for LocalFactory {
    fn connect(&self) -> Result<Box<dyn Remote>, RemoteError> {
        Ok(Box::new(LocalRemote {
            location: self.location.clone(),
        }))
    }
}

#[derive(Debug)]
pub struct LocalRemote {
    location: PathBuf,
}

impl Remote for LocalRemote {
    fn get(&mut self, hash: &ObjectHash, dest: &Path) -> Result<(), RemoteError> {
        let object = self.location.join(hash.as_str());
        if !object.is_file() {
            return Err(RemoteError::ObjectNotFound { hash: hash.clone() });
        }
        copy_into_place(&object, dest).map_err(|e| remote_io_err(dest, e))
    }

    fn put(&mut self, source: &Path, hash: &ObjectHash) -> Result<(), RemoteError> {
        let object = self.location.join(hash.as_str());
        if object.is_file() {
            tracing::debug!("already on remote: {hash}");
            return Ok(());
        }
        copy_into_place(source, &object).map_err(|e| remote_io_err(&object, e))
    }
}
