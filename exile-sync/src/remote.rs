//! Remote adapter contract.
//!
//! A remote is a flat object store addressed by [`ObjectHash`]. Each
//! dispatcher worker gets its own [`Remote`] from a [`RemoteFactory`], so an
//! adapter never has to be shareable across threads, only movable to one.

use std::path::Path;

use exile_core::ObjectHash;

use crate::error::RemoteError;

pub trait Remote: Send {
    /// Download the object `hash` to `dest`.
    ///
    /// Must not leave a partial file at `dest` on failure.
    fn get(&mut self, hash: &ObjectHash, dest: &Path) -> Result<(), RemoteError>;

    /// Upload the file at `source` under `hash`. Must be idempotent.
    fn put(&mut self, source: &Path, hash: &ObjectHash) -> Result<(), RemoteError>;
}

/// Produces one [`Remote`] per worker.
pub trait RemoteFactory: Send + Sync {
    fn connect(&self) -> Result<Box<dyn Remote>, RemoteError>;
}
