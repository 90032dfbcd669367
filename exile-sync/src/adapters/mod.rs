//! Remote adapters, selected by the manifest's `remote.type`.

use std::path::Path;

use exile_core::{ManifestError, RemoteConfig};

use crate::remote::RemoteFactory;

pub mod local;
pub mod s3;

pub use local::{LocalFactory, LocalRemote};
pub use s3::{S3Factory, S3Remote};

/// Build the factory named by `config.kind`.
///
/// `root` is the manifest directory; adapters resolve relative settings
/// against it.
pub fn factory_for(
    config: &RemoteConfig,
    root: &Path,
) -> Result<Box<dyn RemoteFactory>, ManifestError> {
    match config.kind.as_str() {
        local::KIND => Ok(Box::new(LocalFactory::from_config(config, root)?)),
        s3::KIND => Ok(Box::new(S3Factory::from_config(config)?)),
        other => Err(ManifestError::UnknownRemote(other.to_owned())),
    }
}
