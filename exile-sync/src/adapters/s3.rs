//! `s3` adapter: objects are keys named by hash in one bucket.
//!
//! ```json
//! {"type": "s3", "id": "AKIA...", "secret": "...", "bucket": "media-objects"}
//! ```
//!
//! `region` defaults to `us-east-1`. `endpoint` points the client at an
//! S3-compatible service instead of AWS.

use std::path::Path;

use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use tokio::runtime::Runtime;

use exile_core::{ManifestError, ObjectHash, RemoteConfig};

use crate::error::{remote_io_err, RemoteError};
use crate::fsutil::write_into_place;
use crate::remote::{Remote, RemoteFactory};

pub const KIND: &str = "s3";

const DEFAULT_REGION: &str = "us-east-1";

#[derive(Clone)]
pub struct S3Factory {
    access_key_id: String,
    secret_access_key: String,
    bucket: String,
    region: String,
    endpoint: Option<String>,
}

impl std::fmt::Debug for S3Factory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Factory")
            .field("access_key_id", &self.access_key_id)
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl S3Factory {
    /// Read credentials and bucket from the remote section.
    pub fn from_config(config: &RemoteConfig) -> Result<Self, ManifestError> {
        let required = |key: &str| {
            config
                .setting_str(key)
                .map(str::to_owned)
                .ok_or_else(|| ManifestError::InvalidRemote {
                    kind: KIND.to_owned(),
                    reason: format!("missing string setting '{key}'"),
                })
        };
        Ok(Self {
            access_key_id: required("id")?,
            secret_access_key: required("secret")?,
            bucket: required("bucket")?,
            region: config
                .setting_str("region")
                .unwrap_or(DEFAULT_REGION)
                .to_owned(),
            endpoint: config.setting_str("endpoint").map(str::to_owned),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn build_store(&self) -> Result<AmazonS3, RemoteError> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&self.bucket)
            .with_access_key_id(&self.access_key_id)
            .with_secret_access_key(&self.secret_access_key)
            .with_region(&self.region);
        if let Some(endpoint) = &self.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }
        builder
            .build()
            .map_err(|e| RemoteError::Backend(format!("s3 client for bucket {}: {e}", self.bucket)))
    }
}

impl RemoteFactory for S3Factory {
    /// Each worker gets its own client and its own single-threaded runtime
    /// to drive it.
    fn connect(&self) -> Result<Box<dyn Remote>, RemoteError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| RemoteError::Backend(format!("s3 runtime: {e}")))?;
        Ok(Box::new(S3Remote {
            store: self.build_store()?,
            runtime,
        }))
    }
}

pub struct S3Remote {
    store: AmazonS3,
    runtime: Runtime,
}

fn object_key(hash: &ObjectHash) -> ObjectPath {
    ObjectPath::from(hash.as_str())
}

fn backend_err(hash: &ObjectHash, err: object_store::Error) -> RemoteError {
    match err {
        object_store::Error::NotFound { .. } => RemoteError::ObjectNotFound { hash: hash.clone() },
        other => RemoteError::Backend(format!("{hash}: {other}")),
    }
}

impl Remote for S3Remote {
    fn get(&mut self, hash: &ObjectHash, dest: &Path) -> Result<(), RemoteError> {
        let key = object_key(hash);
        let store = &self.store;
        let bytes = self
            .runtime
            .block_on(async { store.get(&key).await?.bytes().await })
            .map_err(|e| backend_err(hash, e))?;
        write_into_place(&bytes, dest).map_err(|e| remote_io_err(dest, e))
    }

    fn put(&mut self, source: &Path, hash: &ObjectHash) -> Result<(), RemoteError> {
        let key = object_key(hash);
        let store = &self.store;
        match self.runtime.block_on(store.head(&key)) {
            Ok(_) => {
                tracing::debug!("already on remote: {hash}");
                return Ok(());
            }
            Err(object_store::Error::NotFound { .. }) => {}
            Err(e) => return Err(backend_err(hash, e)),
        }

        let data = std::fs::read(source).map_err(|e| remote_io_err(source, e))?;
        self.runtime
            .block_on(store.put(&key, PutPayload::from(data)))
            .map(|_| ())
            .map_err(|e| backend_err(hash, e))
    }
}
