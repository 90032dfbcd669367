//! Streaming SHA-1 content digests.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use sha1::{Digest, Sha1};

use crate::types::ObjectHash;

/// Read buffer size used while hashing.
pub const READ_BLOCK: usize = 64 * 1024;

/// Hash the full byte stream of the file at `path`.
pub fn hash_file(path: &Path) -> io::Result<ObjectHash> {
    let file = File::open(path)?;
    hash_reader(BufReader::with_capacity(READ_BLOCK, file))
}

pub fn hash_reader(mut reader: impl Read) -> io::Result<ObjectHash> {
    let mut hasher = Sha1::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(ObjectHash::from_digest(&hasher.finalize()))
}

pub fn hash_bytes(bytes: &[u8]) -> ObjectHash {
    ObjectHash::from_digest(&Sha1::digest(bytes))
}
