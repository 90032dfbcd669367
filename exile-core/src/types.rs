//! Domain types shared by every exile crate.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ManifestError;

/// Length of a hex-encoded SHA-1 digest.
pub const HASH_HEX_LEN: usize = 40;

/// Content identity of a tracked file: the lowercase hex SHA-1 digest of its
/// bytes. Also the object name in the cache and in every remote.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectHash(String);

impl ObjectHash {
    /// Build from raw digest bytes.
    pub fn from_digest(digest: &[u8]) -> Self {
        Self(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ObjectHash {
    type Err = ManifestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = s.len() == HASH_HEX_LEN
            && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if valid {
            Ok(Self(s.to_owned()))
        } else {
            Err(ManifestError::InvalidHash(s.to_owned()))
        }
    }
}

impl TryFrom<String> for ObjectHash {
    type Error = ManifestError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ObjectHash> for String {
    fn from(hash: ObjectHash) -> Self {
        hash.0
    }
}

impl AsRef<str> for ObjectHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
