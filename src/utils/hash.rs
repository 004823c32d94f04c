//! Content digests used for change detection.
//!
//! A digest only has to answer "did this file change since it was indexed",
//! so the stored form is the lowercase hex of a BLAKE3 hash.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

/// Hex digest of a file's bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for ContentHash {
    fn from(hex: String) -> Self {
        ContentHash(hex)
    }
}

impl From<&str> for ContentHash {
    fn from(hex: &str) -> Self {
        ContentHash(hex.to_string())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hash an in-memory buffer
pub fn hash_bytes(bytes: &[u8]) -> ContentHash {
    ContentHash(blake3::hash(bytes).to_hex().to_string())
}

/// Read a file and hash its contents
pub fn hash_file(path: &Path) -> io::Result<ContentHash> {
    let bytes = fs::read(path)?;
    Ok(hash_bytes(&bytes))
}
