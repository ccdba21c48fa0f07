#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! BLAKE3 content addressing for concrete specs
//!
//! A concrete node is identified by the digest of its canonical form: its
//! own build parameters plus the full hashes of its direct dependencies.
//! Since children are hashed first, any change deep in a DAG changes the
//! hash of every ancestor and of nothing else.

use serde::{Deserialize, Serialize};
use spackle_errors::{Error, HashError};
use std::collections::BTreeMap;
use std::fmt;

/// Length of the hash prefix shown by default
pub const SHORT_HASH_LEN: usize = 7;

/// A BLAKE3 hash value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash {
    bytes: [u8; 32],
}

impl Hash {
    /// Create a hash from raw bytes
    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Get the raw bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Convert to hex string
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// The first `len` hex characters, for display
    #[must_use]
    pub fn short(&self, len: usize) -> String {
        let mut hex = self.to_hex();
        hex.truncate(len);
        hex
    }

    /// Whether the hex form starts with `prefix` (case-insensitive)
    #[must_use]
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        self.to_hex().starts_with(&prefix.to_ascii_lowercase())
    }

    /// Parse from hex string
    ///
    /// # Errors
    /// Returns an error if the input string is not valid hexadecimal or is not exactly 64 characters (32 bytes).
    pub fn from_hex(s: &str) -> Result<Self, Error> {
        let bytes = hex::decode(s).map_err(|e| HashError::InvalidHex {
            message: e.to_string(),
        })?;

        if bytes.len() != 32 {
            return Err(HashError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            }
            .into());
        }

        let mut array = [0u8; 32];
        array.copy_from_slice(&bytes);
        Ok(Self::from_bytes(array))
    }

    /// Compute hash of a byte slice
    #[must_use]
    pub fn from_data(data: &[u8]) -> Self {
        let hash = blake3::hash(data);
        Self::from_bytes(*hash.as_bytes())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Hash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Compiler entry of a canonical node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalCompiler {
    pub name: String,
    pub version: String,
}

/// Dependency entry of a canonical node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalDependency {
    pub name: String,
    pub types: String,
    pub hash: String,
}

/// The hashed form of one concrete node
///
/// Variant values are already rendered (`true`/`false`, or sorted values
/// joined by commas). Dependencies are sorted by name before digesting, so
/// construction order does not matter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalNode {
    pub name: String,
    pub version: String,
    pub compiler: CanonicalCompiler,
    pub arch: String,
    pub variants: BTreeMap<String, String>,
    pub dependencies: Vec<CanonicalDependency>,
}

impl CanonicalNode {
    /// Serialize canonically and digest
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn digest(&self) -> Result<Hash, Error> {
        let mut node = self.clone();
        node.dependencies.sort_by(|a, b| a.name.cmp(&b.name));
        let bytes = serde_json::to_vec(&node)?;
        Ok(Hash::from_data(&bytes))
    }
}
