//! # Content Digest
//!
//! SHA-256 fingerprints of resource bytes. The identity store persists these
//! as 64-character lowercase hex strings; [`ContentDigest`] is the parsed
//! form and refuses anything else.
//!
//! [`StreamingDigest`] accumulates a digest chunk by chunk so callers can hash
//! arbitrarily large files with a fixed-size buffer.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::AhubError;

/// A SHA-256 content digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    /// Wrap raw digest bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The raw 32-byte digest value.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Render the digest as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a 64-character hex string.
    ///
    /// # Errors
    ///
    /// Returns [`AhubError::Corrupt`] for wrong length or non-hex characters.
    pub fn from_hex(s: &str) -> Result<Self, AhubError> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| AhubError::Corrupt(format!("invalid sha-256 digest {s:?}: {e}")))?;
        Ok(Self(bytes))
    }

    /// Digest of an in-memory byte slice.
    pub fn of(data: &[u8]) -> Self {
        let mut digest = StreamingDigest::new();
        digest.update(data);
        digest.finalize()
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for ContentDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::from_hex(&raw).map_err(serde::de::Error::custom)
    }
}

/// Incremental SHA-256 accumulator.
#[derive(Clone, Default)]
pub struct StreamingDigest {
    hasher: Sha256,
}

impl std::fmt::Debug for StreamingDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingDigest").finish_non_exhaustive()
    }
}

impl StreamingDigest {
    /// Start an empty digest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk.
    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
    }

    /// Consume the accumulator and produce the digest.
    pub fn finalize(self) -> ContentDigest {
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&self.hasher.finalize());
        ContentDigest(bytes)
    }
}

/// SHA-256 hex string of an in-memory byte slice.
pub fn sha256_hex(data: &[u8]) -> String {
    ContentDigest::of(data).to_hex()
}
