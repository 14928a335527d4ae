//! # Identity Store
//!
//! One sidecar JSON document per resource, `{ "hash": "<sha-256 hex>" }`,
//! mirrored under the identity root. An identity lets a workspace tell
//! whether a resource changed without holding its bytes, which is what makes
//! partial checkouts workable.
//!
//! Absence of a sidecar means "never hashed" and is not an error for
//! [`IdentityStore::get`]. [`IdentityStore::compare`] is the one place where
//! the two absence conditions (no sidecar, no bytes) stay distinguishable:
//! they carry the stable codes [`CompareError::NO_IDENTITY`] and
//! [`CompareError::NO_RESOURCE`].

use std::sync::Arc;

use ahub_core::{AhubError, ContentDigest, Filesystem, RefCodec};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hash::hash_path;

/// Persisted sidecar shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub hash: ContentDigest,
}

/// What a write did to the sidecar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidecarWrite {
    /// No sidecar existed.
    Created,
    /// A sidecar existed and was rewritten.
    Updated,
}

/// Failure of [`IdentityStore::compare`].
#[derive(Error, Debug)]
pub enum CompareError {
    /// No sidecar is recorded for the resource.
    #[error("no identity recorded for {0}")]
    NoIdentity(String),

    /// The sidecar exists but the resource bytes are not on disk.
    #[error("resource {0} is not present in the working tree")]
    NoResource(String),

    /// Anything else: bad ref, unreadable sidecar, adapter failure.
    #[error(transparent)]
    Store(#[from] AhubError),
}

impl CompareError {
    pub const NO_IDENTITY: u8 = 1;
    pub const NO_RESOURCE: u8 = 2;

    /// Stable numeric code; `0` for failures that are not an absence.
    pub fn code(&self) -> u8 {
        match self {
            Self::NoIdentity(_) => Self::NO_IDENTITY,
            Self::NoResource(_) => Self::NO_RESOURCE,
            Self::Store(_) => 0,
        }
    }
}

/// Sidecar-backed resource fingerprints.
#[derive(Clone)]
pub struct IdentityStore {
    fs: Arc<dyn Filesystem>,
    codec: RefCodec,
}

impl std::fmt::Debug for IdentityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityStore")
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}

impl IdentityStore {
    pub fn new(fs: Arc<dyn Filesystem>, codec: RefCodec) -> Self {
        Self { fs, codec }
    }

    pub fn codec(&self) -> &RefCodec {
        &self.codec
    }

    /// Stream the resource's current bytes through SHA-256.
    ///
    /// # Errors
    ///
    /// [`AhubError::Corrupt`] for a non-resource ref; the adapter's
    /// `NotFound` I/O error when the bytes are absent.
    pub async fn hash(&self, reference: &str) -> Result<ContentDigest, AhubError> {
        let path = self.codec.ref_to_relative_path(reference)?;
        hash_path(self.fs.as_ref(), &path).await
    }

    /// True when the resource bytes are present locally.
    pub async fn resource_exists(&self, reference: &str) -> Result<bool, AhubError> {
        let path = self.codec.ref_to_relative_path(reference)?;
        self.fs.exists(&path).await
    }

    /// True when a sidecar is recorded for the resource.
    pub async fn has_identity(&self, reference: &str) -> Result<bool, AhubError> {
        let path = self.codec.identity_path(reference)?;
        self.fs.exists(&path).await
    }

    /// The stored hash, or `None` when no sidecar exists.
    ///
    /// # Errors
    ///
    /// [`AhubError::Corrupt`] when the sidecar is not a valid identity record.
    pub async fn get(&self, reference: &str) -> Result<Option<ContentDigest>, AhubError> {
        let path = self.codec.identity_path(reference)?;
        let value = match self.fs.read_json(&path).await {
            Ok(value) => value,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        let record: IdentityRecord = serde_json::from_value(value)
            .map_err(|e| AhubError::Corrupt(format!("identity sidecar {path}: {e}")))?;
        Ok(Some(record.hash))
    }

    /// Persist `hash` as the resource's identity.
    pub async fn set(
        &self,
        reference: &str,
        hash: ContentDigest,
    ) -> Result<SidecarWrite, AhubError> {
        let path = self.codec.identity_path(reference)?;
        let existed = self.fs.exists(&path).await?;
        let value = serde_json::to_value(IdentityRecord { hash })?;
        self.fs.write_json(&path, &value).await?;
        tracing::debug!(reference = %reference, path = %path, hash = %hash, "identity written");
        Ok(if existed {
            SidecarWrite::Updated
        } else {
            SidecarWrite::Created
        })
    }

    /// Hash the resource's current bytes and persist the result.
    pub async fn refresh(
        &self,
        reference: &str,
    ) -> Result<(ContentDigest, SidecarWrite), AhubError> {
        let hash = self.hash(reference).await?;
        let write = self.set(reference, hash).await?;
        Ok((hash, write))
    }

    /// Delete the sidecar. Returns `false` when there was none.
    pub async fn remove(&self, reference: &str) -> Result<bool, AhubError> {
        let path = self.codec.identity_path(reference)?;
        match self.fs.remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(reference = %reference, path = %path, "identity removed");
                Ok(true)
            }
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Does the stored identity match the resource's current bytes?
    ///
    /// When both the sidecar and the bytes are missing, the missing sidecar
    /// wins and the result is [`CompareError::NoIdentity`].
    pub async fn compare(&self, reference: &str) -> Result<bool, CompareError> {
        let (stored, live) = futures::join!(self.get(reference), self.hash(reference));
        let Some(stored) = stored? else {
            return Err(CompareError::NoIdentity(reference.to_string()));
        };
        match live {
            Ok(live) => Ok(stored == live),
            Err(e) if e.is_not_found() => Err(CompareError::NoResource(reference.to_string())),
            Err(e) => Err(CompareError::Store(e)),
        }
    }
}
