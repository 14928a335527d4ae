//! # Asset Documents
//!
//! The persisted JSON shape of an asset:
//!
//! ```json
//! {
//!   "meta": { "ref": "...", "created": "...", "modified": "...", "author": "...", "version": "1.0.0" },
//!   "comment": "",
//!   "tags": [],
//!   "main": "",
//!   "dependencies": [],
//!   "semantics": []
//! }
//! ```
//!
//! `tags` and `dependencies` are sets: every constructor and mutator keeps
//! them sorted ascending with no duplicates. `main` is a resource ref or the
//! empty string.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::AhubError;
use crate::refs;
use crate::temporal::Timestamp;

/// Document format version written by this crate.
pub const ASSET_FORMAT_VERSION: &str = "1.0.0";

/// Bookkeeping fields of an asset document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetMeta {
    /// The asset's own ref.
    #[serde(rename = "ref")]
    pub reference: String,
    pub created: Timestamp,
    pub modified: Timestamp,
    pub author: String,
    /// Document format version, `x.y.z`.
    pub version: String,
}

/// A complete asset document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub meta: AssetMeta,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Primary resource ref, or empty.
    #[serde(default)]
    pub main: String,
    /// Asset and resource refs this asset needs.
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub semantics: Vec<String>,
}

/// Caller-supplied content for create and replace.
///
/// `meta` is owned by the asset graph; a draft only carries the fields a
/// user may edit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDraft {
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub main: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub semantics: Vec<String>,
}

impl AssetDraft {
    /// Draft with only a main resource.
    pub fn with_main(main: impl Into<String>) -> Self {
        Self {
            main: main.into(),
            ..Self::default()
        }
    }

    /// Builder-style dependency list.
    pub fn dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    /// Builder-style tag list.
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

impl Asset {
    /// Build a fresh document stamped `created == modified == now`.
    pub fn new(reference: impl Into<String>, draft: AssetDraft, author: impl Into<String>) -> Self {
        let now = Timestamp::now();
        let mut asset = Self {
            meta: AssetMeta {
                reference: reference.into(),
                created: now,
                modified: now,
                author: author.into(),
                version: ASSET_FORMAT_VERSION.to_string(),
            },
            comment: draft.comment,
            tags: draft.tags,
            main: draft.main,
            dependencies: draft.dependencies,
            semantics: draft.semantics,
        };
        asset.normalize();
        asset
    }

    /// This asset's ref.
    pub fn reference(&self) -> &str {
        &self.meta.reference
    }

    /// The namespace the asset lives in, with a trailing slash.
    pub fn namespace(&self) -> String {
        refs::namespace_of(&self.meta.reference)
    }

    /// Sort and de-duplicate `tags` and `dependencies`.
    pub fn normalize(&mut self) {
        sort_unique(&mut self.tags);
        sort_unique(&mut self.dependencies);
    }

    /// `main` (when set) followed by every dependency.
    pub fn references(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.main.as_str())
            .filter(|main| !main.is_empty())
            .chain(self.dependencies.iter().map(String::as_str))
    }

    /// `main` and `dependencies` as a set.
    pub fn members(&self) -> BTreeSet<String> {
        self.references().map(str::to_string).collect()
    }

    /// True when `reference` is this asset's `main` or one of its dependencies.
    pub fn refers_to(&self, reference: &str) -> bool {
        self.main == reference || self.dependencies.iter().any(|d| d == reference)
    }

    /// Swap `old` for `new` in `dependencies`, keeping the set normalized.
    ///
    /// Returns `false` when `old` was not a dependency. Applying the same
    /// substitution twice is a no-op the second time.
    pub fn replace_dependency(&mut self, old: &str, new: &str) -> bool {
        let before = self.dependencies.len();
        self.dependencies.retain(|d| d != old);
        if self.dependencies.len() == before {
            return false;
        }
        self.dependencies.push(new.to_string());
        sort_unique(&mut self.dependencies);
        true
    }

    /// Overwrite the editable fields from a draft, keeping `meta`.
    pub fn apply(&mut self, draft: AssetDraft) {
        self.comment = draft.comment;
        self.tags = draft.tags;
        self.main = draft.main;
        self.dependencies = draft.dependencies;
        self.semantics = draft.semantics;
        self.normalize();
    }

    /// Bump `modified` to now.
    pub fn touch(&mut self) {
        self.meta.modified = Timestamp::now();
    }

    /// Serialize to a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`AhubError::Json`] if serialization fails.
    pub fn to_value(&self) -> Result<serde_json::Value, AhubError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Parse a JSON value that is known to be an asset document.
    ///
    /// # Errors
    ///
    /// Returns [`AhubError::Corrupt`] if the value does not have the asset shape.
    pub fn from_value(value: serde_json::Value) -> Result<Self, AhubError> {
        let mut asset: Self = serde_json::from_value(value)
            .map_err(|e| AhubError::Corrupt(format!("malformed asset document: {e}")))?;
        asset.normalize();
        Ok(asset)
    }

    /// Parse raw bytes (e.g. a historical revision read from the VCS).
    ///
    /// # Errors
    ///
    /// Returns [`AhubError::Corrupt`] if the bytes are not an asset document.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, AhubError> {
        let value: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|e| AhubError::Corrupt(format!("asset document is not JSON: {e}")))?;
        Self::from_value(value)
    }
}

fn sort_unique(items: &mut Vec<String>) {
    items.sort();
    items.dedup();
}
