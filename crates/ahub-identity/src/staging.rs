//! # Identity Staging
//!
//! Brings identity sidecars in line with a commit's [`CommitSet`]:
//!
//! 1. every added or modified resource is re-hashed and its sidecar written;
//! 2. every deleted resource loses its sidecar, but only while the asset
//!    graph reports at most one remaining referrer (the asset being removed
//!    in the same commit);
//! 3. the touched sidecar paths come back as their own [`CommitSet`] so the
//!    caller pushes them together with the content paths.
//!
//! Asset documents and sidecar paths in the input are skipped. The first
//! failure of any sub-step aborts the whole operation.

use std::collections::BTreeMap;

use ahub_core::{AhubError, CommitSet, ContentDigest};
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};

use crate::store::{IdentityStore, SidecarWrite};

/// Number of resources hashed at once while staging.
pub const STAGING_CONCURRENCY: usize = 4;

/// How many assets still point at a ref.
///
/// Implemented by the asset graph; declared here so the identity store does
/// not depend on it.
#[async_trait]
pub trait ReferenceCounter: Send + Sync {
    /// Number of assets whose `main` equals or `dependencies` contain `reference`.
    async fn reference_count(&self, reference: &str) -> Result<usize, AhubError>;
}

/// Result of [`IdentityStore::build_and_stage`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityStaging {
    /// Sidecar paths to push: created → add, rewritten → mod, removed → del.
    pub files: CommitSet,
    /// Fresh hash of every re-hashed resource, keyed by ref.
    pub hashes: BTreeMap<String, ContentDigest>,
    /// Deleted resources whose sidecar was kept because other assets still
    /// reference them.
    pub preserved: Vec<String>,
}

impl IdentityStore {
    /// Refresh and prune identities for one commit attempt.
    ///
    /// # Errors
    ///
    /// Any hashing, sidecar or reference-count failure. Sidecars written
    /// before the failure stay on disk.
    pub async fn build_and_stage(
        &self,
        candidates: &CommitSet,
        references: &dyn ReferenceCounter,
    ) -> Result<IdentityStaging, AhubError> {
        let mut staging = IdentityStaging::default();

        let changed = self.resource_refs(
            candidates
                .add_paths
                .iter()
                .chain(&candidates.mod_paths)
                .map(String::as_str),
        )?;
        let mut refreshed: Vec<(String, ContentDigest, SidecarWrite)> = stream::iter(changed)
            .map(|reference| async move {
                let (hash, write) = self.refresh(&reference).await?;
                Ok::<_, AhubError>((reference, hash, write))
            })
            .buffer_unordered(STAGING_CONCURRENCY)
            .try_collect()
            .await?;
        refreshed.sort_by(|a, b| a.0.cmp(&b.0));
        for (reference, hash, write) in refreshed {
            let path = self.codec().identity_path(&reference)?;
            match write {
                SidecarWrite::Created => staging.files.add(path),
                SidecarWrite::Updated => staging.files.modify(path),
            }
            staging.hashes.insert(reference, hash);
        }

        let deleted = self.resource_refs(candidates.del_paths.iter().map(String::as_str))?;
        for reference in deleted {
            let remaining = references.reference_count(&reference).await?;
            if remaining > 1 {
                tracing::debug!(
                    reference = %reference,
                    remaining,
                    "identity kept, resource still referenced"
                );
                staging.preserved.push(reference);
                continue;
            }
            if self.remove(&reference).await? {
                staging.files.delete(self.codec().identity_path(&reference)?);
            }
        }

        tracing::debug!(
            add = staging.files.add_paths.len(),
            modify = staging.files.mod_paths.len(),
            delete = staging.files.del_paths.len(),
            "identity staging built"
        );
        Ok(staging)
    }

    /// Resource refs of the given working-tree paths, de-duplicated in
    /// first-seen order. Asset documents and sidecars are skipped.
    fn resource_refs<'a>(
        &self,
        paths: impl Iterator<Item = &'a str>,
    ) -> Result<Vec<String>, AhubError> {
        let codec = self.codec();
        let mut refs: Vec<String> = Vec::new();
        for path in paths {
            if codec.is_asset_path(path) || codec.is_identity_path(path) {
                continue;
            }
            let reference = codec.relative_path_to_ref(path)?;
            if !refs.contains(&reference) {
                refs.push(reference);
            }
        }
        Ok(refs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use ahub_core::{sha256_hex, LocalFilesystem, RefCodec};

    struct FixedCounts(HashMap<String, usize>);

    #[async_trait]
    impl ReferenceCounter for FixedCounts {
        async fn reference_count(&self, reference: &str) -> Result<usize, AhubError> {
            Ok(self.0.get(reference).copied().unwrap_or(0))
        }
    }

    fn store() -> (tempfile::TempDir, IdentityStore) {
        let dir = tempfile::tempdir().unwrap();
        let fs = Arc::new(LocalFilesystem::new(dir.path()));
        (dir, IdentityStore::new(fs, RefCodec::default()))
    }

    fn set(add: &[&str], modify: &[&str], delete: &[&str]) -> CommitSet {
        let mut set = CommitSet::new();
        add.iter().for_each(|p| set.add(*p));
        modify.iter().for_each(|p| set.modify(*p));
        delete.iter().for_each(|p| set.delete(*p));
        set
    }

    #[tokio::test]
    async fn hashes_added_and_modified_resources() {
        let (dir, store) = store();
        std::fs::write(dir.path().join("new.png"), b"new").unwrap();
        std::fs::write(dir.path().join("old.png"), b"old").unwrap();
        store.refresh("/resources/old.png").await.unwrap();
        std::fs::write(dir.path().join("old.png"), b"old, edited").unwrap();

        let staging = store
            .build_and_stage(
                &set(&["new.png", "assets/a.level"], &["old.png"], &[]),
                &FixedCounts(HashMap::new()),
            )
            .await
            .unwrap();

        assert_eq!(staging.files.add_paths, vec![".ahub/identity/new.png.json"]);
        assert_eq!(staging.files.mod_paths, vec![".ahub/identity/old.png.json"]);
        assert_eq!(
            staging.hashes["/resources/old.png"].to_hex(),
            sha256_hex(b"old, edited")
        );
        assert!(!staging.hashes.contains_key("/resources/assets/a.level"));
    }

    #[tokio::test]
    async fn removes_identity_of_last_reference_only() {
        let (_dir, store) = store();
        let digest = ContentDigest::of(b"x");
        store.set("/resources/solo.png", digest).await.unwrap();
        store.set("/resources/shared.png", digest).await.unwrap();
        let counts = FixedCounts(HashMap::from([
            ("/resources/solo.png".to_string(), 1),
            ("/resources/shared.png".to_string(), 2),
        ]));

        let staging = store
            .build_and_stage(&set(&[], &[], &["solo.png", "shared.png"]), &counts)
            .await
            .unwrap();

        assert_eq!(staging.files.del_paths, vec![".ahub/identity/solo.png.json"]);
        assert_eq!(staging.preserved, vec!["/resources/shared.png"]);
        assert!(store.get("/resources/solo.png").await.unwrap().is_none());
        assert!(store.get("/resources/shared.png").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn missing_sidecar_on_delete_is_ignored() {
        let (_dir, store) = store();
        let staging = store
            .build_and_stage(&set(&[], &[], &["gone.png"]), &FixedCounts(HashMap::new()))
            .await
            .unwrap();
        assert!(staging.files.is_empty());
    }

    #[tokio::test]
    async fn missing_bytes_fail_the_whole_staging() {
        let (_dir, store) = store();
        let err = store
            .build_and_stage(&set(&["absent.png"], &[], &[]), &FixedCounts(HashMap::new()))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn sidecar_paths_in_input_are_skipped() {
        let (_dir, store) = store();
        let staging = store
            .build_and_stage(
                &set(&[".ahub/identity/x.png.json"], &[], &[]),
                &FixedCounts(HashMap::new()),
            )
            .await
            .unwrap();
        assert!(staging.files.is_empty());
        assert!(staging.hashes.is_empty());
    }
}
