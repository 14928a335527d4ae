//! # Commit Reconciler
//!
//! Turns the VCS status feed, the stage and the subscriptions into the
//! [`CommitSet`] of one commit attempt.
//!
//! Staged refs are processed one at a time. For each, the staged asset is
//! resolved from the index or, once deleted locally, from the last
//! committed content, so that its `main`/`dependencies` are known even
//! when the document is gone. Status entries are then matched:
//!
//! | Entry | Included when |
//! |---|---|
//! | asset, NEW/MODIFIED/RENAMED | the ref is the staged ref or lies below a staged namespace |
//! | resource, NEW/MODIFIED/RENAMED | the ref is a member of the staged asset |
//! | DELETED | the ref is the staged ref or a member; with object storage, members must also be inside the subscriptions' scope |
//!
//! Identity sidecar entries are never matched here; the Identity Store
//! stages those from the resulting set.

use std::collections::BTreeSet;

use ahub_core::{
    refs, AhubError, Asset, CommitSet, FileStatus, StatusEntry, VcsAdapter, VcsBackend,
};
use ahub_graph::AssetGraph;

use crate::subscription::resolve_asset;

/// Resources the active subscriptions depend on.
///
/// `None` means no subscription is active and everything is in scope.
pub type SubscriptionScope = Option<BTreeSet<String>>;

/// Reconciles VCS status with the stage for one commit attempt.
pub struct CommitReconciler<'a> {
    graph: &'a AssetGraph,
    vcs: &'a dyn VcsAdapter,
}

impl<'a> CommitReconciler<'a> {
    pub fn new(graph: &'a AssetGraph, vcs: &'a dyn VcsAdapter) -> Self {
        Self { graph, vcs }
    }

    /// Compute the paths to add, modify and delete.
    ///
    /// # Errors
    ///
    /// Adapter failures, and [`AhubError::Corrupt`] for a staged ref that is
    /// neither an asset nor a namespace.
    pub async fn reconcile(
        &self,
        stage: &[String],
        scope: &SubscriptionScope,
    ) -> Result<CommitSet, AhubError> {
        let status = self.vcs.get_status().await?;
        let backend = self.vcs.backend();
        let mut set = CommitSet::new();
        // Sequential: later entries may depend on VCS state read by earlier ones.
        for staged in stage {
            let members = self.staged_members(staged).await?;
            for entry in &status {
                self.classify(staged, &members, entry, backend, scope, &mut set);
            }
        }
        tracing::info!(
            staged = stage.len(),
            add = set.add_paths.len(),
            modify = set.mod_paths.len(),
            delete = set.del_paths.len(),
            "commit set reconciled"
        );
        Ok(set)
    }

    /// `main` and dependencies of the staged asset, or of every asset below
    /// a staged namespace.
    async fn staged_members(&self, staged: &str) -> Result<BTreeSet<String>, AhubError> {
        if refs::is_valid_namespace_ref(staged) {
            let assets = self.graph.list_all(staged).await?;
            return Ok(assets.iter().flat_map(Asset::members).collect());
        }
        if !refs::is_valid_asset_ref(staged) {
            return Err(AhubError::Corrupt(format!(
                "{staged} is neither an asset nor a namespace ref"
            )));
        }
        Ok(self
            .resolve(staged)
            .await?
            .map(|asset| asset.members())
            .unwrap_or_default())
    }

    /// The staged asset from the index, else from HEAD. `None` when it was
    /// never committed either.
    async fn resolve(&self, staged: &str) -> Result<Option<Asset>, AhubError> {
        resolve_asset(self.graph, self.vcs, staged).await
    }

    fn classify(
        &self,
        staged: &str,
        members: &BTreeSet<String>,
        entry: &StatusEntry,
        backend: VcsBackend,
        scope: &SubscriptionScope,
        set: &mut CommitSet,
    ) {
        let codec = self.graph.codec();
        if codec.is_identity_path(&entry.path) {
            return;
        }
        let Some(reference) = entry
            .reference
            .clone()
            .or_else(|| codec.relative_path_to_ref(&entry.path).ok())
        else {
            return;
        };
        let is_staged = reference == staged || refs::is_child_of(&reference, staged);

        match entry.status {
            FileStatus::Deleted => {
                let member = members.contains(&reference)
                    && match (backend, scope) {
                        (VcsBackend::ObjectStorage, Some(scope)) => scope.contains(&reference),
                        _ => true,
                    };
                if is_staged || member {
                    set.delete(entry.path.clone());
                }
            }
            FileStatus::New | FileStatus::Modified | FileStatus::Renamed => {
                let include = if refs::is_asset_ref(&reference) {
                    is_staged
                } else {
                    members.contains(&reference)
                };
                if !include {
                    return;
                }
                if entry.status == FileStatus::Modified {
                    set.modify(entry.path.clone());
                } else {
                    set.add(entry.path.clone());
                }
            }
        }
    }
}
