//! # Workspace
//!
//! One working tree: its configuration, the asset graph over it, the VCS
//! adapter, and the persisted stage and subscriptions.
//!
//! Stage edits, subscription changes and commits take the workspace lock
//! and fail with [`AhubError::Locked`] while another one is in flight.
//! Reads (graph queries, the commit preview, branch listings) do not.

use std::collections::BTreeSet;
use std::sync::Arc;

use ahub_core::{
    refs, AhubError, BranchList, CommitLogEntry, CommitSet, Filesystem, LogQuery, PushRequest,
    VcsAdapter,
};
use ahub_graph::{AssetGraph, AssetIndex, ValidationRecord};
use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

use crate::commit::{CommitReconciler, SubscriptionScope};
use crate::config::WorkspaceConfig;
use crate::lock::WorkspaceLock;
use crate::properties::{PropertiesStore, WorkspaceProperties};
use crate::subscription::{Subscription, SubscriptionKind};

/// Result of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitOutcome {
    pub commit_id: String,
    /// Content paths chosen by the reconciler.
    pub commit_set: CommitSet,
    /// Identity sidecar paths pushed alongside.
    pub identity_files: CommitSet,
    /// Deleted resources whose identity was kept for other referrers.
    pub preserved: Vec<String>,
}

/// Result of [`Workspace::subscribe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscribed {
    pub subscription: Subscription,
    /// Resources materialized by the subscription.
    pub pulled: Vec<String>,
}

/// A working tree under asset management.
pub struct Workspace {
    config: WorkspaceConfig,
    vcs: Arc<dyn VcsAdapter>,
    graph: AssetGraph,
    store: PropertiesStore,
    properties: Mutex<WorkspaceProperties>,
    lock: WorkspaceLock,
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("config", &self.config)
            .field("backend", &self.vcs.backend())
            .finish_non_exhaustive()
    }
}

impl Workspace {
    /// Build the components and load the persisted properties.
    ///
    /// # Errors
    ///
    /// Schema setup failures and an unreadable properties document.
    pub async fn open(
        config: WorkspaceConfig,
        fs: Arc<dyn Filesystem>,
        vcs: Arc<dyn VcsAdapter>,
        index: Arc<dyn AssetIndex>,
    ) -> Result<Self, AhubError> {
        let graph =
            AssetGraph::new(Arc::clone(&fs), index, config.codec())?.with_author(&config.author);
        let store = PropertiesStore::new(fs, &config.properties_path);
        let properties = store.load().await?;
        tracing::debug!(
            root = %config.root.display(),
            staged = properties.stage.len(),
            subscriptions = properties.subscriptions.len(),
            "workspace opened"
        );
        Ok(Self {
            config,
            vcs,
            graph,
            store,
            properties: Mutex::new(properties),
            lock: WorkspaceLock::new(),
        })
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    pub fn graph(&self) -> &AssetGraph {
        &self.graph
    }

    pub fn vcs(&self) -> &Arc<dyn VcsAdapter> {
        &self.vcs
    }

    pub fn lock(&self) -> &WorkspaceLock {
        &self.lock
    }

    // -----------------------------------------------------------------
    // Stage
    // -----------------------------------------------------------------

    pub fn staged(&self) -> Vec<String> {
        self.properties.lock().stage.clone()
    }

    /// Add asset or namespace refs to the stage. Returns the new stage.
    ///
    /// # Errors
    ///
    /// [`AhubError::Corrupt`] for any ref that is neither, before anything
    /// is staged.
    pub async fn stage(&self, references: &[String]) -> Result<Vec<String>, AhubError> {
        let _guard = self.lock.try_acquire("stage")?;
        if let Some(bad) = references
            .iter()
            .find(|r| !refs::is_valid_asset_ref(r) && !refs::is_valid_namespace_ref(r))
        {
            return Err(AhubError::Corrupt(format!(
                "{bad} is neither an asset nor a namespace ref"
            )));
        }
        let props = self
            .update(|props| {
                props.stage(references.iter().cloned());
            })
            .await?;
        Ok(props.stage)
    }

    /// Remove refs from the stage. Returns the new stage.
    pub async fn unstage(&self, references: &[String]) -> Result<Vec<String>, AhubError> {
        let _guard = self.lock.try_acquire("unstage")?;
        let props = self
            .update(|props| {
                props.unstage(references);
            })
            .await?;
        Ok(props.stage)
    }

    pub async fn clear_stage(&self) -> Result<(), AhubError> {
        let _guard = self.lock.try_acquire("clear the stage")?;
        self.update(WorkspaceProperties::clear_stage).await?;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------

    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.properties.lock().subscriptions.clone()
    }

    /// Validate, persist and pull a new subscription.
    ///
    /// The subscription stays persisted when the pull fails; a later
    /// [`Workspace::pull`] retries it.
    pub async fn subscribe(&self, kind: SubscriptionKind) -> Result<Subscribed, AhubError> {
        let _guard = self.lock.try_acquire("subscribe")?;
        kind.validate_descriptor(&self.graph).await?;
        let subscription = Subscription::new(kind);
        self.update(|props| props.subscriptions.push(subscription.clone()))
            .await?;
        tracing::info!(
            id = %subscription.id,
            kind = subscription.kind.type_name(),
            descriptor = subscription.kind.descriptor(),
            "subscribed"
        );
        let pulled = subscription
            .kind
            .pull_dependencies(&self.graph, self.vcs.as_ref())
            .await?;
        Ok(Subscribed {
            subscription,
            pulled,
        })
    }

    /// Drop a subscription. Already materialized files stay.
    ///
    /// # Errors
    ///
    /// [`AhubError::NotFound`] for an unknown id.
    pub async fn unsubscribe(&self, id: Uuid) -> Result<Subscription, AhubError> {
        let _guard = self.lock.try_acquire("unsubscribe")?;
        if self.properties.lock().subscription(id).is_none() {
            return Err(AhubError::NotFound(format!("subscription {id}")));
        }
        let mut removed = None;
        self.update(|props| removed = props.remove_subscription(id))
            .await?;
        removed.ok_or_else(|| AhubError::NotFound(format!("subscription {id}")))
    }

    /// Pull missing dependencies of every subscription, in order.
    pub async fn pull(&self) -> Result<Vec<String>, AhubError> {
        let _guard = self.lock.try_acquire("pull")?;
        let mut pulled = Vec::new();
        for subscription in self.subscriptions() {
            pulled.extend(
                subscription
                    .kind
                    .pull_dependencies(&self.graph, self.vcs.as_ref())
                    .await?,
            );
        }
        Ok(pulled)
    }

    /// Bare validation of every subscription's assets.
    pub async fn validate_subscriptions(&self) -> Result<Vec<ValidationRecord>, AhubError> {
        let mut records = Vec::new();
        for subscription in self.subscriptions() {
            records.extend(
                subscription
                    .kind
                    .validate_dependencies(&self.graph, self.vcs.as_ref())
                    .await?,
            );
        }
        Ok(records)
    }

    // -----------------------------------------------------------------
    // Commit
    // -----------------------------------------------------------------

    /// The commit set the next commit would push, without locking.
    pub async fn commit_set(&self) -> Result<CommitSet, AhubError> {
        let stage = self.staged();
        let scope = self.subscription_scope().await?;
        CommitReconciler::new(&self.graph, self.vcs.as_ref())
            .reconcile(&stage, &scope)
            .await
    }

    /// Commit the stage.
    ///
    /// The reconciled set drives both the content paths and the identity
    /// sidecar staging; both go out in one push. The stage is cleared only
    /// after the push succeeds.
    ///
    /// # Errors
    ///
    /// [`AhubError::Locked`] while another mutation runs,
    /// [`AhubError::PreconditionFailed`] when there is nothing to commit,
    /// and any reconcile, identity or push failure.
    pub async fn commit(&self, message: &str, branch: &str) -> Result<CommitOutcome, AhubError> {
        let _guard = self.lock.try_acquire("commit")?;
        let stage = self.staged();
        let scope = self.subscription_scope().await?;
        let commit_set = CommitReconciler::new(&self.graph, self.vcs.as_ref())
            .reconcile(&stage, &scope)
            .await?;
        if commit_set.is_empty() {
            return Err(AhubError::PreconditionFailed(
                "nothing to commit for the staged refs".to_string(),
            ));
        }

        let staging = self
            .graph
            .identity()
            .build_and_stage(&commit_set, &self.graph)
            .await?;
        let mut files = commit_set.clone();
        files.merge(&staging.files);
        let request = PushRequest {
            files,
            message: message.to_string(),
            branch: branch.to_string(),
        };
        let commit_id = self.vcs.push_files(&request).await?;
        self.update(WorkspaceProperties::clear_stage).await?;

        tracing::info!(
            commit = %commit_id,
            branch,
            paths = request.files.len(),
            "committed"
        );
        Ok(CommitOutcome {
            commit_id,
            commit_set,
            identity_files: staging.files,
            preserved: staging.preserved,
        })
    }

    // -----------------------------------------------------------------
    // Branches and history
    // -----------------------------------------------------------------

    pub async fn current_branch(&self) -> Result<String, AhubError> {
        self.vcs.get_current_branch().await
    }

    pub async fn branches(&self) -> Result<BranchList, AhubError> {
        self.vcs.get_branch_list().await
    }

    pub async fn create_branch(&self, name: &str) -> Result<(), AhubError> {
        self.vcs.create_branch(name).await
    }

    pub async fn delete_branch(&self, name: &str) -> Result<(), AhubError> {
        self.vcs.delete_branch(name).await
    }

    /// Switch branches and rebuild the index from the new tree.
    pub async fn change_branch(&self, name: &str) -> Result<(), AhubError> {
        let _guard = self.lock.try_acquire("change branch")?;
        self.vcs.change_branch(name).await?;
        let report = self.graph.reindex().await?;
        tracing::info!(branch = name, indexed = report.indexed.len(), "branch changed");
        Ok(())
    }

    /// Commit history, optionally restricted to the file behind `reference`.
    pub async fn history(
        &self,
        reference: Option<&str>,
        start_revision: Option<String>,
        max_results: Option<usize>,
    ) -> Result<Vec<CommitLogEntry>, AhubError> {
        let path = match reference {
            Some(r) => Some(self.graph.codec().ref_to_relative_path(r)?),
            None => None,
        };
        self.vcs
            .get_commit_log(&LogQuery {
                path,
                start_revision,
                max_results,
            })
            .await
    }

    pub async fn project_id(&self) -> Result<String, AhubError> {
        self.vcs.get_project_id().await
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    /// Dependencies of every subscription, or `None` without subscriptions.
    async fn subscription_scope(&self) -> Result<SubscriptionScope, AhubError> {
        let subscriptions = self.subscriptions();
        if subscriptions.is_empty() {
            return Ok(None);
        }
        let mut scope = BTreeSet::new();
        for subscription in &subscriptions {
            match subscription
                .kind
                .list_dependencies(&self.graph, self.vcs.as_ref())
                .await
            {
                Ok(dependencies) => scope.extend(dependencies),
                Err(e) if e.is_not_found() => {
                    tracing::warn!(
                        id = %subscription.id,
                        descriptor = subscription.kind.descriptor(),
                        "subscription resolves to nothing"
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Ok(Some(scope))
    }

    /// Apply `change` to a copy of the properties, persist it, then publish.
    async fn update(
        &self,
        change: impl FnOnce(&mut WorkspaceProperties),
    ) -> Result<WorkspaceProperties, AhubError> {
        let mut next = self.properties.lock().clone();
        change(&mut next);
        self.store.save(&next).await?;
        *self.properties.lock() = next.clone();
        Ok(next)
    }
}
