//! # ahub-workspace — Workspace, Subscriptions and Commits
//!
//! The layer that ties an [`ahub_graph::AssetGraph`] to a VCS working tree.
//!
//! ## Modules
//!
//! - [`config`]: [`WorkspaceConfig`] from YAML, environment and defaults.
//! - [`lock`]: the non-blocking single-writer [`WorkspaceLock`].
//! - [`properties`]: the persisted stage and subscriptions.
//! - [`subscription`]: ASSET, NAMESPACE and SEARCH subscriptions.
//! - [`commit`]: the [`CommitReconciler`].
//! - [`workspace`]: [`Workspace`], which runs stage, subscribe and commit
//!   under the lock.
//!
//! ## Crate Policy
//!
//! - Only the graph writes assets and only the identity store writes
//!   sidecars; this crate orchestrates them.
//! - Dependency pulls and reconciliation run sequentially.

pub mod commit;
pub mod config;
pub mod lock;
pub mod properties;
pub mod subscription;
pub mod workspace;

pub use commit::{CommitReconciler, SubscriptionScope};
pub use config::{ConfigError, ConfigFile, WorkspaceConfig};
pub use lock::{WorkspaceGuard, WorkspaceLock};
pub use properties::{PropertiesStore, WorkspaceProperties};
pub use subscription::{Subscription, SubscriptionKind};
pub use workspace::{CommitOutcome, Subscribed, Workspace};
