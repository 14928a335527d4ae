//! # Subscriptions
//!
//! A subscription declares which part of the asset graph a partial checkout
//! cares about. It is one of three variants, each answering the same
//! questions: is the descriptor valid, which assets does it cover, which
//! refs do those assets depend on, and are those dependencies present.
//!
//! Serialized form: `{ "id": "<uuid>", "type": "ASSET" | "NAMESPACE" |
//! "SEARCH", "descriptor": "<string>" }`.

use std::collections::{BTreeSet, VecDeque};

use ahub_core::{refs, AhubError, Asset, Revision, VcsAdapter};
use ahub_graph::{AssetGraph, ValidationRecord};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a subscription selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionKind {
    /// One asset ref.
    Asset(String),
    /// Every asset below a namespace ref.
    Namespace(String),
    /// Every asset matching a search string.
    Search(String),
}

impl SubscriptionKind {
    pub fn descriptor(&self) -> &str {
        match self {
            Self::Asset(d) | Self::Namespace(d) | Self::Search(d) => d,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Asset(_) => "ASSET",
            Self::Namespace(_) => "NAMESPACE",
            Self::Search(_) => "SEARCH",
        }
    }

    /// Check the descriptor against the variant's grammar.
    ///
    /// # Errors
    ///
    /// [`AhubError::Corrupt`] for a malformed asset ref, namespace ref, or
    /// a search string the graph cannot evaluate.
    pub async fn validate_descriptor(&self, graph: &AssetGraph) -> Result<(), AhubError> {
        match self {
            Self::Asset(reference) if refs::is_valid_asset_ref(reference) => Ok(()),
            Self::Asset(reference) => Err(AhubError::Corrupt(format!(
                "{reference} is not an asset ref"
            ))),
            Self::Namespace(namespace) if refs::is_valid_namespace_ref(namespace) => Ok(()),
            Self::Namespace(namespace) => Err(AhubError::Corrupt(format!(
                "{namespace} is not a namespace ref"
            ))),
            Self::Search(q) => graph.search_all(q).await.map(|_| ()),
        }
    }

    /// Assets covered by this subscription.
    ///
    /// An ASSET subscription whose document is missing from the working
    /// tree falls back to the last committed content.
    pub async fn list_assets(
        &self,
        graph: &AssetGraph,
        vcs: &dyn VcsAdapter,
    ) -> Result<Vec<Asset>, AhubError> {
        match self {
            Self::Asset(reference) => match resolve_asset(graph, vcs, reference).await? {
                Some(asset) => Ok(vec![asset]),
                None => Err(AhubError::NotFound(reference.clone())),
            },
            Self::Namespace(namespace) => graph.list_all(namespace).await,
            Self::Search(q) => graph.search_all(q).await,
        }
    }

    /// Every ref reachable from the covered assets through `main` and
    /// `dependencies`, following asset-to-asset edges transitively.
    ///
    /// Each asset is expanded once. A dependency asset missing from both
    /// the index and HEAD stays in the result but contributes nothing.
    pub async fn list_dependencies(
        &self,
        graph: &AssetGraph,
        vcs: &dyn VcsAdapter,
    ) -> Result<BTreeSet<String>, AhubError> {
        let roots = self.list_assets(graph, vcs).await?;
        let mut expanded: BTreeSet<String> =
            roots.iter().map(|a| a.reference().to_string()).collect();
        let mut queue: VecDeque<Asset> = roots.into();
        let mut closure = BTreeSet::new();
        while let Some(asset) = queue.pop_front() {
            for reference in asset.references() {
                closure.insert(reference.to_string());
                if !refs::is_valid_asset_ref(reference) || !expanded.insert(reference.to_string()) {
                    continue;
                }
                match resolve_asset(graph, vcs, reference).await? {
                    Some(next) => queue.push_back(next),
                    None => tracing::debug!(reference = %reference, "dependency asset not found"),
                }
            }
        }
        Ok(closure)
    }

    /// Existence check of the covered assets' dependencies.
    pub async fn validate_dependencies(
        &self,
        graph: &AssetGraph,
        vcs: &dyn VcsAdapter,
    ) -> Result<Vec<ValidationRecord>, AhubError> {
        let assets = self.list_assets(graph, vcs).await?;
        Ok(graph.run_bare_validation(&assets).await)
    }

    /// Fetch every resource in the dependency closure whose bytes are
    /// missing locally but whose identity sidecar is present. Returns the
    /// refs pulled.
    pub async fn pull_dependencies(
        &self,
        graph: &AssetGraph,
        vcs: &dyn VcsAdapter,
    ) -> Result<Vec<String>, AhubError> {
        let identity = graph.identity();
        let mut pulled = Vec::new();
        // One pull at a time: the VCS working tree has a single writer.
        for reference in self.list_dependencies(graph, vcs).await? {
            if !refs::is_resource_ref(&reference) {
                continue;
            }
            if identity.resource_exists(&reference).await? {
                continue;
            }
            if !identity.has_identity(&reference).await? {
                tracing::debug!(reference = %reference, "dependency has no identity, not pulled");
                continue;
            }
            let path = graph.codec().ref_to_relative_path(&reference)?;
            vcs.pull_file(&path).await?;
            tracing::info!(reference = %reference, "pulled dependency");
            pulled.push(reference);
        }
        Ok(pulled)
    }
}

/// An asset from the index, else from HEAD. `None` when neither has it.
pub(crate) async fn resolve_asset(
    graph: &AssetGraph,
    vcs: &dyn VcsAdapter,
    reference: &str,
) -> Result<Option<Asset>, AhubError> {
    match graph.get_one(reference).await {
        Ok(asset) => return Ok(Some(asset)),
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e),
    }
    let path = graph.codec().ref_to_relative_path(reference)?;
    match vcs.read(&path, &Revision::Head).await {
        Ok(bytes) => {
            tracing::debug!(reference = %reference, "asset resolved from HEAD");
            Asset::from_slice(&bytes).map(Some)
        }
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// A persisted subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "SubscriptionRecord", try_from = "SubscriptionRecord")]
pub struct Subscription {
    pub id: Uuid,
    pub kind: SubscriptionKind,
}

impl Subscription {
    /// A subscription with a fresh id.
    pub fn new(kind: SubscriptionKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
enum SubscriptionType {
    Asset,
    Namespace,
    Search,
}

#[derive(Serialize, Deserialize)]
struct SubscriptionRecord {
    id: Uuid,
    #[serde(rename = "type")]
    kind: SubscriptionType,
    descriptor: String,
}

impl From<Subscription> for SubscriptionRecord {
    fn from(subscription: Subscription) -> Self {
        let (kind, descriptor) = match subscription.kind {
            SubscriptionKind::Asset(d) => (SubscriptionType::Asset, d),
            SubscriptionKind::Namespace(d) => (SubscriptionType::Namespace, d),
            SubscriptionKind::Search(d) => (SubscriptionType::Search, d),
        };
        Self {
            id: subscription.id,
            kind,
            descriptor,
        }
    }
}

impl TryFrom<SubscriptionRecord> for Subscription {
    type Error = String;

    fn try_from(record: SubscriptionRecord) -> Result<Self, Self::Error> {
        if record.descriptor.is_empty() {
            return Err(format!("subscription {} has an empty descriptor", record.id));
        }
        let kind = match record.kind {
            SubscriptionType::Asset => SubscriptionKind::Asset(record.descriptor),
            SubscriptionType::Namespace => SubscriptionKind::Namespace(record.descriptor),
            SubscriptionType::Search => SubscriptionKind::Search(record.descriptor),
        };
        Ok(Self {
            id: record.id,
            kind,
        })
    }
}
