//! # Asset Index
//!
//! The searchable side of the asset graph. The graph owns the index
//! exclusively; other components only query it through the graph.
//!
//! [`AssetIndex`] is the external-database contract: exact, contains and
//! range queries over `ref`, namespace, `main`, `dependencies`, `tags` and
//! `modified`. [`MemoryIndex`] implements it over a `parking_lot::RwLock`
//! that is never held across an `.await`.

use std::collections::BTreeMap;
use std::sync::Arc;

use ahub_core::{refs, AhubError, Asset, Timestamp};
use async_trait::async_trait;
use parking_lot::RwLock;

/// A query against the index. Results are ordered by ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexQuery {
    /// Every indexed asset.
    All,
    /// Exact ref.
    Ref(String),
    /// Assets inside a namespace, optionally including nested namespaces.
    Namespace { namespace: String, recursive: bool },
    /// Assets declaring this resource as `main`.
    Main(String),
    /// Assets listing this ref among `dependencies`.
    Dependency(String),
    /// Assets whose `main` equals or `dependencies` contain this ref.
    Referencing(String),
    /// Assets carrying this tag.
    Tag(String),
    /// Assets whose ref contains the substring.
    RefContains(String),
    /// Assets whose `modified` lies in `[from, to]`; open bounds allowed.
    ModifiedBetween {
        from: Option<Timestamp>,
        to: Option<Timestamp>,
    },
}

impl IndexQuery {
    /// Does `asset` satisfy this query?
    pub fn matches(&self, asset: &Asset) -> bool {
        match self {
            Self::All => true,
            Self::Ref(reference) => asset.reference() == reference,
            Self::Namespace {
                namespace,
                recursive: true,
            } => refs::is_child_of(asset.reference(), namespace),
            Self::Namespace {
                namespace,
                recursive: false,
            } => asset.namespace() == *namespace,
            Self::Main(main) => !main.is_empty() && asset.main == *main,
            Self::Dependency(dep) => asset.dependencies.iter().any(|d| d == dep),
            Self::Referencing(reference) => asset.refers_to(reference),
            Self::Tag(tag) => asset.tags.iter().any(|t| t == tag),
            Self::RefContains(needle) => asset.reference().contains(needle.as_str()),
            Self::ModifiedBetween { from, to } => {
                let modified = asset.meta.modified;
                from.map_or(true, |from| modified >= from) && to.map_or(true, |to| modified <= to)
            }
        }
    }
}

/// Searchable store of asset documents.
#[async_trait]
pub trait AssetIndex: Send + Sync {
    /// Insert or overwrite the entry for `asset.meta.ref`.
    async fn upsert(&self, asset: &Asset) -> Result<(), AhubError>;

    /// Drop the entry. Returns `false` when there was none.
    async fn remove(&self, reference: &str) -> Result<bool, AhubError>;

    /// Every entry matching the query, ordered by ref.
    async fn find(&self, query: &IndexQuery) -> Result<Vec<Asset>, AhubError>;

    /// Number of entries matching the query.
    async fn count(&self, query: &IndexQuery) -> Result<usize, AhubError> {
        Ok(self.find(query).await?.len())
    }

    /// Drop every entry.
    async fn clear(&self) -> Result<(), AhubError>;
}

/// Thread-safe, cloneable in-memory [`AssetIndex`].
///
/// All lock sections are synchronous; the lock is never held across an
/// `.await` point.
#[derive(Debug, Clone, Default)]
pub struct MemoryIndex {
    entries: Arc<RwLock<BTreeMap<String, Asset>>>,
}

impl MemoryIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indexed assets.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl AssetIndex for MemoryIndex {
    async fn upsert(&self, asset: &Asset) -> Result<(), AhubError> {
        self.entries
            .write()
            .insert(asset.reference().to_string(), asset.clone());
        Ok(())
    }

    async fn remove(&self, reference: &str) -> Result<bool, AhubError> {
        Ok(self.entries.write().remove(reference).is_some())
    }

    async fn find(&self, query: &IndexQuery) -> Result<Vec<Asset>, AhubError> {
        let entries = self.entries.read();
        if let IndexQuery::Ref(reference) = query {
            return Ok(entries.get(reference).cloned().into_iter().collect());
        }
        Ok(entries
            .values()
            .filter(|asset| query.matches(asset))
            .cloned()
            .collect())
    }

    async fn count(&self, query: &IndexQuery) -> Result<usize, AhubError> {
        let entries = self.entries.read();
        Ok(entries.values().filter(|asset| query.matches(asset)).count())
    }

    async fn clear(&self) -> Result<(), AhubError> {
        self.entries.write().clear();
        Ok(())
    }
}
