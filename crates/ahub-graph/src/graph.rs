//! # Asset Graph
//!
//! Durable, integrity-checked storage of asset documents. Every mutation
//! re-validates before it becomes durable, then dispatches the filesystem
//! write and the index write together; the caller observes success only once
//! both finish. There is no rollback: if one side fails the operation
//! reports failure and the caller retries the whole operation.
//!
//! ## Integrity Rules
//!
//! - At most one asset declares a given resource as `main` (checked on create).
//! - `main` and `dependencies` do not overlap; an asset never depends on itself.
//! - Every referenced resource exists in the working tree and every
//!   referenced asset resolves to exactly one index entry.
//! - An asset still referenced by another cannot be deleted.
//! - Renaming rewrites every inbound dependency to the new ref.

use std::collections::BTreeSet;
use std::sync::Arc;

use ahub_core::{refs, AhubError, Asset, AssetDraft, EntryKind, Filesystem, RefCodec, Timestamp};
use ahub_identity::{IdentityStore, ReferenceCounter};
use ahub_schema::SchemaValidator;
use async_trait::async_trait;
use futures::future::try_join_all;
use futures::stream::{self, StreamExt};
use globset::{Glob, GlobMatcher};

use crate::index::{AssetIndex, IndexQuery};
use crate::query::{QueryPredicate, TermPredicate};

/// Page size when a listing does not ask for one.
pub const DEFAULT_MAX_RESULTS: usize = 100;

/// Largest page a listing may request.
pub const MAX_RESULTS_CAP: usize = 1000;

/// Number of asset documents read at once during [`AssetGraph::reindex`].
const REINDEX_CONCURRENCY: usize = 8;

const DEFAULT_AUTHOR: &str = "unknown";

/// Paging and filtering for [`AssetGraph::get_list`] and [`AssetGraph::search`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOptions {
    /// Offset of the first item returned.
    pub start: usize,
    /// Page size; clamped to [`MAX_RESULTS_CAP`], `0` means the default.
    pub max_results: usize,
    /// Glob over the basename of items and sub-namespaces.
    pub filter_name: Option<String>,
    /// Search query evaluated by the graph's [`QueryPredicate`].
    pub q: Option<String>,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            start: 0,
            max_results: DEFAULT_MAX_RESULTS,
            filter_name: None,
            q: None,
        }
    }
}

impl ListOptions {
    fn page_size(&self) -> usize {
        match self.max_results {
            0 => DEFAULT_MAX_RESULTS,
            n => n.min(MAX_RESULTS_CAP),
        }
    }

    fn name_filter(&self) -> Result<NameFilter, AhubError> {
        let matcher = match self.filter_name.as_deref() {
            Some(pattern) => Some(
                Glob::new(pattern)
                    .map_err(|err| {
                        AhubError::Corrupt(format!("invalid filter_name '{pattern}': {err}"))
                    })?
                    .compile_matcher(),
            ),
            None => None,
        };
        Ok(NameFilter(matcher))
    }
}

/// Compiled `filter_name`; matches everything when absent.
struct NameFilter(Option<GlobMatcher>);

impl NameFilter {
    fn matches(&self, reference: &str) -> bool {
        self.0
            .as_ref()
            .map_or(true, |m| m.is_match(refs::basename(reference)))
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetList {
    pub items: Vec<Asset>,
    /// Matching assets before paging.
    pub total_items: usize,
    /// Direct child namespaces, as refs with a trailing slash.
    pub namespaces: Vec<String>,
    pub total_namespaces: usize,
}

/// Outcome of [`AssetGraph::reindex`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReindexReport {
    /// Refs now in the index.
    pub indexed: Vec<String>,
    /// Paths that could not be indexed, with the reason.
    pub skipped: Vec<(String, String)>,
}

/// The asset graph.
#[derive(Clone)]
pub struct AssetGraph {
    fs: Arc<dyn Filesystem>,
    index: Arc<dyn AssetIndex>,
    schema: Arc<SchemaValidator>,
    predicate: Arc<dyn QueryPredicate>,
    identity: IdentityStore,
    codec: RefCodec,
    author: String,
}

impl std::fmt::Debug for AssetGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetGraph")
            .field("codec", &self.codec)
            .field("author", &self.author)
            .finish_non_exhaustive()
    }
}

impl AssetGraph {
    /// Build a graph over a working tree and an index.
    ///
    /// # Errors
    ///
    /// [`AhubError::Internal`] if the bundled asset schema does not compile.
    pub fn new(
        fs: Arc<dyn Filesystem>,
        index: Arc<dyn AssetIndex>,
        codec: RefCodec,
    ) -> Result<Self, AhubError> {
        let schema = SchemaValidator::new()?;
        Ok(Self {
            identity: IdentityStore::new(fs.clone(), codec.clone()),
            fs,
            index,
            schema: Arc::new(schema),
            predicate: Arc::new(TermPredicate),
            codec,
            author: DEFAULT_AUTHOR.to_string(),
        })
    }

    /// Use another search grammar.
    pub fn with_predicate(mut self, predicate: Arc<dyn QueryPredicate>) -> Self {
        self.predicate = predicate;
        self
    }

    /// Author stamped on created assets.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn codec(&self) -> &RefCodec {
        &self.codec
    }

    pub fn identity(&self) -> &IdentityStore {
        &self.identity
    }

    pub fn filesystem(&self) -> &Arc<dyn Filesystem> {
        &self.fs
    }

    pub(crate) fn index(&self) -> &dyn AssetIndex {
        self.index.as_ref()
    }

    pub(crate) fn schema(&self) -> &SchemaValidator {
        &self.schema
    }

    /// Validate a search string against the graph's grammar.
    ///
    /// # Errors
    ///
    /// [`AhubError::Corrupt`] when the query does not parse.
    pub fn check_query(&self, q: &str) -> Result<(), AhubError> {
        self.predicate.compile(q).map(|_| ())
    }

    // -----------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------

    /// Fetch one asset by ref.
    ///
    /// # Errors
    ///
    /// [`AhubError::NotFound`] when no asset has this ref.
    pub async fn get_one(&self, reference: &str) -> Result<Asset, AhubError> {
        if !refs::is_asset_ref(reference) || refs::is_namespace(reference) {
            return Err(AhubError::Corrupt(format!("{reference} is not an asset ref")));
        }
        self.index
            .find(&IndexQuery::Ref(reference.to_string()))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AhubError::NotFound(reference.to_string()))
    }

    /// List a namespace: its direct assets (or, with `q`, every matching
    /// asset below it) plus its direct sub-namespaces.
    ///
    /// # Errors
    ///
    /// [`AhubError::Corrupt`] for a malformed namespace, query or `filter_name`,
    /// [`AhubError::FileTypeNotSupported`] when the namespace directory holds
    /// something that is neither a file nor a directory, and
    /// [`AhubError::NotFound`] when a plain listing finds no assets and no
    /// sub-namespaces.
    pub async fn get_list(
        &self,
        namespace: &str,
        options: &ListOptions,
    ) -> Result<AssetList, AhubError> {
        if !refs::is_valid_namespace_ref(namespace) {
            return Err(AhubError::Corrupt(format!("{namespace} is not a namespace ref")));
        }
        let names = options.name_filter()?;
        let query = match options.q.as_deref() {
            Some(q) => Some(self.predicate.compile(q)?),
            None => None,
        };
        let candidates = self
            .index
            .find(&IndexQuery::Namespace {
                namespace: namespace.to_string(),
                recursive: query.is_some(),
            })
            .await?;
        let matching: Vec<Asset> = candidates
            .into_iter()
            .filter(|asset| names.matches(asset.reference()))
            .filter(|asset| query.as_ref().map_or(true, |q| q.matches(asset)))
            .collect();
        let namespaces: Vec<String> = self
            .child_namespaces(namespace)
            .await?
            .into_iter()
            .filter(|ns| names.matches(ns))
            .collect();

        if query.is_none() && matching.is_empty() && namespaces.is_empty() {
            return Err(AhubError::NotFound(namespace.to_string()));
        }
        Ok(page(matching, namespaces, options))
    }

    /// Every asset in the graph matching `q`.
    ///
    /// # Errors
    ///
    /// [`AhubError::Corrupt`] when the query does not parse.
    pub async fn search(&self, q: &str, options: &ListOptions) -> Result<AssetList, AhubError> {
        let names = options.name_filter()?;
        let query = self.predicate.compile(q)?;
        let matching: Vec<Asset> = self
            .index
            .find(&IndexQuery::All)
            .await?
            .into_iter()
            .filter(|asset| names.matches(asset.reference()))
            .filter(|asset| query.matches(asset))
            .collect();
        Ok(page(matching, Vec::new(), options))
    }

    /// Every asset matching `q`, without paging.
    pub async fn search_all(&self, q: &str) -> Result<Vec<Asset>, AhubError> {
        let query = self.predicate.compile(q)?;
        Ok(self
            .index
            .find(&IndexQuery::All)
            .await?
            .into_iter()
            .filter(|asset| query.matches(asset))
            .collect())
    }

    /// Every asset below a namespace, recursively, without paging.
    pub async fn list_all(&self, namespace: &str) -> Result<Vec<Asset>, AhubError> {
        if !refs::is_valid_namespace_ref(namespace) {
            return Err(AhubError::Corrupt(format!("{namespace} is not a namespace ref")));
        }
        self.index
            .find(&IndexQuery::Namespace {
                namespace: namespace.to_string(),
                recursive: true,
            })
            .await
    }

    /// Refs of every asset whose `main` equals or `dependencies` contain `reference`.
    pub async fn referencing_assets(&self, reference: &str) -> Result<Vec<String>, AhubError> {
        Ok(self
            .index
            .find(&IndexQuery::Referencing(reference.to_string()))
            .await?
            .into_iter()
            .map(|asset| asset.meta.reference)
            .filter(|r| r != reference)
            .collect())
    }

    /// Number of assets referencing `reference`.
    pub async fn reference_count(&self, reference: &str) -> Result<usize, AhubError> {
        Ok(self.referencing_assets(reference).await?.len())
    }

    async fn child_namespaces(&self, namespace: &str) -> Result<Vec<String>, AhubError> {
        let dir = self.codec.ref_to_relative_path(namespace)?;
        let dir = dir.trim_end_matches('/').to_string();
        let names = match self.fs.read_dir(&dir).await {
            Ok(names) => names,
            Err(e) if e.is_not_found() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let kinds = try_join_all(names.iter().map(|name| {
            let path = format!("{dir}/{name}");
            async move { self.fs.stat(&path).await }
        }))
        .await?;

        let mut namespaces = Vec::new();
        for (name, kind) in names.iter().zip(kinds) {
            match kind {
                EntryKind::Directory => {
                    if let Some(plain) = name.strip_prefix(ahub_core::NAMESPACE_SENTINEL) {
                        namespaces.push(format!("{namespace}{plain}/"));
                    }
                }
                EntryKind::File => {}
                EntryKind::Other => {
                    return Err(AhubError::FileTypeNotSupported(format!("{dir}/{name}")));
                }
            }
        }
        Ok(namespaces)
    }

    // -----------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------

    /// Create a new asset.
    ///
    /// # Errors
    ///
    /// - [`AhubError::Corrupt`]: malformed ref, schema violation, dangling
    ///   reference, or a `main` already declared by another asset.
    /// - [`AhubError::AlreadyExist`]: an asset with this ref exists.
    pub async fn create(&self, reference: &str, draft: AssetDraft) -> Result<Asset, AhubError> {
        if !refs::is_valid_asset_ref(reference) {
            return Err(AhubError::Corrupt(format!("{reference} is not a valid asset ref")));
        }
        if self.exists(reference).await? {
            return Err(AhubError::AlreadyExist(reference.to_string()));
        }
        let asset = Asset::new(reference, draft, self.author.clone());
        self.check_document(&asset)?;
        self.check_main_unique(&asset).await?;
        self.is_invalid_paths_in_data(&asset).await?;
        self.persist(&asset).await?;
        tracing::info!(reference = %reference, "asset created");
        Ok(asset)
    }

    /// Move an asset to a new ref and rewrite every inbound dependency.
    ///
    /// # Errors
    ///
    /// - [`AhubError::PreconditionFailed`]: `expected_modified` is stale.
    /// - [`AhubError::Corrupt`]: malformed `new_ref`.
    /// - [`AhubError::AlreadyExist`]: `new_ref` is taken.
    /// - [`AhubError::NotFound`]: `old_ref` does not exist.
    pub async fn rename(
        &self,
        old_ref: &str,
        new_ref: &str,
        expected_modified: Timestamp,
    ) -> Result<Asset, AhubError> {
        if !refs::is_valid_asset_ref(new_ref) {
            return Err(AhubError::Corrupt(format!("{new_ref} is not a valid asset ref")));
        }
        let asset = self.get_one(old_ref).await?;
        check_fresh(&asset, expected_modified)?;
        if old_ref == new_ref {
            return Ok(asset);
        }
        if self.exists(new_ref).await? {
            return Err(AhubError::AlreadyExist(new_ref.to_string()));
        }

        let mut renamed = asset.clone();
        renamed.meta.reference = new_ref.to_string();
        renamed.touch();
        self.check_document(&renamed)?;

        let referrers: Vec<Asset> = self
            .index
            .find(&IndexQuery::Dependency(old_ref.to_string()))
            .await?
            .into_iter()
            .filter(|a| a.reference() != old_ref)
            .collect();

        // The old file goes only after the new one is written, so pruning an
        // emptied namespace directory never races the write.
        let move_document = async {
            self.persist(&renamed).await?;
            self.unpersist(old_ref).await
        };
        let cascade = try_join_all(referrers.into_iter().map(|mut referrer| async move {
            if referrer.replace_dependency(old_ref, new_ref) {
                referrer.touch();
                self.persist(&referrer).await?;
                tracing::debug!(
                    reference = %referrer.reference(),
                    from = %old_ref,
                    to = %new_ref,
                    "dependency rewritten"
                );
            }
            Ok::<_, AhubError>(())
        }));
        futures::try_join!(move_document, cascade)?;

        tracing::info!(from = %old_ref, to = %new_ref, "asset renamed");
        Ok(renamed)
    }

    /// Overwrite an asset's editable fields.
    ///
    /// Re-validates schema and paths. `main` uniqueness is not re-checked
    /// against the rest of the graph.
    ///
    /// # Errors
    ///
    /// [`AhubError::PreconditionFailed`] when `expected_modified` is stale,
    /// [`AhubError::Corrupt`] for schema or path violations.
    pub async fn replace(
        &self,
        reference: &str,
        draft: AssetDraft,
        expected_modified: Timestamp,
    ) -> Result<Asset, AhubError> {
        let mut asset = self.get_one(reference).await?;
        check_fresh(&asset, expected_modified)?;
        asset.apply(draft);
        asset.touch();
        self.check_document(&asset)?;
        self.is_invalid_paths_in_data(&asset).await?;
        self.persist(&asset).await?;
        tracing::info!(reference = %reference, "asset replaced");
        Ok(asset)
    }

    /// Delete an asset nobody references.
    ///
    /// # Errors
    ///
    /// [`AhubError::ReferencedBy`] (kind ALREADYEXIST) listing every referrer,
    /// or [`AhubError::NotFound`].
    pub async fn delete(&self, reference: &str) -> Result<(), AhubError> {
        self.get_one(reference).await?;
        let referrers = self.referencing_assets(reference).await?;
        if !referrers.is_empty() {
            return Err(AhubError::ReferencedBy {
                reference: reference.to_string(),
                referrers,
            });
        }
        self.unpersist(reference).await?;
        tracing::info!(reference = %reference, "asset deleted");
        Ok(())
    }

    /// Rebuild the index from the asset tree on disk.
    ///
    /// Documents that fail to parse, or whose `meta.ref` disagrees with their
    /// location, are reported in [`ReindexReport::skipped`] and left out.
    pub async fn reindex(&self) -> Result<ReindexReport, AhubError> {
        let root = self.codec.assets_root().to_string();
        let paths = self
            .fs
            .search(&root, &|path: &str| !path.ends_with(".tmp"))
            .await?;
        let loaded: Vec<(String, Result<Asset, AhubError>)> = stream::iter(paths)
            .map(|path| async move {
                let result = self.load_document(&path).await;
                (path, result)
            })
            .buffer_unordered(REINDEX_CONCURRENCY)
            .collect()
            .await;

        self.index.clear().await?;
        let mut report = ReindexReport::default();
        for (path, result) in loaded {
            match result {
                Ok(asset) => {
                    self.index.upsert(&asset).await?;
                    report.indexed.push(asset.meta.reference);
                }
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "asset document skipped");
                    report.skipped.push((path, e.to_string()));
                }
            }
        }
        report.indexed.sort();
        report.skipped.sort();
        tracing::info!(
            indexed = report.indexed.len(),
            skipped = report.skipped.len(),
            "index rebuilt"
        );
        Ok(report)
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    async fn load_document(&self, path: &str) -> Result<Asset, AhubError> {
        let expected = self.codec.relative_path_to_ref(path)?;
        let asset = Asset::from_value(self.fs.read_json(path).await?)?;
        if asset.reference() != expected {
            return Err(AhubError::Corrupt(format!(
                "{path} declares ref {} but is stored at {expected}",
                asset.reference()
            )));
        }
        Ok(asset)
    }

    async fn exists(&self, reference: &str) -> Result<bool, AhubError> {
        let path = self.codec.ref_to_relative_path(reference)?;
        let query = IndexQuery::Ref(reference.to_string());
        let (indexed, on_disk) = futures::try_join!(
            self.index.count(&query),
            self.fs.exists(&path)
        )?;
        Ok(indexed > 0 || on_disk)
    }

    /// Shape checks that need no I/O.
    fn check_document(&self, asset: &Asset) -> Result<(), AhubError> {
        self.schema.validate_asset(&asset.to_value()?)?;
        let own = asset.reference();
        if asset.refers_to(own) {
            return Err(AhubError::Corrupt(format!("{own} refers to itself")));
        }
        if !asset.main.is_empty() && asset.dependencies.contains(&asset.main) {
            return Err(AhubError::Corrupt(format!(
                "{own} lists its main {} as a dependency",
                asset.main
            )));
        }
        Ok(())
    }

    async fn check_main_unique(&self, asset: &Asset) -> Result<(), AhubError> {
        if asset.main.is_empty() {
            return Ok(());
        }
        let owners: Vec<String> = self
            .index
            .find(&IndexQuery::Main(asset.main.clone()))
            .await?
            .into_iter()
            .map(|a| a.meta.reference)
            .filter(|r| r != asset.reference())
            .collect();
        if owners.is_empty() {
            Ok(())
        } else {
            Err(AhubError::Corrupt(format!(
                "{} is already the main of {}",
                asset.main,
                owners.join(", ")
            )))
        }
    }

    async fn persist(&self, asset: &Asset) -> Result<(), AhubError> {
        let path = self.codec.ref_to_relative_path(asset.reference())?;
        let value = asset.to_value()?;
        futures::try_join!(self.fs.write_json(&path, &value), self.index.upsert(asset))?;
        Ok(())
    }

    async fn unpersist(&self, reference: &str) -> Result<(), AhubError> {
        let path = self.codec.ref_to_relative_path(reference)?;
        let remove_file = async {
            match self.fs.remove_file(&path).await {
                Err(e) if e.is_not_found() => Ok(()),
                other => other,
            }
        };
        futures::try_join!(remove_file, self.index.remove(reference))?;
        Ok(())
    }

    /// Refs of every indexed asset, sorted.
    pub async fn all_refs(&self) -> Result<BTreeSet<String>, AhubError> {
        Ok(self
            .index
            .find(&IndexQuery::All)
            .await?
            .into_iter()
            .map(|a| a.meta.reference)
            .collect())
    }
}

#[async_trait]
impl ReferenceCounter for AssetGraph {
    async fn reference_count(&self, reference: &str) -> Result<usize, AhubError> {
        AssetGraph::reference_count(self, reference).await
    }
}

fn check_fresh(asset: &Asset, expected_modified: Timestamp) -> Result<(), AhubError> {
    if asset.meta.modified == expected_modified {
        Ok(())
    } else {
        Err(AhubError::PreconditionFailed(format!(
            "{} was modified at {}, caller expected {}",
            asset.reference(),
            asset.meta.modified,
            expected_modified
        )))
    }
}

fn page(items: Vec<Asset>, namespaces: Vec<String>, options: &ListOptions) -> AssetList {
    let total_items = items.len();
    let total_namespaces = namespaces.len();
    let items = items
        .into_iter()
        .skip(options.start)
        .take(options.page_size())
        .collect();
    AssetList {
        items,
        total_items,
        namespaces,
        total_namespaces,
    }
}
