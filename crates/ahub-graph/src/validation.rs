//! # Graph Validation
//!
//! - [`AssetGraph::is_invalid_paths_in_data`]: every `main`/dependency of a
//!   document must resolve. Checks run concurrently; all failures are
//!   gathered into one CORRUPT error.
//! - [`are_equivalent_refs`]: refs whose basenames differ only by letter case.
//! - [`AssetGraph::run_full_validation`] / [`AssetGraph::run_bare_validation`]:
//!   one [`ValidationRecord`] per asset examined, never an early return.

use std::collections::{BTreeSet, HashMap, VecDeque};

use ahub_core::{refs, AhubError, Asset};
use ahub_schema::is_supported_version;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::graph::AssetGraph;
use crate::index::IndexQuery;

/// Outcome of validating one asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValidationState {
    Valid,
    Invalid,
}

/// Per-asset validation result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRecord {
    #[serde(rename = "ref")]
    pub reference: String,
    pub version: String,
    pub state: ValidationState,
    /// First failed check, when `state` is INVALID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidationRecord {
    fn new(asset: &Asset, error: Option<String>) -> Self {
        Self {
            reference: asset.meta.reference.clone(),
            version: asset.meta.version.clone(),
            state: if error.is_some() {
                ValidationState::Invalid
            } else {
                ValidationState::Valid
            },
            error,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.state == ValidationState::Valid
    }
}

/// Depth of dependency checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// Existence only: resource bytes or sidecar present, asset indexed once.
    Bare,
    /// Existence plus readable identities, recursing into asset dependencies.
    Full,
}

/// How a resource dependency must be present to count as resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    /// Bytes in the working tree.
    OnDisk,
    /// Bytes, or a sidecar that exists (partial checkouts).
    Known,
    /// Bytes, or a sidecar that parses.
    Recorded,
}

/// Refs whose basenames collide when case is ignored.
///
/// Inputs are grouped by lowercase basename. A group collides when it holds
/// at least two distinct spellings; exact duplicates alone do not collide
/// but are kept once their group does. The result concatenates colliding
/// groups in order of first appearance, members in input order.
pub fn are_equivalent_refs<S: AsRef<str>>(inputs: &[S]) -> Vec<String> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<&str>> = HashMap::new();
    for input in inputs {
        let input = input.as_ref();
        let key = refs::basename(input).to_lowercase();
        let group = groups.entry(key.clone()).or_default();
        if group.is_empty() {
            order.push(key);
        }
        group.push(input);
    }
    order
        .iter()
        .filter_map(|key| groups.get(key))
        .filter(|members| members.iter().collect::<BTreeSet<_>>().len() > 1)
        .flat_map(|members| members.iter().map(|m| (*m).to_string()))
        .collect()
}

impl AssetGraph {
    /// Check that every ref in `main`/`dependencies` resolves: resources
    /// exist in the working tree, assets resolve to exactly one index entry.
    ///
    /// # Errors
    ///
    /// One [`AhubError::Corrupt`] naming every offending ref.
    pub async fn is_invalid_paths_in_data(&self, asset: &Asset) -> Result<(), AhubError> {
        let checks = asset.references().map(|reference| async move {
            match self.reference_resolves(reference, Resolution::OnDisk).await {
                Ok(true) => None,
                Ok(false) => Some(format!("{reference} does not exist")),
                Err(e) => Some(format!("{reference}: {e}")),
            }
        });
        let failures: Vec<String> = join_all(checks).await.into_iter().flatten().collect();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(AhubError::Corrupt(format!(
                "{} has invalid references: {}",
                asset.reference(),
                failures.join("; ")
            )))
        }
    }

    /// Validate `roots` and, transitively, every asset they depend on.
    pub async fn run_full_validation(&self, roots: &[Asset]) -> Vec<ValidationRecord> {
        let mut seen: BTreeSet<String> = BTreeSet::new();
        let mut queue: VecDeque<Asset> = roots.iter().cloned().collect();
        let mut records = Vec::new();
        while let Some(asset) = queue.pop_front() {
            if !seen.insert(asset.meta.reference.clone()) {
                continue;
            }
            records.push(self.validate_one(&asset, ValidationMode::Full).await);
            for dependency in asset.dependencies.iter().filter(|d| refs::is_asset_ref(d)) {
                if seen.contains(dependency) {
                    continue;
                }
                if let Ok(next) = self.get_one(dependency).await {
                    queue.push_back(next);
                }
            }
        }
        records
    }

    /// Validate exactly `roots`, checking dependencies for existence only.
    pub async fn run_bare_validation(&self, roots: &[Asset]) -> Vec<ValidationRecord> {
        join_all(
            roots
                .iter()
                .map(|asset| self.validate_one(asset, ValidationMode::Bare)),
        )
        .await
    }

    /// Validate every asset below a namespace.
    pub async fn validate_namespace(
        &self,
        namespace: &str,
        mode: ValidationMode,
    ) -> Result<Vec<ValidationRecord>, AhubError> {
        let roots = self.list_all(namespace).await?;
        Ok(match mode {
            ValidationMode::Full => self.run_full_validation(&roots).await,
            ValidationMode::Bare => self.run_bare_validation(&roots).await,
        })
    }

    async fn validate_one(&self, asset: &Asset, mode: ValidationMode) -> ValidationRecord {
        let error = match self.first_failure(asset, mode).await {
            Ok(failure) => failure,
            Err(e) => Some(e.to_string()),
        };
        ValidationRecord::new(asset, error)
    }

    async fn first_failure(
        &self,
        asset: &Asset,
        mode: ValidationMode,
    ) -> Result<Option<String>, AhubError> {
        if !is_supported_version(&asset.meta.version) {
            return Ok(Some(format!("unsupported version {}", asset.meta.version)));
        }
        let violations = self.schema().violations(&asset.to_value()?);
        if let Some(first) = violations.first() {
            return Ok(Some(format!("schema: {}", first.to_string().trim())));
        }
        if !asset.main.is_empty() {
            let mut definers: BTreeSet<String> = self
                .index()
                .find(&IndexQuery::Main(asset.main.clone()))
                .await?
                .into_iter()
                .map(|a| a.meta.reference)
                .collect();
            definers.insert(asset.meta.reference.clone());
            if definers.len() != 1 {
                return Ok(Some(format!(
                    "{} is declared main by {} assets",
                    asset.main,
                    definers.len()
                )));
            }
        }
        let resolution = match mode {
            ValidationMode::Bare => Resolution::Known,
            ValidationMode::Full => Resolution::Recorded,
        };
        for reference in asset.references() {
            if !self.reference_resolves(reference, resolution).await? {
                return Ok(Some(format!("{reference} does not exist")));
            }
        }
        Ok(None)
    }

    /// Does a dependency ref resolve?
    async fn reference_resolves(
        &self,
        reference: &str,
        resolution: Resolution,
    ) -> Result<bool, AhubError> {
        if refs::is_asset_ref(reference) {
            let hits = self
                .index()
                .count(&IndexQuery::Ref(reference.to_string()))
                .await?;
            return Ok(hits == 1);
        }
        if !refs::is_valid_resource_ref(reference) {
            return Err(AhubError::Corrupt(format!("{reference} is not a valid ref")));
        }
        let path = self.codec().ref_to_relative_path(reference)?;
        let on_disk = self.filesystem().exists(&path).await?;
        match resolution {
            Resolution::OnDisk => Ok(on_disk),
            Resolution::Known => Ok(on_disk || self.identity().has_identity(reference).await?),
            Resolution::Recorded => {
                let recorded = self.identity().get(reference).await?.is_some();
                Ok(on_disk || recorded)
            }
        }
    }
}
