//! # ahub-cli — Command-Line Tool for the Asset Hub
//!
//! Local, VCS-independent operations over a working tree.
//!
//! ## Subcommands
//!
//! - `ahub validate [--bare] [NAMESPACE]` — full or bare validation records.
//! - `ahub equivalent [NAMESPACE]` — refs whose names differ only by case.
//! - `ahub identity compare|refresh <REF>` — resource identity sidecars.
//! - `ahub refs encode <REF>` / `ahub refs decode <PATH>` — the reference codec.
//!
//! Every handler returns a process exit code: 0 on success, 1 when the
//! check found problems, 2 when an identity or resource is missing.

pub mod equivalent;
pub mod identity;
pub mod reference;
pub mod validate;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ahub_core::{Filesystem, LocalFilesystem};
use ahub_graph::{AssetGraph, MemoryIndex};
use ahub_workspace::WorkspaceConfig;
use anyhow::{Context, Result};

/// Everything a subcommand needs: the resolved configuration, an indexed
/// graph over the working tree, and the output mode.
#[derive(Debug, Clone)]
pub struct CliContext {
    pub config: WorkspaceConfig,
    pub graph: AssetGraph,
    /// Print machine-readable JSON instead of text.
    pub json: bool,
}

impl CliContext {
    /// Load configuration and index the asset tree under the root.
    ///
    /// `root` overrides the configured working-tree root.
    pub async fn load(root: Option<&Path>, config: Option<&Path>, json: bool) -> Result<Self> {
        let mut resolved = WorkspaceConfig::load(config).context("failed to load configuration")?;
        if let Some(root) = root {
            resolved = resolved.with_root(root);
        }
        Self::open(resolved, json).await
    }

    /// Index the working tree described by `config`.
    pub async fn open(config: WorkspaceConfig, json: bool) -> Result<Self> {
        let fs: Arc<dyn Filesystem> = Arc::new(LocalFilesystem::new(config.root.clone()));
        let graph = AssetGraph::new(fs, Arc::new(MemoryIndex::new()), config.codec())
            .context("failed to build the asset graph")?
            .with_author(&config.author);
        let report = graph
            .reindex()
            .await
            .with_context(|| format!("failed to index {}", config.root.display()))?;
        for (reference, reason) in &report.skipped {
            tracing::warn!(reference = %reference, reason = %reason, "asset not indexed");
        }
        tracing::debug!(
            root = %config.root.display(),
            indexed = report.indexed.len(),
            skipped = report.skipped.len(),
            "working tree indexed"
        );
        Ok(Self { config, graph, json })
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// Print a value as pretty JSON.
    pub fn print_json(&self, value: &serde_json::Value) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

/// Resolve a path that may be relative to the working-tree root.
pub fn resolve_path(path: &Path, root: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// A working tree with one resource and one asset using it as `main`.
    pub async fn context(json: bool) -> (tempfile::TempDir, CliContext) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("textures")).unwrap();
        std::fs::write(dir.path().join("textures/rock.png"), b"rock").unwrap();
        let config = WorkspaceConfig::default().with_root(dir.path());
        let ctx = CliContext::open(config, json).await.unwrap();
        ctx.graph
            .create(
                "/assets/props/rock.mesh",
                ahub_core::AssetDraft::with_main("/resources/textures/rock.png"),
            )
            .await
            .unwrap();
        (dir, ctx)
    }
}
