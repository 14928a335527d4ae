//! Shared fixtures: an in-memory VCS adapter over a temporary working tree.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ahub_core::{
    project_id_from_remote, AhubError, BranchList, BranchStatus, ChangedPath, CommitLogEntry,
    FileStatus, Filesystem, LocalBranch, LocalFilesystem, LogQuery, PushRequest, RemoteBranch,
    Revision, StatusEntry, Timestamp, VcsAdapter, VcsBackend,
};
use ahub_graph::{AssetGraph, MemoryIndex};
use ahub_workspace::{Workspace, WorkspaceConfig};
use async_trait::async_trait;
use parking_lot::Mutex;

pub const REMOTE: &str = "https://example.com/studio/game.git";

/// VCS adapter that keeps HEAD in memory and records every call.
pub struct FakeVcs {
    root: PathBuf,
    backend: VcsBackend,
    status: Mutex<Vec<StatusEntry>>,
    head: Mutex<HashMap<String, Vec<u8>>>,
    pushes: Mutex<Vec<PushRequest>>,
    pulls: Mutex<Vec<String>>,
    current: Mutex<String>,
    branches: Mutex<Vec<String>>,
    status_delay: Mutex<Option<Duration>>,
}

impl FakeVcs {
    pub fn new(root: &Path, backend: VcsBackend) -> Self {
        Self {
            root: root.to_path_buf(),
            backend,
            status: Mutex::new(Vec::new()),
            head: Mutex::new(HashMap::new()),
            pushes: Mutex::new(Vec::new()),
            pulls: Mutex::new(Vec::new()),
            current: Mutex::new("main".to_string()),
            branches: Mutex::new(vec!["main".to_string()]),
            status_delay: Mutex::new(None),
        }
    }

    pub fn set_status(&self, entries: Vec<StatusEntry>) {
        *self.status.lock() = entries;
    }

    /// Record `bytes` as the committed content of `path`.
    pub fn commit_head(&self, path: &str, bytes: impl Into<Vec<u8>>) {
        self.head.lock().insert(path.to_string(), bytes.into());
    }

    /// Make `get_status` suspend before answering.
    pub fn delay_status(&self, delay: Duration) {
        *self.status_delay.lock() = Some(delay);
    }

    pub fn pushes(&self) -> Vec<PushRequest> {
        self.pushes.lock().clone()
    }

    pub fn pulls(&self) -> Vec<String> {
        self.pulls.lock().clone()
    }
}

#[async_trait]
impl VcsAdapter for FakeVcs {
    fn backend(&self) -> VcsBackend {
        self.backend
    }

    async fn get_status(&self) -> Result<Vec<StatusEntry>, AhubError> {
        let delay = *self.status_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.status.lock().clone())
    }

    async fn push_files(&self, request: &PushRequest) -> Result<String, AhubError> {
        let mut pushes = self.pushes.lock();
        pushes.push(request.clone());
        Ok(format!("commit-{}", pushes.len()))
    }

    async fn get_commit_log(&self, query: &LogQuery) -> Result<Vec<CommitLogEntry>, AhubError> {
        let pushes = self.pushes.lock().clone();
        let entries = pushes
            .iter()
            .enumerate()
            .rev()
            .map(|(i, push)| {
                let files = &push.files;
                let changed_paths = files
                    .add_paths
                    .iter()
                    .map(|p| (FileStatus::New, p))
                    .chain(files.mod_paths.iter().map(|p| (FileStatus::Modified, p)))
                    .chain(files.del_paths.iter().map(|p| (FileStatus::Deleted, p)))
                    .map(|(status, path)| ChangedPath {
                        status,
                        path: path.clone(),
                    })
                    .collect();
                CommitLogEntry {
                    id: format!("commit-{}", i + 1),
                    author: "tester".to_string(),
                    created_at: Timestamp::now(),
                    message: push.message.clone(),
                    changed_paths,
                }
            })
            .filter(|entry| match &query.path {
                Some(path) => entry.changed_paths.iter().any(|c| &c.path == path),
                None => true,
            })
            .take(query.max_results.unwrap_or(usize::MAX))
            .collect();
        Ok(entries)
    }

    async fn get_current_branch(&self) -> Result<String, AhubError> {
        Ok(self.current.lock().clone())
    }

    async fn get_branch_list(&self) -> Result<BranchList, AhubError> {
        let branches = self.branches.lock().clone();
        Ok(BranchList {
            locals: branches
                .iter()
                .map(|name| LocalBranch {
                    name: name.clone(),
                    status: BranchStatus::UpToDate,
                })
                .collect(),
            remotes: branches
                .iter()
                .map(|name| RemoteBranch {
                    name: format!("origin/{name}"),
                })
                .collect(),
        })
    }

    async fn create_branch(&self, name: &str) -> Result<(), AhubError> {
        let mut branches = self.branches.lock();
        if branches.iter().any(|b| b == name) {
            return Err(AhubError::AlreadyExist(name.to_string()));
        }
        branches.push(name.to_string());
        Ok(())
    }

    async fn delete_branch(&self, name: &str) -> Result<(), AhubError> {
        let mut branches = self.branches.lock();
        let before = branches.len();
        branches.retain(|b| b != name);
        if branches.len() == before {
            return Err(AhubError::NotFound(name.to_string()));
        }
        Ok(())
    }

    async fn change_branch(&self, name: &str) -> Result<(), AhubError> {
        if !self.branches.lock().iter().any(|b| b == name) {
            return Err(AhubError::NotFound(name.to_string()));
        }
        *self.current.lock() = name.to_string();
        Ok(())
    }

    async fn read(&self, path: &str, _revision: &Revision) -> Result<Vec<u8>, AhubError> {
        self.head
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| AhubError::enoent(path))
    }

    async fn pull_file(&self, path: &str) -> Result<(), AhubError> {
        let bytes = self.read(path, &Revision::Head).await?;
        let target = self.root.join(path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;
        self.pulls.lock().push(path.to_string());
        Ok(())
    }

    async fn get_project_id(&self) -> Result<String, AhubError> {
        project_id_from_remote(REMOTE)
    }
}

/// A temporary working tree with a workspace over the fake VCS.
pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub vcs: Arc<FakeVcs>,
    pub workspace: Workspace,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_backend(VcsBackend::Git).await
    }

    pub async fn with_backend(backend: VcsBackend) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let vcs = Arc::new(FakeVcs::new(dir.path(), backend));
        let config = WorkspaceConfig {
            backend,
            author: "tester".to_string(),
            ..WorkspaceConfig::default()
        }
        .with_root(dir.path());
        let workspace = Self::open(&config, Arc::clone(&vcs)).await;
        Self {
            dir,
            vcs,
            workspace,
        }
    }

    /// Open a second workspace over the same tree, re-reading the
    /// properties and re-indexing the assets on disk.
    pub async fn reopen(&self) -> Workspace {
        let config = self.workspace.config().clone();
        let workspace = Self::open(&config, Arc::clone(&self.vcs)).await;
        workspace.graph().reindex().await.unwrap();
        workspace
    }

    async fn open(config: &WorkspaceConfig, vcs: Arc<FakeVcs>) -> Workspace {
        let fs: Arc<dyn Filesystem> = Arc::new(LocalFilesystem::new(config.root.clone()));
        Workspace::open(config.clone(), fs, vcs, Arc::new(MemoryIndex::new()))
            .await
            .unwrap()
    }

    pub fn graph(&self) -> &AssetGraph {
        self.workspace.graph()
    }

    /// Write a working-tree file.
    pub fn write(&self, path: &str, bytes: &[u8]) {
        let target = self.dir.path().join(path);
        std::fs::create_dir_all(target.parent().unwrap()).unwrap();
        std::fs::write(target, bytes).unwrap();
    }

    /// Write a resource file and return its ref.
    pub fn resource(&self, path: &str, bytes: &[u8]) -> String {
        self.write(path, bytes);
        format!("/resources/{path}")
    }

    pub fn remove(&self, path: &str) {
        std::fs::remove_file(self.dir.path().join(path)).unwrap();
    }

    pub fn exists(&self, path: &str) -> bool {
        self.dir.path().join(path).exists()
    }

    /// Working-tree path of a ref.
    pub fn path_of(&self, reference: &str) -> String {
        self.graph().codec().ref_to_relative_path(reference).unwrap()
    }

    /// Identity sidecar path of a resource ref.
    pub fn sidecar_of(&self, reference: &str) -> String {
        self.graph().codec().identity_path(reference).unwrap()
    }

    /// Raw bytes of an asset document on disk.
    pub fn read_asset(&self, reference: &str) -> Vec<u8> {
        std::fs::read(self.dir.path().join(self.path_of(reference))).unwrap()
    }
}

pub fn status(status: FileStatus, path: &str) -> StatusEntry {
    StatusEntry::new(status, path)
}
