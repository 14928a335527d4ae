//! # VCS Adapter Contract
//!
//! The asset hub never spawns a VCS binary or parses its output. It consumes
//! an adapter that reports working-tree status, pushes path lists as one
//! commit, reads historical content, and materializes single files.
//!
//! Two backends exist. `Git` tracks renames natively and reports the ref of
//! deleted entries directly; `ObjectStorage` does not, so deletions must be
//! inferred from content membership. The commit reconciler branches on
//! [`VcsAdapter::backend()`].
//!
//! [`CommitSet`] is the `{add, mod, del}` classification handed to
//! [`VcsAdapter::push_files`]. It is computed per commit attempt and never
//! persisted.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AhubError;
use crate::temporal::Timestamp;

/// Working-tree status of one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileStatus {
    New,
    Modified,
    Deleted,
    Renamed,
}

/// One line of the adapter's status feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub status: FileStatus,
    /// Path relative to the working-tree root.
    pub path: String,
    /// Best-effort ref; backends without rename tracking may omit it.
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl StatusEntry {
    pub fn new(status: FileStatus, path: impl Into<String>) -> Self {
        Self {
            status,
            path: path.into(),
            reference: None,
        }
    }

    /// Attach the ref reported by the backend.
    pub fn with_ref(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

/// Paths to add, modify and delete in one commit, each list de-duplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSet {
    pub add_paths: Vec<String>,
    pub mod_paths: Vec<String>,
    pub del_paths: Vec<String>,
}

impl CommitSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, path: impl Into<String>) {
        push_unique(&mut self.add_paths, path.into());
    }

    pub fn modify(&mut self, path: impl Into<String>) {
        push_unique(&mut self.mod_paths, path.into());
    }

    pub fn delete(&mut self, path: impl Into<String>) {
        push_unique(&mut self.del_paths, path.into());
    }

    /// True when no list holds a path.
    pub fn is_empty(&self) -> bool {
        self.add_paths.is_empty() && self.mod_paths.is_empty() && self.del_paths.is_empty()
    }

    /// Total number of paths across the three lists.
    pub fn len(&self) -> usize {
        self.add_paths.len() + self.mod_paths.len() + self.del_paths.len()
    }

    /// True when `path` appears in any list.
    pub fn contains(&self, path: &str) -> bool {
        self.add_paths
            .iter()
            .chain(&self.mod_paths)
            .chain(&self.del_paths)
            .any(|p| p == path)
    }

    /// Append every path of `other`, keeping each list free of duplicates.
    pub fn merge(&mut self, other: &CommitSet) {
        for path in &other.add_paths {
            self.add(path.clone());
        }
        for path in &other.mod_paths {
            self.modify(path.clone());
        }
        for path in &other.del_paths {
            self.delete(path.clone());
        }
    }
}

fn push_unique(paths: &mut Vec<String>, path: String) {
    if !paths.contains(&path) {
        paths.push(path);
    }
}

/// Arguments of [`VcsAdapter::push_files`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushRequest {
    pub files: CommitSet,
    pub message: String,
    pub branch: String,
}

/// Filters for [`VcsAdapter::get_commit_log`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogQuery {
    /// Restrict to commits touching this path.
    pub path: Option<String>,
    /// Walk history starting at this revision instead of HEAD.
    pub start_revision: Option<String>,
    pub max_results: Option<usize>,
}

/// A path touched by a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedPath {
    pub status: FileStatus,
    pub path: String,
}

/// One commit in the history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitLogEntry {
    pub id: String,
    pub author: String,
    pub created_at: Timestamp,
    pub message: String,
    pub changed_paths: Vec<ChangedPath>,
}

/// Local branch relation to its upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BranchStatus {
    New,
    UpToDate,
    OutOfDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalBranch {
    pub name: String,
    pub status: BranchStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteBranch {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchList {
    pub locals: Vec<LocalBranch>,
    pub remotes: Vec<RemoteBranch>,
}

/// Revision selector for historical reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Revision {
    /// The last commit on the current branch.
    #[default]
    Head,
    /// A specific commit id.
    Id(String),
}

/// Which storage backend the adapter drives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VcsBackend {
    /// Reports renamed and deleted refs directly.
    #[default]
    Git,
    /// No rename tracking; deletions are inferred from content membership.
    ObjectStorage,
}

impl VcsBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Git => "git",
            Self::ObjectStorage => "object_storage",
        }
    }
}

impl std::str::FromStr for VcsBackend {
    type Err = AhubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "git" => Ok(Self::Git),
            "object_storage" | "object-storage" | "objectstorage" => Ok(Self::ObjectStorage),
            other => Err(AhubError::Corrupt(format!("unknown VCS backend {other:?}"))),
        }
    }
}

impl std::fmt::Display for VcsBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Version-control operations consumed by the workspace.
///
/// Implementations serialize single-file checkouts internally; callers must
/// not issue concurrent [`pull_file`](VcsAdapter::pull_file) calls.
#[async_trait]
pub trait VcsAdapter: Send + Sync {
    /// Which backend this adapter drives.
    fn backend(&self) -> VcsBackend;

    /// Uncommitted changes in the working tree.
    async fn get_status(&self) -> Result<Vec<StatusEntry>, AhubError>;

    /// Commit the given paths and push. Returns the new commit id.
    async fn push_files(&self, request: &PushRequest) -> Result<String, AhubError>;

    async fn get_commit_log(&self, query: &LogQuery) -> Result<Vec<CommitLogEntry>, AhubError>;

    async fn get_current_branch(&self) -> Result<String, AhubError>;

    async fn get_branch_list(&self) -> Result<BranchList, AhubError>;

    async fn create_branch(&self, name: &str) -> Result<(), AhubError>;

    async fn delete_branch(&self, name: &str) -> Result<(), AhubError>;

    async fn change_branch(&self, name: &str) -> Result<(), AhubError>;

    /// Bytes of `path` at `revision`. [`AhubError::NotFound`] when the path
    /// did not exist there.
    async fn read(&self, path: &str, revision: &Revision) -> Result<Vec<u8>, AhubError>;

    /// Materialize one file from the repository into the working tree.
    async fn pull_file(&self, path: &str) -> Result<(), AhubError>;

    /// Stable `host/owner/repo` identifier of the remote.
    async fn get_project_id(&self) -> Result<String, AhubError>;
}

/// Derive `host/owner/repo` from a remote URL.
///
/// Accepts `https://host/owner/repo(.git)`, `ssh://user@host:port/owner/repo`
/// and scp-style `user@host:owner/repo.git`.
///
/// # Errors
///
/// Returns [`AhubError::Corrupt`] when no host or path can be extracted.
pub fn project_id_from_remote(url: &str) -> Result<String, AhubError> {
    let url = url.trim();
    let (host, path) = match url.split_once("://") {
        Some((_, rest)) => {
            let (authority, path) = rest.split_once('/').unwrap_or((rest, ""));
            (authority, path)
        }
        None => match url.split_once(':') {
            Some((authority, path)) => (authority, path),
            None => (url, ""),
        },
    };
    let host = host.rsplit('@').next().unwrap_or(host);
    let host = host.split(':').next().unwrap_or(host).to_ascii_lowercase();
    let path = path.trim_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    if host.is_empty() || path.is_empty() {
        return Err(AhubError::Corrupt(format!(
            "cannot derive a project id from remote {url:?}"
        )));
    }
    Ok(format!("{host}/{path}"))
}
