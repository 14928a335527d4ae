//! # Filesystem Adapter
//!
//! The contract every component uses to touch the working tree, plus
//! [`LocalFilesystem`], the `tokio::fs` implementation rooted at a directory.
//!
//! All paths are relative to the working-tree root and `/`-separated. Every
//! method is a suspension point. Missing entries surface as
//! [`AhubError::Io`] with `io::ErrorKind::NotFound`, so callers translate
//! them with [`AhubError::is_not_found()`].

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::AsyncRead;

use crate::error::AhubError;

/// What a path points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    /// Sockets, devices, FIFOs and anything else.
    Other,
}

/// A streaming reader over a file's bytes.
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// Predicate over relative paths for [`Filesystem::search`].
pub type PathPredicate<'a> = &'a (dyn Fn(&str) -> bool + Send + Sync);

/// Working-tree access.
#[async_trait]
pub trait Filesystem: Send + Sync {
    /// Read and parse a JSON document.
    async fn read_json(&self, path: &str) -> Result<Value, AhubError>;

    /// Write a pretty-printed JSON document, creating parent directories.
    /// Object keys are emitted in sorted order.
    async fn write_json(&self, path: &str, value: &Value) -> Result<(), AhubError>;

    /// Remove a file and prune directories left empty by the removal.
    async fn remove_file(&self, path: &str) -> Result<(), AhubError>;

    /// Existence probe.
    async fn exists(&self, path: &str) -> Result<bool, AhubError>;

    /// Classify an entry without following it further.
    async fn stat(&self, path: &str) -> Result<EntryKind, AhubError>;

    /// Names of the direct children of a directory, sorted.
    async fn read_dir(&self, path: &str) -> Result<Vec<String>, AhubError>;

    /// Names of the direct child directories, sorted.
    async fn directories(&self, path: &str) -> Result<Vec<String>, AhubError>;

    /// Open a file for streaming reads.
    async fn open_read(&self, path: &str) -> Result<ByteStream, AhubError>;

    /// Every file below `path` (recursively) whose relative path satisfies
    /// the predicate, sorted. A missing `path` yields an empty list.
    async fn search(
        &self,
        path: &str,
        predicate: PathPredicate<'_>,
    ) -> Result<Vec<String>, AhubError>;
}

/// [`Filesystem`] backed by a local directory.
#[derive(Debug, Clone)]
pub struct LocalFilesystem {
    root: PathBuf,
}

impl LocalFilesystem {
    /// Create an adapter rooted at the working tree.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The working-tree root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative path under the root, refusing escapes.
    fn resolve(&self, path: &str) -> Result<PathBuf, AhubError> {
        let relative = Path::new(path.trim_start_matches('/'));
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => {
                    return Err(AhubError::Corrupt(format!(
                        "path {path:?} escapes the working tree"
                    )))
                }
            }
        }
        Ok(self.root.join(relative))
    }

    async fn prune_empty_parents(&self, mut dir: PathBuf) {
        while dir != self.root && dir.starts_with(&self.root) {
            if tokio::fs::remove_dir(&dir).await.is_err() {
                break;
            }
            if !dir.pop() {
                break;
            }
        }
    }
}

#[async_trait]
impl Filesystem for LocalFilesystem {
    async fn read_json(&self, path: &str) -> Result<Value, AhubError> {
        let bytes = tokio::fs::read(self.resolve(path)?).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn write_json(&self, path: &str, value: &Value) -> Result<(), AhubError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut bytes = serde_json::to_vec_pretty(value)?;
        bytes.push(b'\n');
        let mut staging = target.clone().into_os_string();
        staging.push(".tmp");
        tokio::fs::write(&staging, &bytes).await?;
        tokio::fs::rename(&staging, &target).await?;
        Ok(())
    }

    async fn remove_file(&self, path: &str) -> Result<(), AhubError> {
        let target = self.resolve(path)?;
        tokio::fs::remove_file(&target).await?;
        if let Some(parent) = target.parent() {
            self.prune_empty_parents(parent.to_path_buf()).await;
        }
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool, AhubError> {
        match tokio::fs::symlink_metadata(self.resolve(path)?).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn stat(&self, path: &str) -> Result<EntryKind, AhubError> {
        let meta = tokio::fs::symlink_metadata(self.resolve(path)?).await?;
        let kind = meta.file_type();
        Ok(if kind.is_file() {
            EntryKind::File
        } else if kind.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::Other
        })
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<String>, AhubError> {
        let mut entries = tokio::fs::read_dir(self.resolve(path)?).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    async fn directories(&self, path: &str) -> Result<Vec<String>, AhubError> {
        let mut entries = tokio::fs::read_dir(self.resolve(path)?).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn open_read(&self, path: &str) -> Result<ByteStream, AhubError> {
        let file = tokio::fs::File::open(self.resolve(path)?).await?;
        Ok(Box::new(file))
    }

    async fn search(
        &self,
        path: &str,
        predicate: PathPredicate<'_>,
    ) -> Result<Vec<String>, AhubError> {
        let base = path.trim_matches('/').to_string();
        let mut pending = vec![base];
        let mut found = Vec::new();
        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(self.resolve(&dir)?).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                let relative = if dir.is_empty() {
                    name
                } else {
                    format!("{dir}/{name}")
                };
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(relative);
                } else if file_type.is_file() && predicate(&relative) {
                    found.push(relative);
                }
            }
        }
        found.sort();
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::AsyncReadExt;

    fn tree() -> (tempfile::TempDir, LocalFilesystem) {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFilesystem::new(dir.path());
        (dir, fs)
    }

    #[tokio::test]
    async fn json_round_trip_is_pretty_and_sorted() {
        let (dir, fs) = tree();
        fs.write_json("a/b/doc.json", &json!({"z": 1, "a": [1, 2]}))
            .await
            .unwrap();
        let raw = std::fs::read_to_string(dir.path().join("a/b/doc.json")).unwrap();
        assert!(raw.find("\"a\"").unwrap() < raw.find("\"z\"").unwrap());
        assert!(raw.contains('\n'));
        assert!(!dir.path().join("a/b/doc.json.tmp").exists());
        let value = fs.read_json("a/b/doc.json").await.unwrap();
        assert_eq!(value["z"], 1);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let (_dir, fs) = tree();
        let err = fs.read_json("nope.json").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(!fs.exists("nope.json").await.unwrap());
    }

    #[tokio::test]
    async fn remove_prunes_empty_directories() {
        let (dir, fs) = tree();
        fs.write_json("x/y/z.json", &json!({})).await.unwrap();
        fs.write_json("x/keep.json", &json!({})).await.unwrap();
        fs.remove_file("x/y/z.json").await.unwrap();
        assert!(!dir.path().join("x/y").exists());
        assert!(dir.path().join("x").exists());
        assert!(dir.path().exists());
    }

    #[tokio::test]
    async fn escapes_are_rejected() {
        let (_dir, fs) = tree();
        let err = fs.read_json("../outside.json").await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Corrupt);
    }

    #[tokio::test]
    async fn stat_and_directories() {
        let (dir, fs) = tree();
        std::fs::create_dir_all(dir.path().join("ns/b")).unwrap();
        std::fs::create_dir_all(dir.path().join("ns/a")).unwrap();
        std::fs::write(dir.path().join("ns/file.txt"), b"x").unwrap();
        assert_eq!(fs.stat("ns").await.unwrap(), EntryKind::Directory);
        assert_eq!(fs.stat("ns/file.txt").await.unwrap(), EntryKind::File);
        assert_eq!(fs.directories("ns").await.unwrap(), vec!["a", "b"]);
        assert_eq!(fs.read_dir("ns").await.unwrap(), vec!["a", "b", "file.txt"]);
    }

    #[tokio::test]
    async fn open_read_streams_bytes() {
        let (dir, fs) = tree();
        std::fs::write(dir.path().join("blob.bin"), b"payload").unwrap();
        let mut stream = fs.open_read("blob.bin").await.unwrap();
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"payload");
    }

    #[tokio::test]
    async fn search_walks_recursively() {
        let (dir, fs) = tree();
        std::fs::create_dir_all(dir.path().join("assets/$a/$b")).unwrap();
        std::fs::write(dir.path().join("assets/$a/$b/x.level"), b"{}").unwrap();
        std::fs::write(dir.path().join("assets/y.level"), b"{}").unwrap();
        std::fs::write(dir.path().join("assets/skip.txt"), b"").unwrap();
        let found = fs
            .search("assets", &|p: &str| p.ends_with(".level"))
            .await
            .unwrap();
        assert_eq!(found, vec!["assets/$a/$b/x.level", "assets/y.level"]);
        assert!(fs.search("missing", &|_: &str| true).await.unwrap().is_empty());
    }
}
