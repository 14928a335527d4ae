//! # Error Hierarchy
//!
//! Structured error type for the whole asset hub, built with `thiserror`.
//! No `Box<dyn Error>`, no `.unwrap()` outside tests.
//!
//! Every variant classifies into exactly one [`ErrorKind`]. Callers match on
//! the kind (a stable machine code) rather than on message text. Lower-level
//! adapter failures (`ENOENT`, `EISDIR`) arrive as [`AhubError::Io`] and are
//! translated into the taxonomy where they are first observed; the
//! [`AhubError::is_not_found()`] probe exists for exactly that translation.

use thiserror::Error;

/// The error taxonomy shared by every component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A ref or namespace has no match.
    NotFound,
    /// Create conflict, or delete blocked by live references.
    AlreadyExist,
    /// Schema violation, malformed ref, dangling reference, duplicate `main`.
    Corrupt,
    /// Stale `modified` timestamp on rename/replace, or nothing to commit.
    PreconditionFailed,
    /// A filesystem entry that is neither a file nor a directory.
    FileTypeNotSupported,
    /// The workspace mutation lock is held by another operation.
    Locked,
    /// Adapter failure, unexpected exception, index/filesystem disagreement.
    InternalError,
}

impl ErrorKind {
    /// Returns the machine-readable code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "NOTFOUND",
            Self::AlreadyExist => "ALREADYEXIST",
            Self::Corrupt => "CORRUPT",
            Self::PreconditionFailed => "PRECONDITIONFAILED",
            Self::FileTypeNotSupported => "FILETYPENOTSUPPORTED",
            Self::Locked => "LOCKED",
            Self::InternalError => "INTERNALERROR",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error type for the asset hub.
#[derive(Error, Debug)]
pub enum AhubError {
    /// No asset, resource or namespace matched.
    #[error("not found: {0}")]
    NotFound(String),

    /// The target already exists.
    #[error("already exists: {0}")]
    AlreadyExist(String),

    /// Deletion refused because other assets still point at the target.
    #[error("{reference} is still referenced by: {}", .referrers.join(", "))]
    ReferencedBy {
        /// The ref whose deletion was refused.
        reference: String,
        /// Every asset ref that still lists it as `main` or a dependency.
        referrers: Vec<String>,
    },

    /// The document or ref failed validation.
    #[error("corrupt: {0}")]
    Corrupt(String),

    /// The caller's view of the asset is stale.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// The path resolves to something other than a file or directory.
    #[error("file type not supported: {0}")]
    FileTypeNotSupported(String),

    /// Another mutation holds the workspace lock.
    #[error("workspace is locked: {0}")]
    Locked(String),

    /// Adapter or consistency failure.
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O error from the filesystem adapter.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AhubError {
    /// Classify this error into the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AlreadyExist(_) | Self::ReferencedBy { .. } => ErrorKind::AlreadyExist,
            Self::Corrupt(_) => ErrorKind::Corrupt,
            Self::PreconditionFailed(_) => ErrorKind::PreconditionFailed,
            Self::FileTypeNotSupported(_) => ErrorKind::FileTypeNotSupported,
            Self::Locked(_) => ErrorKind::Locked,
            Self::Io(e) if e.kind() == std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            Self::Internal(_) | Self::Io(_) | Self::Json(_) => ErrorKind::InternalError,
        }
    }

    /// True for a missing ref as well as a raw `ENOENT` from an adapter.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Build an `ENOENT`-style I/O error for a relative path.
    ///
    /// In-memory adapters use this so callers see the same shape a real
    /// filesystem produces.
    pub fn enoent(path: &str) -> Self {
        Self::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no such file or directory: {path}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_codes_are_stable() {
        assert_eq!(ErrorKind::NotFound.as_str(), "NOTFOUND");
        assert_eq!(ErrorKind::AlreadyExist.as_str(), "ALREADYEXIST");
        assert_eq!(ErrorKind::Corrupt.as_str(), "CORRUPT");
        assert_eq!(ErrorKind::PreconditionFailed.as_str(), "PRECONDITIONFAILED");
        assert_eq!(
            ErrorKind::FileTypeNotSupported.as_str(),
            "FILETYPENOTSUPPORTED"
        );
        assert_eq!(ErrorKind::Locked.as_str(), "LOCKED");
        assert_eq!(ErrorKind::InternalError.as_str(), "INTERNALERROR");
    }

    #[test]
    fn referenced_by_lists_referrers() {
        let err = AhubError::ReferencedBy {
            reference: "/assets/a.level".to_string(),
            referrers: vec!["/assets/b.level".to_string(), "/assets/c.level".to_string()],
        };
        assert_eq!(err.kind(), ErrorKind::AlreadyExist);
        let msg = err.to_string();
        assert!(msg.contains("/assets/b.level"));
        assert!(msg.contains("/assets/c.level"));
    }

    #[test]
    fn enoent_classifies_as_not_found() {
        let err = AhubError::enoent("x/y.png");
        assert!(err.is_not_found());
        assert!(err.to_string().contains("x/y.png"));
    }

    #[test]
    fn other_io_errors_are_internal() {
        let err = AhubError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        assert_eq!(err.kind(), ErrorKind::InternalError);
        assert!(!err.is_not_found());
    }

    #[test]
    fn json_errors_are_internal() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(AhubError::from(parse).kind(), ErrorKind::InternalError);
    }

    #[test]
    fn display_carries_context() {
        assert!(AhubError::Corrupt("bad ref".into()).to_string().contains("bad ref"));
        assert!(AhubError::Locked("ws".into()).to_string().contains("locked"));
        assert!(AhubError::NotFound("/assets/x".into())
            .to_string()
            .contains("/assets/x"));
    }
}
