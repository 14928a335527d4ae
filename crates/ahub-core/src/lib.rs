//! # ahub-core — Foundational Types for the Asset Hub
//!
//! This crate is the bedrock of the asset hub workspace. It defines the
//! primitives every other crate shares: the error taxonomy, the reference
//! codec that maps refs onto the version-controlled tree, the asset document
//! model, and the adapter contracts for the filesystem and the VCS.
//!
//! ## Key Design Principles
//!
//! 1. **One error taxonomy.** [`AhubError::kind()`] collapses every failure
//!    into NOTFOUND, ALREADYEXIST, CORRUPT, PRECONDITIONFAILED,
//!    FILETYPENOTSUPPORTED, LOCKED or INTERNALERROR. Raw `ENOENT` never
//!    crosses a component boundary untranslated.
//!
//! 2. **The codec is pure.** [`RefCodec`] holds its configuration explicitly;
//!    there is no module-level state. `unformat_namespaces(format_namespaces(p)) == p`
//!    for every valid asset path.
//!
//! 3. **Normalized documents.** [`Asset::normalize()`] sorts and de-duplicates
//!    `tags` and `dependencies`; every write path goes through it.
//!
//! 4. **UTC-only timestamps.** [`Timestamp`] renders ISO-8601 with a `Z`
//!    suffix and millisecond precision, which is what the optimistic
//!    concurrency check on `modified` compares.
//!
//! 5. **Adapters are traits.** [`Filesystem`] and [`VcsAdapter`] are
//!    object-safe async traits so the graph and workspace hold
//!    `Arc<dyn ...>` handles and tests substitute in-memory fakes.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `ahub-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod asset;
pub mod digest;
pub mod error;
pub mod fs;
pub mod refs;
pub mod temporal;
pub mod vcs;

// Re-export primary types for ergonomic imports.
pub use asset::{Asset, AssetDraft, AssetMeta};
pub use digest::{sha256_hex, ContentDigest, StreamingDigest};
pub use error::{AhubError, ErrorKind};
pub use fs::{ByteStream, EntryKind, Filesystem, LocalFilesystem, PathPredicate};
pub use refs::{RefCodec, ASSETS_PREFIX, NAMESPACE_SENTINEL, RESOURCES_PREFIX};
pub use temporal::Timestamp;
pub use vcs::{
    project_id_from_remote, BranchList, BranchStatus, ChangedPath, CommitLogEntry,
    CommitSet, FileStatus, LocalBranch, LogQuery, PushRequest, RemoteBranch, Revision,
    StatusEntry, VcsAdapter, VcsBackend,
};
