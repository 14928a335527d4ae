//! # ahub-graph — The Asset Graph
//!
//! Integrity-checked storage for asset documents on top of the filesystem
//! adapter and a searchable index.
//!
//! ## Modules
//!
//! - [`graph`]: [`AssetGraph`] with get/list/search, create, rename (with the
//!   inbound-dependency cascade), replace, delete and reindex.
//! - [`index`]: the [`AssetIndex`] contract and [`MemoryIndex`].
//! - [`query`]: the [`QueryPredicate`] seam for search strings and the
//!   default [`TermPredicate`].
//! - [`validation`]: path validation, case-collision detection and
//!   full/bare validation records.
//!
//! ## Crate Policy
//!
//! - The graph is the only writer of the asset tree and the index.
//! - Filesystem and index writes of one mutation are joined; failure of
//!   either surfaces as failure of the operation.

pub mod graph;
pub mod index;
pub mod query;
pub mod validation;

pub use graph::{
    AssetGraph, AssetList, ListOptions, ReindexReport, DEFAULT_MAX_RESULTS, MAX_RESULTS_CAP,
};
pub use index::{AssetIndex, IndexQuery, MemoryIndex};
pub use query::{CompiledQuery, QueryPredicate, TermPredicate};
pub use validation::{are_equivalent_refs, ValidationMode, ValidationRecord, ValidationState};
