//! # ahub-identity — Resource Identity Store
//!
//! Content fingerprints for resources, kept as sidecar documents so a
//! workspace can detect presence, absence and staleness without holding the
//! bytes:
//!
//! - **Streaming SHA-256** over the filesystem adapter with a bounded buffer.
//! - **Sidecars** `{ "hash": ... }` under the identity root, mirroring the
//!   resource tree.
//! - **Compare** with distinguishable no-identity / no-resource codes.
//! - **Build-and-stage**: refresh or prune sidecars for a commit and return
//!   the sidecar paths to push alongside it.
//!
//! ## Crate Policy
//!
//! - Depends only on `ahub-core` internally. The asset graph's reference
//!   count arrives through the [`ReferenceCounter`] trait.
//! - No hashing of whole files in memory.

pub mod hash;
pub mod staging;
pub mod store;

pub use hash::{hash_path, hash_reader, HASH_BUFFER_SIZE};
pub use staging::{IdentityStaging, ReferenceCounter, STAGING_CONCURRENCY};
pub use store::{CompareError, IdentityRecord, IdentityStore, SidecarWrite};
