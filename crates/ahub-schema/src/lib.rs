//! # ahub-schema — Asset Document Validation
//!
//! Runtime JSON Schema validation for asset documents.
//!
//! ## Runtime Validation (`validate`)
//!
//! The [`validate`] module compiles the bundled `asset.schema.json` once and
//! validates documents against it. Key function:
//!
//! - [`SchemaValidator::validate_asset`] validates the document shape and
//!   then checks `meta.version` against [`SUPPORTED_VERSIONS`].
//!
//! ## Crate Policy
//!
//! - Depends only on `ahub-core` internally.
//! - Schema validation is a trust boundary: invalid documents are rejected
//!   with structured errors including instance path, schema path and message.
//! - Validation failures convert into [`ahub_core::AhubError::Corrupt`].

pub mod validate;

pub use validate::{
    is_supported_version, SchemaValidationError, SchemaValidator, ValidationViolations,
    Violation, ASSET_SCHEMA, SUPPORTED_VERSIONS,
};
