//! # Schema Validation
//!
//! Runtime validation of asset documents against the bundled JSON Schema
//! (Draft 2020-12).
//!
//! ## Trust Boundary
//!
//! Every asset write passes through [`SchemaValidator::validate_asset`]
//! before it touches disk. Documents that fail are rejected with structured
//! violations carrying the instance path, the schema path and a message.
//!
//! ## Schema Resolution
//!
//! The asset schema is compiled into the binary with `include_str!` and
//! uses only internal `#/$defs/...` references, so no retriever is needed.
//! [`SchemaValidator::from_value`] accepts a replacement schema for tests
//! and for deployments that extend the document shape.

use std::fmt;

use ahub_core::AhubError;
use jsonschema::Validator;
use serde_json::Value;
use thiserror::Error;

/// The asset schema shipped with this crate.
pub const ASSET_SCHEMA: &str = include_str!("../schemas/asset.schema.json");

const ASSET_SCHEMA_NAME: &str = "asset.schema.json";

/// Document format versions this build reads and writes.
pub const SUPPORTED_VERSIONS: &[&str] = &["1.0.0"];

/// Error during schema validation.
#[derive(Error, Debug)]
pub enum SchemaValidationError {
    /// The document did not conform to the schema.
    #[error("validation failed against schema '{schema_name}':\n{violations}")]
    ValidationFailed {
        /// Name of the schema that was validated against.
        schema_name: String,
        /// Structured list of individual violations.
        violations: ValidationViolations,
    },

    /// The document declares a format version this build does not support.
    #[error("unsupported document version {version:?} (supported: {})", SUPPORTED_VERSIONS.join(", "))]
    UnsupportedVersion {
        /// The version string found in `meta.version`.
        version: String,
    },

    /// The schema itself is not valid JSON.
    #[error("schema load error for '{schema_name}': {reason}")]
    SchemaLoadError {
        /// Schema filename or identifier.
        schema_name: String,
        /// Reason the schema could not be loaded.
        reason: String,
    },

    /// The compiled validator could not be built (e.g., invalid schema).
    #[error("validator build error for schema '{schema_name}': {reason}")]
    ValidatorBuildError {
        /// Schema filename or identifier.
        schema_name: String,
        /// Reason the validator could not be built.
        reason: String,
    },
}

impl From<SchemaValidationError> for AhubError {
    fn from(err: SchemaValidationError) -> Self {
        match err {
            SchemaValidationError::ValidationFailed { .. }
            | SchemaValidationError::UnsupportedVersion { .. } => {
                AhubError::Corrupt(err.to_string())
            }
            SchemaValidationError::SchemaLoadError { .. }
            | SchemaValidationError::ValidatorBuildError { .. } => {
                AhubError::Internal(err.to_string())
            }
        }
    }
}

/// A single validation violation with structured context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// JSON Pointer path to the violating field in the instance.
    pub instance_path: String,
    /// JSON Pointer path within the schema that triggered the error.
    pub schema_path: String,
    /// Human-readable description of the violation.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_path.is_empty() {
            write!(f, "  (root): {}", self.message)
        } else {
            write!(f, "  {}: {}", self.instance_path, self.message)
        }
    }
}

/// Collection of validation violations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationViolations {
    violations: Vec<Violation>,
}

impl ValidationViolations {
    /// Returns the number of violations.
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// Returns true if there are no violations.
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Returns a slice of all violations.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// The first violation, used as the summary in validation records.
    pub fn first(&self) -> Option<&Violation> {
        self.violations.first()
    }

    /// Consumes self and returns the inner Vec.
    pub fn into_inner(self) -> Vec<Violation> {
        self.violations
    }
}

impl fmt::Display for ValidationViolations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.violations.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

/// True when `version` is a format version this build understands.
pub fn is_supported_version(version: &str) -> bool {
    SUPPORTED_VERSIONS.contains(&version)
}

/// A compiled asset-document validator backed by the `jsonschema` crate.
///
/// `SchemaValidator` is `Send + Sync`; build it once and share it behind an
/// `Arc`.
pub struct SchemaValidator {
    schema_name: String,
    validator: Validator,
}

impl fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaValidator")
            .field("schema_name", &self.schema_name)
            .finish_non_exhaustive()
    }
}

impl SchemaValidator {
    /// Compile the bundled asset schema.
    ///
    /// # Errors
    ///
    /// Returns `SchemaValidationError::SchemaLoadError` or
    /// `ValidatorBuildError` if the bundled schema is broken.
    pub fn new() -> Result<Self, SchemaValidationError> {
        let value: Value = serde_json::from_str(ASSET_SCHEMA).map_err(|e| {
            SchemaValidationError::SchemaLoadError {
                schema_name: ASSET_SCHEMA_NAME.to_string(),
                reason: format!("invalid JSON: {e}"),
            }
        })?;
        Self::from_value(ASSET_SCHEMA_NAME, &value)
    }

    /// Compile an arbitrary schema value.
    ///
    /// # Errors
    ///
    /// Returns `SchemaValidationError::ValidatorBuildError` if the schema
    /// does not compile.
    pub fn from_value(
        schema_name: impl Into<String>,
        schema: &Value,
    ) -> Result<Self, SchemaValidationError> {
        let schema_name = schema_name.into();
        let validator = jsonschema::options()
            .with_draft(jsonschema::Draft::Draft202012)
            .build(schema)
            .map_err(|e| SchemaValidationError::ValidatorBuildError {
                schema_name: schema_name.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            schema_name,
            validator,
        })
    }

    /// Name of the compiled schema.
    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    /// Collect every violation of `instance` without failing.
    pub fn violations(&self, instance: &Value) -> ValidationViolations {
        let violations = self
            .validator
            .iter_errors(instance)
            .map(|e| Violation {
                instance_path: e.instance_path.to_string(),
                schema_path: e.schema_path.to_string(),
                message: e.to_string(),
            })
            .collect();
        ValidationViolations { violations }
    }

    /// Validate a parsed JSON value against the compiled schema.
    ///
    /// # Errors
    ///
    /// Returns `SchemaValidationError::ValidationFailed` with structured
    /// violation details if the document is invalid.
    pub fn validate_document(&self, instance: &Value) -> Result<(), SchemaValidationError> {
        let violations = self.violations(instance);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(SchemaValidationError::ValidationFailed {
                schema_name: self.schema_name.clone(),
                violations,
            })
        }
    }

    /// Validate an asset document: schema first, then `meta.version`.
    ///
    /// # Errors
    ///
    /// `ValidationFailed` for schema violations, `UnsupportedVersion` for a
    /// well-formed document in a format this build does not read.
    pub fn validate_asset(&self, instance: &Value) -> Result<(), SchemaValidationError> {
        self.validate_document(instance)?;
        let version = instance
            .pointer("/meta/version")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if !is_supported_version(version) {
            return Err(SchemaValidationError::UnsupportedVersion {
                version: version.to_string(),
            });
        }
        Ok(())
    }
}
