//! # Reference Codec
//!
//! Maps between three spaces:
//!
//! - **Refs** — user-facing identifiers, `/assets/<namespace>/<name>.<ext>`
//!   for assets and `/resources/<path>` for resources. A trailing `/` marks a
//!   namespace.
//! - **Relative paths** — locations inside the working tree. Assets live
//!   under the configured assets root with namespace-encoded directories;
//!   resources map by plain prefix substitution.
//! - **Identity paths** — sidecar locations mirroring resource paths under the
//!   identity root.
//!
//! ## Namespace Encoding
//!
//! A flat VCS tree cannot hold a namespace directory `a/` next to a leaf file
//! named `a`. Every intermediate namespace segment is therefore written with
//! a leading [`NAMESPACE_SENTINEL`]: `/assets/maps/forest.level` lives at
//! `assets/$maps/forest.level`. The assets root and the terminal leaf are never
//! prefixed, and the terminal empty segment of a namespace path stays empty.
//!
//! `unformat_namespaces(format_namespaces(p)) == p` for every valid path.

use crate::error::AhubError;

/// Prefix of every asset ref.
pub const ASSETS_PREFIX: &str = "/assets/";

/// Prefix of every resource ref.
pub const RESOURCES_PREFIX: &str = "/resources/";

/// Marks an intermediate namespace directory on disk.
pub const NAMESPACE_SENTINEL: char = '$';

const DEFAULT_ASSETS_ROOT: &str = "assets";
const DEFAULT_IDENTITY_ROOT: &str = ".ahub/identity";
const IDENTITY_SUFFIX: &str = ".json";

/// Bidirectional mapping between refs and working-tree paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefCodec {
    assets_root: String,
    identity_root: String,
}

impl Default for RefCodec {
    fn default() -> Self {
        Self::new(DEFAULT_ASSETS_ROOT, DEFAULT_IDENTITY_ROOT)
    }
}

impl RefCodec {
    /// Create a codec for the given assets and identity roots.
    ///
    /// Leading and trailing slashes are ignored.
    pub fn new(assets_root: impl AsRef<str>, identity_root: impl AsRef<str>) -> Self {
        Self {
            assets_root: assets_root.as_ref().trim_matches('/').to_string(),
            identity_root: identity_root.as_ref().trim_matches('/').to_string(),
        }
    }

    /// Directory (relative to the working tree) holding asset documents.
    pub fn assets_root(&self) -> &str {
        &self.assets_root
    }

    /// Directory (relative to the working tree) holding identity sidecars.
    pub fn identity_root(&self) -> &str {
        &self.identity_root
    }

    /// Prefix every intermediate namespace segment with the sentinel.
    pub fn format_namespaces(&self, path: &str) -> String {
        let (head, body) = self.split_root(path);
        format!("{head}{}", format_body(body))
    }

    /// Strip one leading sentinel from every intermediate namespace segment.
    pub fn unformat_namespaces(&self, path: &str) -> String {
        let (head, body) = self.split_root(path);
        format!("{head}{}", unformat_body(body))
    }

    /// Resolve a ref to its location in the working tree.
    ///
    /// # Errors
    ///
    /// Returns [`AhubError::Corrupt`] for refs outside `/assets/` and
    /// `/resources/`, and for an empty resource path.
    pub fn ref_to_relative_path(&self, reference: &str) -> Result<String, AhubError> {
        if let Some(body) = asset_body(reference) {
            return Ok(format!("{}/{}", self.assets_root, format_body(body)));
        }
        match reference.strip_prefix(RESOURCES_PREFIX) {
            Some(rest) if !rest.is_empty() => Ok(rest.to_string()),
            _ => Err(AhubError::Corrupt(format!(
                "{reference} is neither an asset nor a resource ref"
            ))),
        }
    }

    /// Resolve a working-tree path back to its ref.
    ///
    /// Paths under the assets root decode to asset refs; anything else is a
    /// resource.
    ///
    /// # Errors
    ///
    /// Returns [`AhubError::Corrupt`] for an empty path or a path inside the
    /// identity tree, which has no ref of its own.
    pub fn relative_path_to_ref(&self, path: &str) -> Result<String, AhubError> {
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            return Err(AhubError::Corrupt("empty path has no ref".to_string()));
        }
        if self.is_identity_path(path) {
            return Err(AhubError::Corrupt(format!(
                "{path} is an identity sidecar, not a resource"
            )));
        }
        if path == self.assets_root {
            return Ok(ASSETS_PREFIX.to_string());
        }
        if let Some(body) = self.strip_assets_root(path) {
            return Ok(format!("{ASSETS_PREFIX}{}", unformat_body(body)));
        }
        Ok(format!("{RESOURCES_PREFIX}{path}"))
    }

    /// True when the relative path lies under the assets root.
    pub fn is_asset_path(&self, path: &str) -> bool {
        let path = path.trim_start_matches('/');
        path == self.assets_root || self.strip_assets_root(path).is_some()
    }

    /// Location of the identity sidecar for a resource ref.
    ///
    /// # Errors
    ///
    /// Returns [`AhubError::Corrupt`] if `reference` is not a resource ref.
    pub fn identity_path(&self, reference: &str) -> Result<String, AhubError> {
        if !is_resource_ref(reference) {
            return Err(AhubError::Corrupt(format!(
                "{reference} is not a resource ref; only resources carry identities"
            )));
        }
        let relative = self.ref_to_relative_path(reference)?;
        Ok(format!("{}/{relative}{IDENTITY_SUFFIX}", self.identity_root))
    }

    /// True when the relative path lies inside the identity tree.
    pub fn is_identity_path(&self, path: &str) -> bool {
        let path = path.trim_start_matches('/');
        path == self.identity_root
            || path
                .strip_prefix(self.identity_root.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }

    fn strip_assets_root<'a>(&self, path: &'a str) -> Option<&'a str> {
        path.strip_prefix(self.assets_root.as_str())?.strip_prefix('/')
    }

    /// Split off the leading slash and, when present, the assets root.
    /// The head is never sentinel-encoded.
    fn split_root<'a>(&self, path: &'a str) -> (&'a str, &'a str) {
        let lead = usize::from(path.starts_with('/'));
        let rest = &path[lead..];
        if rest == self.assets_root {
            return (path, "");
        }
        match self.strip_assets_root(rest) {
            Some(body) => (&path[..path.len() - body.len()], body),
            None => (&path[..lead], rest),
        }
    }
}

fn format_body(body: &str) -> String {
    map_intermediate_segments(body, |segment| format!("{NAMESPACE_SENTINEL}{segment}"))
}

fn unformat_body(body: &str) -> String {
    map_intermediate_segments(body, |segment| {
        segment
            .strip_prefix(NAMESPACE_SENTINEL)
            .unwrap_or(segment)
            .to_string()
    })
}

fn map_intermediate_segments(body: &str, f: impl Fn(&str) -> String) -> String {
    let segments: Vec<&str> = body.split('/').collect();
    let last = segments.len() - 1;
    segments
        .iter()
        .enumerate()
        .map(|(i, segment)| {
            if i == last || segment.is_empty() {
                (*segment).to_string()
            } else {
                f(segment)
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn asset_body(reference: &str) -> Option<&str> {
    if reference == "/assets" {
        return Some("");
    }
    reference.strip_prefix(ASSETS_PREFIX)
}

/// True for `/assets/...` refs, namespaces included.
pub fn is_asset_ref(reference: &str) -> bool {
    asset_body(reference).is_some()
}

/// True for `/resources/...` refs.
pub fn is_resource_ref(reference: &str) -> bool {
    reference
        .strip_prefix(RESOURCES_PREFIX)
        .is_some_and(|rest| !rest.is_empty())
}

/// A trailing `/` denotes a namespace rather than a leaf.
pub fn is_namespace(reference: &str) -> bool {
    reference.ends_with('/')
}

/// A concrete asset ref: `/assets/<ns>/<name>.<ext>` with clean segments.
pub fn is_valid_asset_ref(reference: &str) -> bool {
    let Some(body) = reference.strip_prefix(ASSETS_PREFIX) else {
        return false;
    };
    if is_namespace(reference) || !segments_are_clean(body) {
        return false;
    }
    let leaf = basename(reference);
    match leaf.rsplit_once('.') {
        Some((name, ext)) => !name.is_empty() && !ext.is_empty(),
        None => false,
    }
}

/// An asset namespace ref: `/assets/` or `/assets/<ns>/.../`.
pub fn is_valid_namespace_ref(reference: &str) -> bool {
    let Some(body) = reference.strip_prefix(ASSETS_PREFIX) else {
        return false;
    };
    if !is_namespace(reference) {
        return false;
    }
    match body.strip_suffix('/') {
        Some(inner) => segments_are_clean(inner),
        None => body.is_empty(),
    }
}

/// A resource ref with clean path segments.
pub fn is_valid_resource_ref(reference: &str) -> bool {
    match reference.strip_prefix(RESOURCES_PREFIX) {
        Some(rest) => !is_namespace(rest) && segments_are_clean(rest),
        None => false,
    }
}

fn segments_are_clean(body: &str) -> bool {
    !body.is_empty()
        && !body.contains('\\')
        && !body.contains('\0')
        && body
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
}

/// Last path component, ignoring a namespace's trailing slash.
pub fn basename(reference: &str) -> &str {
    let trimmed = reference.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// The namespace containing `reference`, with a trailing slash.
///
/// The root namespace `/assets/` is its own parent.
pub fn namespace_of(reference: &str) -> String {
    let trimmed = reference.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some((parent, _)) if parent.len() + 1 >= ASSETS_PREFIX.len() => format!("{parent}/"),
        _ => ASSETS_PREFIX.to_string(),
    }
}

/// True when `reference` lives anywhere below `namespace`.
pub fn is_child_of(reference: &str, namespace: &str) -> bool {
    is_namespace(namespace) && reference.len() > namespace.len() && reference.starts_with(namespace)
}
