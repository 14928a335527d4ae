//! Workspace configuration.
//!
//! Values resolve in order: an explicit YAML file, then `AHUB_*`
//! environment variables, then built-in defaults. The resolved
//! [`WorkspaceConfig`] is passed explicitly to every component that needs
//! it; nothing reads configuration from global state.

use std::path::{Path, PathBuf};

use ahub_core::{RefCodec, VcsBackend};
use serde::Deserialize;

const DEFAULT_ASSETS_ROOT: &str = "assets";
const DEFAULT_IDENTITY_ROOT: &str = ".ahub/identity";
const DEFAULT_PROPERTIES_PATH: &str = ".ahub/properties.json";
const DEFAULT_AUTHOR: &str = "unknown";

/// Resolved configuration of one workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceConfig {
    /// Working-tree root on the local filesystem.
    pub root: PathBuf,
    /// Directory holding asset documents, relative to `root`.
    pub assets_root: String,
    /// Directory holding identity sidecars, relative to `root`.
    pub identity_root: String,
    /// Stage and subscriptions document, relative to `root`.
    pub properties_path: String,
    pub backend: VcsBackend,
    /// Author stamped on created assets.
    pub author: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            assets_root: DEFAULT_ASSETS_ROOT.to_string(),
            identity_root: DEFAULT_IDENTITY_ROOT.to_string(),
            properties_path: DEFAULT_PROPERTIES_PATH.to_string(),
            backend: VcsBackend::Git,
            author: DEFAULT_AUTHOR.to_string(),
        }
    }
}

/// On-disk YAML shape; every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub root: Option<PathBuf>,
    pub assets_root: Option<String>,
    pub identity_root: Option<String>,
    pub properties_path: Option<String>,
    pub backend: Option<String>,
    pub author: Option<String>,
}

impl ConfigFile {
    /// Parse a YAML configuration file.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.display().to_string(), e.to_string()))?;
        serde_yaml::from_str(&raw)
            .map_err(|e| ConfigError::Parse(path.display().to_string(), e.to_string()))
    }
}

impl WorkspaceConfig {
    /// Load configuration from an optional YAML file and the environment.
    ///
    /// Variables:
    /// - `AHUB_ROOT` (default: `.`)
    /// - `AHUB_ASSETS_ROOT` (default: `assets`)
    /// - `AHUB_IDENTITY_ROOT` (default: `.ahub/identity`)
    /// - `AHUB_BACKEND` (`git` or `object_storage`, default: `git`)
    /// - `AHUB_AUTHOR` (default: `unknown`)
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match file {
            Some(path) => ConfigFile::read(path)?,
            None => ConfigFile::default(),
        };
        Self::resolve(file, |var| std::env::var(var).ok())
    }

    /// Merge a parsed file with an environment lookup and the defaults.
    pub fn resolve(
        file: ConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let pick = |value: Option<String>, var: &str, default: String| {
            value.or_else(|| env(var)).unwrap_or(default)
        };

        let root = file
            .root
            .or_else(|| env("AHUB_ROOT").map(PathBuf::from))
            .unwrap_or(defaults.root);
        let backend_raw = pick(file.backend, "AHUB_BACKEND", defaults.backend.to_string());
        let backend = backend_raw
            .parse::<VcsBackend>()
            .map_err(|e| ConfigError::InvalidValue("backend".to_string(), e.to_string()))?;

        let config = Self {
            root,
            assets_root: pick(file.assets_root, "AHUB_ASSETS_ROOT", defaults.assets_root),
            identity_root: pick(file.identity_root, "AHUB_IDENTITY_ROOT", defaults.identity_root),
            properties_path: file.properties_path.unwrap_or(defaults.properties_path),
            backend,
            author: pick(file.author, "AHUB_AUTHOR", defaults.author),
        };
        config.validate()?;
        Ok(config)
    }

    /// The same configuration rooted elsewhere.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Reference codec for this workspace's layout.
    pub fn codec(&self) -> RefCodec {
        RefCodec::new(&self.assets_root, &self.identity_root)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let assets = self.assets_root.trim_matches('/');
        let identity = self.identity_root.trim_matches('/');
        let properties = self.properties_path.trim_matches('/');
        if assets.is_empty() {
            return Err(invalid("assets_root", "must not be empty"));
        }
        if identity.is_empty() {
            return Err(invalid("identity_root", "must not be empty"));
        }
        if properties.is_empty() {
            return Err(invalid("properties_path", "must not be empty"));
        }
        if nests(assets, identity) {
            return Err(invalid(
                "identity_root",
                "must not overlap the assets root",
            ));
        }
        if nests(assets, properties) || nests(identity, properties) {
            return Err(invalid(
                "properties_path",
                "must live outside the assets and identity trees",
            ));
        }
        Ok(())
    }
}

/// True when one path is the other or lies inside it.
fn nests(a: &str, b: &str) -> bool {
    let inside = |outer: &str, inner: &str| {
        inner == outer
            || inner
                .strip_prefix(outer)
                .is_some_and(|rest| rest.starts_with('/'))
    };
    inside(a, b) || inside(b, a)
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue(key.to_string(), reason.to_string())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {0}: {1}")]
    Read(String, String),
    #[error("invalid config file {0}: {1}")]
    Parse(String, String),
    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_without_file_or_env() {
        let config = WorkspaceConfig::resolve(ConfigFile::default(), env(&[])).unwrap();
        assert_eq!(config, WorkspaceConfig::default());
        assert_eq!(config.codec(), RefCodec::default());
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = WorkspaceConfig::resolve(
            ConfigFile::default(),
            env(&[
                ("AHUB_ASSETS_ROOT", "library"),
                ("AHUB_BACKEND", "object_storage"),
                ("AHUB_AUTHOR", "ci"),
                ("AHUB_ROOT", "/srv/tree"),
            ]),
        )
        .unwrap();
        assert_eq!(config.assets_root, "library");
        assert_eq!(config.backend, VcsBackend::ObjectStorage);
        assert_eq!(config.author, "ci");
        assert_eq!(config.root, PathBuf::from("/srv/tree"));
    }

    #[test]
    fn file_takes_precedence_over_environment() {
        let file = ConfigFile {
            author: Some("from-file".into()),
            ..ConfigFile::default()
        };
        let config =
            WorkspaceConfig::resolve(file, env(&[("AHUB_AUTHOR", "from-env")])).unwrap();
        assert_eq!(config.author, "from-file");
    }

    #[test]
    fn yaml_file_is_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ahub.yaml");
        std::fs::write(&path, "assets_root: lib\nbackend: git\nauthor: yaml\n").unwrap();
        let file = ConfigFile::read(&path).unwrap();
        let config = WorkspaceConfig::resolve(file, env(&[])).unwrap();
        assert_eq!(config.assets_root, "lib");
        assert_eq!(config.author, "yaml");
    }

    #[test]
    fn unknown_yaml_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ahub.yaml");
        std::fs::write(&path, "asset_root: typo\n").unwrap();
        assert!(matches!(ConfigFile::read(&path), Err(ConfigError::Parse(..))));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = ConfigFile::read(Path::new("/nonexistent/ahub.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read(..)));
    }

    #[test]
    fn overlapping_roots_are_rejected() {
        let file = ConfigFile {
            identity_root: Some("assets/.identity".into()),
            ..ConfigFile::default()
        };
        let err = WorkspaceConfig::resolve(file, env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref key, _) if key == "identity_root"));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let err = WorkspaceConfig::resolve(ConfigFile::default(), env(&[("AHUB_BACKEND", "svn")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref key, _) if key == "backend"));
    }
}
