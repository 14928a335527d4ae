//! Persisted workspace properties: the stage and the subscriptions.
//!
//! Stored as one JSON document at the configured properties path:
//!
//! ```json
//! { "stage": ["/assets/a.level"], "subscriptions": [ ... ] }
//! ```

use std::sync::Arc;

use ahub_core::{AhubError, Filesystem};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::subscription::Subscription;

/// In-memory form of the properties document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceProperties {
    /// Staged asset and namespace refs, in staging order, without repeats.
    #[serde(default)]
    pub stage: Vec<String>,
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
}

impl WorkspaceProperties {
    /// Append refs not already staged. Returns how many were added.
    pub fn stage<I, S>(&mut self, references: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let before = self.stage.len();
        for reference in references {
            let reference = reference.into();
            if !self.stage.contains(&reference) {
                self.stage.push(reference);
            }
        }
        self.stage.len() - before
    }

    /// Drop refs from the stage. Returns how many were removed.
    pub fn unstage<S: AsRef<str>>(&mut self, references: &[S]) -> usize {
        let before = self.stage.len();
        self.stage
            .retain(|staged| !references.iter().any(|r| r.as_ref() == staged));
        before - self.stage.len()
    }

    pub fn clear_stage(&mut self) {
        self.stage.clear();
    }

    pub fn subscription(&self, id: Uuid) -> Option<&Subscription> {
        self.subscriptions.iter().find(|s| s.id == id)
    }

    /// Remove a subscription by id, returning it.
    pub fn remove_subscription(&mut self, id: Uuid) -> Option<Subscription> {
        let position = self.subscriptions.iter().position(|s| s.id == id)?;
        Some(self.subscriptions.remove(position))
    }
}

/// Reads and writes the properties document through the filesystem adapter.
#[derive(Clone)]
pub struct PropertiesStore {
    fs: Arc<dyn Filesystem>,
    path: String,
}

impl std::fmt::Debug for PropertiesStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertiesStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl PropertiesStore {
    pub fn new(fs: Arc<dyn Filesystem>, path: impl Into<String>) -> Self {
        Self {
            fs,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Load the document; a missing file is an empty workspace.
    ///
    /// # Errors
    ///
    /// [`AhubError::Corrupt`] when the document does not parse.
    pub async fn load(&self) -> Result<WorkspaceProperties, AhubError> {
        match self.fs.read_json(&self.path).await {
            Ok(value) => serde_json::from_value(value).map_err(|e| {
                AhubError::Corrupt(format!("invalid properties at {}: {e}", self.path))
            }),
            Err(e) if e.is_not_found() => Ok(WorkspaceProperties::default()),
            Err(e) => Err(e),
        }
    }

    pub async fn save(&self, properties: &WorkspaceProperties) -> Result<(), AhubError> {
        let value = serde_json::to_value(properties)?;
        self.fs.write_json(&self.path, &value).await
    }
}
