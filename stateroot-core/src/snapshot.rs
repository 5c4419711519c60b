//! Previously recorded backend configuration
//!
//! The infrastructure tool records the backend it was last initialised with
//! (in Terraform's case under `.terraform/terraform.tfstate`). This module
//! reads that record so it can be compared against a freshly requested
//! configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{ConfigMap, strip_nulls};

/// Errors that can occur when loading a snapshot
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Failed to read snapshot {path}: {message}")]
    Io { path: String, message: String },

    #[error("Invalid snapshot {path}: {message}")]
    Invalid { path: String, message: String },
}

/// Last-known backend configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendSnapshot {
    /// Backend kind (e.g., "azurerm")
    #[serde(rename = "type")]
    pub backend_type: String,
    /// Backend attributes as recorded
    #[serde(default)]
    pub config: ConfigMap,
}

/// The part of a tool working-directory state file we care about
#[derive(Debug, Deserialize)]
struct WorkingDirState {
    #[serde(default)]
    backend: Option<BackendSnapshot>,
}

impl BackendSnapshot {
    pub fn new(backend_type: impl Into<String>, config: ConfigMap) -> Self {
        Self {
            backend_type: backend_type.into(),
            config,
        }
    }

    /// Load a snapshot stored as `{"type": ..., "config": {...}}`
    pub fn from_json_file(path: &Path) -> Result<Self, SnapshotError> {
        let content = read(path)?;
        serde_json::from_str(&content).map_err(|e| SnapshotError::Invalid {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Load the `backend` section of a working-directory state file
    ///
    /// Returns `None` when the file does not exist or records no backend.
    /// Attributes recorded as `null` were never set and are dropped.
    pub fn from_working_dir_state(path: &Path) -> Result<Option<Self>, SnapshotError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = read(path)?;
        let state: WorkingDirState =
            serde_json::from_str(&content).map_err(|e| SnapshotError::Invalid {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        Ok(state.backend.map(|backend| BackendSnapshot {
            config: strip_nulls(&backend.config),
            ..backend
        }))
    }
}

fn read(path: &Path) -> Result<String, SnapshotError> {
    std::fs::read_to_string(path).map_err(|e| SnapshotError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}
