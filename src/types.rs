//! Shared types passed between the upload stages.
//!
//! A batch flows through these in one direction: the caller supplies a
//! [`WebhookTarget`], every upload task produces one [`UploadOutcome`], and the
//! aggregator folds the outcomes into progress.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Destination of a batch. Immutable once the batch starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookTarget {
    pub url: String,
    /// Store name the URL was resolved from, if any. Only used for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl WebhookTarget {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: None,
        }
    }

    pub fn named(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: Some(name.into()),
        }
    }
}

impl fmt::Display for WebhookTarget {
    /// Webhook URLs embed a secret token, so only the name is ever printed.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "(direct URL)"),
        }
    }
}

/// Terminal result of one upload task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub path: PathBuf,
    pub success: bool,
    pub message: String,
}

impl UploadOutcome {
    pub fn succeeded(path: &Path, message: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(path: &Path, message: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            success: false,
            message: message.into(),
        }
    }
}

/// Display name for a file: its final path component, or the whole path.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
