use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::contract::Destination;

const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
const DEFAULT_READ_URL_EXPIRES_IN: u64 = 3600;

/// Per-run upload settings: where files go and what is accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub directory: String,
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub entity_id: Option<i64>,
    /// Send a SHA-256 digest so the backend can detect duplicates.
    #[serde(default = "default_true")]
    pub compute_digest: bool,
    /// Requested presign ticket lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Lifetime requested for temporary read URLs.
    #[serde(default = "default_read_url_expires_in")]
    pub read_url_expires_in: u64,
    #[serde(default)]
    pub limits: UploadLimits,
}

impl UploadConfig {
    pub fn new(directory: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            entity_type: None,
            entity_id: None,
            compute_digest: true,
            expires_in: None,
            read_url_expires_in: DEFAULT_READ_URL_EXPIRES_IN,
            limits: UploadLimits::default(),
        }
    }

    pub fn destination(&self) -> Destination {
        Destination {
            directory: self.directory.clone(),
            entity_type: self.entity_type.clone(),
            entity_id: self.entity_id,
        }
    }

    pub fn trace_loaded(&self) {
        info!(
            directory = %self.directory,
            entity_type = self.entity_type.as_deref().unwrap_or("-"),
            entity_id = ?self.entity_id,
            max_file_size = self.limits.max_file_size,
            "Loaded UploadConfig"
        );
        debug!(?self, "UploadConfig loaded (full debug)");
    }
}

/// Local acceptance rules applied before any network call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadLimits {
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Exact types or `type/*` wildcards. Empty accepts everything.
    #[serde(default = "default_allowed_mime_types")]
    pub allowed_mime_types: Vec<String>,
    /// Lowercase extensions without the dot. Empty accepts everything.
    #[serde(default)]
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            allowed_mime_types: default_allowed_mime_types(),
            allowed_extensions: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

fn default_read_url_expires_in() -> u64 {
    DEFAULT_READ_URL_EXPIRES_IN
}

fn default_allowed_mime_types() -> Vec<String> {
    ["image/*", "application/pdf"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
