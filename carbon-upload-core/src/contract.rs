//! # contract: types and transport interface for the upload pipeline
//!
//! This module defines the single trait ([`FileApi`]) through which the
//! pipeline talks to the backend and to object storage, together with the
//! plain data types that flow through it.
//!
//! ## Interface & Extensibility
//! - Implement [`FileApi`] to plug in a transport (the HTTP client in the
//!   `carbon-upload` crate, or a mock in tests).
//! - All methods are async and return [`ApiError`] on failure. Response
//!   decoding and fallback resolution happen before a value crosses this
//!   trait, see [`crate::wire`].
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall`; with the `test-export-mocks`
//!   feature (on by default) `MockFileApi` is exported for downstream tests.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
#[allow(unused_imports)]
use mockall::{automock, predicate::*};
use serde::Serialize;

use crate::error::ApiError;

/// A local file ready to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSource {
    /// Original file name, including extension.
    pub name: String,
    /// MIME type as detected locally.
    pub mime_type: String,
    pub content: Bytes,
}

impl FileSource {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            content: content.into(),
        }
    }

    pub fn size_bytes(&self) -> u64 {
        self.content.len() as u64
    }
}

/// File metadata sent to the backend at presign time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub original_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    /// Lowercase hex SHA-256 of the content, when digesting is enabled.
    pub content_digest: Option<String>,
}

/// Where an upload belongs on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Destination {
    /// Target directory / category, e.g. `activities`.
    pub directory: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<i64>,
}

/// Everything the presign endpoint needs for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignRequest {
    pub file: FileDescriptor,
    pub destination: Destination,
    /// Requested ticket lifetime in seconds.
    pub expires_in: Option<u64>,
}

/// Single-use authorization to write one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTicket {
    /// Absent only when the backend already holds identical content.
    pub destination_url: Option<String>,
    pub http_method: String,
    pub required_headers: BTreeMap<String, String>,
    pub object_key: String,
    pub is_duplicate: bool,
    pub confirmation_required: bool,
    pub public_url: String,
}

/// A fully resolved direct transfer to object storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub url: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

/// Post-transfer registration of an object with the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmRequest {
    pub object_key: String,
    pub original_name: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<i64>,
    pub content_digest: Option<String>,
}

/// Time-limited read URL for a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemporaryUrl {
    pub url: String,
    pub expires_in: Duration,
}

/// How the confirmation step of a file ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum ConfirmOutcome {
    Confirmed,
    /// The ticket did not require confirmation.
    Skipped,
    /// Confirmation was required but failed; the object is stored anyway.
    FailedSoft(String),
}

/// Outcome of one file's pipeline, handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResult {
    pub url: String,
    pub object_key: String,
    pub original_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub is_duplicate: bool,
    pub confirmation: ConfirmOutcome,
}

/// Batch progress. `completed_count` only ever increases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressState {
    pub completed_count: usize,
    pub total_count: usize,
}

/// Transport for the upload protocol.
///
/// Each method issues exactly one request and never retries.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait FileApi: Send + Sync {
    /// Request an upload ticket for a file.
    async fn presign(&self, req: &PresignRequest) -> Result<UploadTicket, ApiError>;

    /// Send file bytes directly to storage. Non-2xx responses are errors.
    async fn transfer(&self, req: &TransferRequest) -> Result<(), ApiError>;

    /// Tell the backend a transfer (or duplicate reference) is complete.
    /// Returns whatever metadata the backend recorded.
    async fn confirm(&self, req: &ConfirmRequest) -> Result<serde_json::Value, ApiError>;

    /// Fetch a temporary read URL for a stored object.
    async fn presigned_url(
        &self,
        object_key: &str,
        expires_in: u64,
    ) -> Result<TemporaryUrl, ApiError>;
}
