//! Error types for the upload pipeline.
//!
//! Failures are layered: [`ApiError`] is what a [`crate::contract::FileApi`]
//! call returns, [`UploadError`] is a fatal failure of one file's pipeline,
//! and [`BatchError`] wraps the first fatal failure of a batch together with
//! the results that completed before it.

use thiserror::Error;

use crate::contract::UploadResult;

/// Local validation failure. Raised before any network call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{file} is {size} bytes, which exceeds the {limit} byte limit")]
    TooLarge { file: String, size: u64, limit: u64 },

    #[error("{file} has type {mime_type}, which is not allowed")]
    DisallowedType { file: String, mime_type: String },

    #[error("{file} has a disallowed extension")]
    DisallowedExtension { file: String },
}

/// Failure reported by the backend or the transport underneath it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The server answered with an HTTP error or `success: false`.
    #[error("{message}")]
    Server {
        status: Option<u16>,
        message: String,
        request_id: Option<String>,
    },

    /// No usable response was received.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body could not be decoded into the expected schema.
    #[error("malformed response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Support reference the backend attached to the failure, if any.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            ApiError::Server { request_id, .. } => request_id.as_deref(),
            _ => None,
        }
    }
}

/// Fatal failure of a single file's pipeline.
///
/// Confirmation failures never appear here; they are soft and recorded on
/// the [`UploadResult`] instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("presign failed for {file}: {source}")]
    Presign {
        file: String,
        #[source]
        source: ApiError,
    },

    #[error("presign ticket for {file} has no upload destination")]
    MissingDestination { file: String },

    #[error("transfer failed for {file}: {source}")]
    Transfer {
        file: String,
        #[source]
        source: ApiError,
    },
}

impl UploadError {
    /// Support reference from the underlying API failure, if any.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            UploadError::Presign { source, .. } | UploadError::Transfer { source, .. } => {
                source.request_id()
            }
            _ => None,
        }
    }
}

/// A batch aborted at file `index` (zero-based).
///
/// `completed` holds the results of files `0..index`, which stay uploaded.
#[derive(Debug, Error)]
#[error("upload of file {} of {total} failed: {source}", .index + 1)]
pub struct BatchError {
    pub index: usize,
    pub total: usize,
    pub completed: Vec<UploadResult>,
    #[source]
    pub source: UploadError,
}
