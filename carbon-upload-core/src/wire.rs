//! JSON schema of the backend file endpoints.
//!
//! Request bodies are serialized from the pipeline's types; responses are
//! decoded here exactly once, with every field-name fallback resolved, so the
//! rest of the crate only ever sees [`UploadTicket`] and [`TemporaryUrl`].

use std::collections::BTreeMap;
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::contract::{ConfirmRequest, PresignRequest, TemporaryUrl, UploadTicket};
use crate::error::ApiError;

pub const PRESIGN_PATH: &str = "/files/presign";
pub const CONFIRM_PATH: &str = "/files/confirm";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const DEFAULT_TRANSFER_METHOD: &str = "PUT";

/// Characters left alone by JavaScript's `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Path of the temporary read URL endpoint for `object_key`.
pub fn presigned_url_path(object_key: &str, expires_in: u64) -> String {
    format!(
        "/files/{}/presigned-url?expires_in={}",
        utf8_percent_encode(object_key, URI_COMPONENT),
        expires_in
    )
}

#[derive(Debug, Serialize)]
pub struct PresignBody<'a> {
    pub original_name: &'a str,
    pub directory: &'a str,
    pub mime_type: &'a str,
    pub file_size: u64,
    pub entity_type: Option<&'a str>,
    pub entity_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

impl<'a> From<&'a PresignRequest> for PresignBody<'a> {
    fn from(req: &'a PresignRequest) -> Self {
        Self {
            original_name: &req.file.original_name,
            directory: &req.destination.directory,
            mime_type: &req.file.mime_type,
            file_size: req.file.size_bytes,
            entity_type: req.destination.entity_type.as_deref(),
            entity_id: req.destination.entity_id,
            sha256: req.file.content_digest.as_deref(),
            expires_in: req.expires_in,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConfirmBody<'a> {
    pub file_path: &'a str,
    pub original_name: &'a str,
    pub entity_type: Option<&'a str>,
    pub entity_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<&'a str>,
}

impl<'a> From<&'a ConfirmRequest> for ConfirmBody<'a> {
    fn from(req: &'a ConfirmRequest) -> Self {
        Self {
            file_path: &req.object_key,
            original_name: &req.original_name,
            entity_type: req.entity_type.as_deref(),
            entity_id: req.entity_id,
            sha256: req.content_digest.as_deref(),
        }
    }
}

/// `{success, data, message, request_id}` wrapper around every response.
#[derive(Debug, Deserialize)]
struct Envelope {
    success: Option<bool>,
    data: Option<serde_json::Value>,
    message: Option<String>,
    error: Option<String>,
    request_id: Option<String>,
}

/// A response as received by the transport, before decoding.
#[derive(Debug, Clone, Copy)]
pub struct RawResponse<'a> {
    pub status: u16,
    /// HTTP reason phrase, used when the body carries no message.
    pub reason: Option<&'a str>,
    /// Value of the `x-request-id` header.
    pub request_id: Option<&'a str>,
    pub body: &'a str,
}

/// Decode the `data` member of an envelope, or turn the response into an
/// [`ApiError::Server`] when the status or `success` flag says it failed.
pub fn decode_envelope<T: DeserializeOwned>(raw: RawResponse<'_>) -> Result<T, ApiError> {
    let status_ok = (200..300).contains(&raw.status);
    let envelope = serde_json::from_str::<Envelope>(raw.body);

    let envelope = match envelope {
        Ok(envelope) => envelope,
        Err(e) if status_ok => {
            return Err(ApiError::Decode(format!("response is not an envelope: {e}")));
        }
        Err(_) => {
            return Err(ApiError::Server {
                status: Some(raw.status),
                message: fallback_message(&raw),
                request_id: raw.request_id.map(str::to_string),
            });
        }
    };

    if !status_ok || envelope.success == Some(false) {
        return Err(ApiError::Server {
            status: Some(raw.status),
            message: envelope
                .message
                .or(envelope.error)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| fallback_message(&raw)),
            request_id: envelope
                .request_id
                .or_else(|| raw.request_id.map(str::to_string)),
        });
    }

    let data = envelope.data.unwrap_or(serde_json::Value::Null);
    serde_json::from_value(data).map_err(|e| ApiError::Decode(e.to_string()))
}

fn fallback_message(raw: &RawResponse<'_>) -> String {
    match raw.reason {
        Some(reason) if !reason.is_empty() => reason.to_string(),
        _ => format!("request failed with HTTP {}", raw.status),
    }
}

/// `data` of a presign response. Field names vary between backend versions.
#[derive(Debug, Deserialize)]
pub struct PresignData {
    url: Option<String>,
    upload_url: Option<String>,
    method: Option<String>,
    headers: Option<BTreeMap<String, String>>,
    file_path: Option<String>,
    key: Option<String>,
    public_url: Option<String>,
    file_url: Option<String>,
    duplicate: Option<bool>,
    is_duplicate: Option<bool>,
    confirm_required: Option<bool>,
}

impl PresignData {
    pub fn into_ticket(self) -> Result<UploadTicket, ApiError> {
        let object_key = non_empty(self.file_path)
            .or_else(|| non_empty(self.key))
            .ok_or_else(|| ApiError::Decode("presign response has no file_path".to_string()))?;
        let public_url = non_empty(self.public_url)
            .or_else(|| non_empty(self.file_url))
            .unwrap_or_else(|| object_key.clone());

        Ok(UploadTicket {
            destination_url: non_empty(self.url).or_else(|| non_empty(self.upload_url)),
            http_method: non_empty(self.method)
                .map(|m| m.to_ascii_uppercase())
                .unwrap_or_else(|| DEFAULT_TRANSFER_METHOD.to_string()),
            required_headers: self.headers.unwrap_or_default(),
            object_key,
            is_duplicate: self.duplicate.or(self.is_duplicate).unwrap_or(false),
            confirmation_required: self.confirm_required.unwrap_or(true),
            public_url,
        })
    }
}

/// `data` of a temporary read URL response.
#[derive(Debug, Deserialize)]
pub struct TemporaryUrlData {
    presigned_url: Option<String>,
    url: Option<String>,
    expires_in: Option<u64>,
}

impl TemporaryUrlData {
    /// `requested` is used when the backend does not echo the lifetime.
    pub fn into_temporary_url(self, requested: u64) -> Result<TemporaryUrl, ApiError> {
        let url = non_empty(self.presigned_url)
            .or_else(|| non_empty(self.url))
            .ok_or_else(|| ApiError::Decode("response has no presigned_url".to_string()))?;
        Ok(TemporaryUrl {
            url,
            expires_in: Duration::from_secs(self.expires_in.unwrap_or(requested)),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
