#![doc = "HTTP implementation of the upload transport: bridges the core `FileApi` trait to the platform's REST backend and to object storage."]
//
//! # HTTP client (CLI <-> Core)
//!
//! [`HttpFileApi`] implements [`carbon_upload_core::contract::FileApi`] with
//! `reqwest`. Backend calls go to `{base_url}/files/...` and carry the
//! optional bearer token; direct transfers go to the presigned URL with only
//! the headers from the ticket.
//!
//! Response bodies are handed to [`carbon_upload_core::wire`] for decoding,
//! so field-name fallbacks and error envelopes are handled in one place.

use std::time::Duration;

use async_trait::async_trait;
use carbon_upload_core::contract::{
    ConfirmRequest, FileApi, PresignRequest, TemporaryUrl, TransferRequest, UploadTicket,
};
use carbon_upload_core::error::ApiError;
use carbon_upload_core::wire::{
    self, ConfirmBody, PresignBody, PresignData, RawResponse, TemporaryUrlData,
};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::load_config::ApiSection;

pub struct HttpFileApi {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpFileApi {
    pub fn new(api: &ApiSection) -> Result<Self, ApiError> {
        let mut builder = Client::builder();
        if let Some(secs) = api.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().map_err(|e| {
            tracing::error!(error = ?e, "Failed to build HTTP client");
            ApiError::Transport(e.to_string())
        })?;

        tracing::info!(
            base_url = %api.base_url,
            api_token_set = api.api_token.is_some(),
            "Initialized HttpFileApi"
        );
        Ok(HttpFileApi {
            client,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            api_token: api.api_token.clone(),
        })
    }

    fn backend(&self, method: Method, path: &str) -> RequestBuilder {
        let request = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send_decoded<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await.map_err(transport_error)?;
        decode_response(response).await
    }
}

fn transport_error(e: reqwest::Error) -> ApiError {
    tracing::error!(error = ?e, "HTTP request failed");
    ApiError::Transport(e.to_string())
}

async fn decode_response<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    let request_id = response
        .headers()
        .get(wire::REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response.text().await.map_err(transport_error)?;

    let decoded = wire::decode_envelope(RawResponse {
        status: status.as_u16(),
        reason: status.canonical_reason(),
        request_id: request_id.as_deref(),
        body: &body,
    });
    if let Err(e) = &decoded {
        tracing::error!(
            status = status.as_u16(),
            error = %e,
            request_id = e.request_id().unwrap_or("-"),
            "Backend returned an error"
        );
    }
    decoded
}

#[async_trait]
impl FileApi for HttpFileApi {
    async fn presign(&self, req: &PresignRequest) -> Result<UploadTicket, ApiError> {
        tracing::info!(
            file = %req.file.original_name,
            size = req.file.size_bytes,
            directory = %req.destination.directory,
            "Requesting upload ticket"
        );
        let request = self
            .backend(Method::POST, wire::PRESIGN_PATH)
            .json(&PresignBody::from(req));
        let data: PresignData = self.send_decoded(request).await?;
        data.into_ticket()
    }

    async fn transfer(&self, req: &TransferRequest) -> Result<(), ApiError> {
        let method = Method::from_bytes(req.method.as_bytes())
            .map_err(|e| ApiError::Decode(format!("invalid transfer method {}: {e}", req.method)))?;

        let mut request = self.client.request(method, &req.url).body(req.body.clone());
        for (name, value) in &req.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            tracing::info!(status = status.as_u16(), "Direct transfer accepted");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        tracing::error!(status = status.as_u16(), body = %body, "Direct transfer rejected");
        Err(ApiError::Server {
            status: Some(status.as_u16()),
            message: status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| format!("transfer failed with HTTP {}", status.as_u16())),
            request_id: None,
        })
    }

    async fn confirm(&self, req: &ConfirmRequest) -> Result<serde_json::Value, ApiError> {
        tracing::info!(object_key = %req.object_key, "Confirming upload");
        let request = self
            .backend(Method::POST, wire::CONFIRM_PATH)
            .json(&ConfirmBody::from(req));
        self.send_decoded(request).await
    }

    async fn presigned_url(
        &self,
        object_key: &str,
        expires_in: u64,
    ) -> Result<TemporaryUrl, ApiError> {
        tracing::info!(object_key, expires_in, "Requesting temporary read URL");
        let request = self.backend(Method::GET, &wire::presigned_url_path(object_key, expires_in));
        let data: TemporaryUrlData = self.send_decoded(request).await?;
        data.into_temporary_url(expires_in)
    }
}
