//! REST API client for the conversion service HTTP endpoints.
//!
//! Wraps identity creation, document upload and the processed-file
//! listing using [`reqwest`]. Every call after identity creation carries
//! the session cookie.

use std::time::Duration;

use reqwest::header::COOKIE;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use fileconv_core::files::ConversionRequest;
use fileconv_core::types::ClientIdentity;

/// HTTP client for the conversion service.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    api_url: String,
}

/// Response of `POST /auth/client-id`.
#[derive(Debug, Deserialize)]
pub struct ClientIdResponse {
    pub client_id: String,
    /// Whether the id was freshly generated or already existed.
    #[serde(default)]
    pub status: Option<String>,
}

/// Body of an upload acknowledgement.
///
/// Fields default to empty so a partial body still decodes and the
/// caller can decide whether it is acceptable.
#[derive(Debug, Default, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub job_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
}

/// A 2xx answer to an upload.
#[derive(Debug)]
pub struct UploadReply {
    /// HTTP status code (202 when the job was queued).
    pub status: u16,
    /// Decoded body, `None` when it was not the expected JSON shape.
    pub body: Option<UploadResponse>,
}

/// Errors from the REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed and no response arrived (network,
    /// DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("API error ({status}): {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// A response arrived but its body could not be read or decoded.
    #[error("Malformed response body: {0}")]
    Decode(String),
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// * `api_url` - Base URL all endpoints are relative to, e.g.
    ///   `http://host:4000`.
    /// * `timeout` - Per-request timeout.
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, api_url))
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self { client, api_url }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Obtain a session identity.
    ///
    /// Sends `POST /auth/client-id`.
    pub async fn create_client_id(&self) -> Result<ClientIdResponse, ApiError> {
        let response = self
            .client
            .post(format!("{}/auth/client-id", self.api_url))
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Upload a file for conversion.
    ///
    /// Sends a multipart `POST /documents/upload` with the `file` and
    /// `conversion_type` fields.
    pub async fn upload(
        &self,
        identity: &ClientIdentity,
        request: ConversionRequest<'_>,
    ) -> Result<UploadReply, ApiError> {
        let file = request.file();
        let form = Form::new()
            .part(
                "file",
                Part::bytes(file.bytes().to_vec()).file_name(file.name().to_string()),
            )
            .text("conversion_type", request.conversion_type().as_str());

        let response = self
            .client
            .post(format!("{}/documents/upload", self.api_url))
            .header(COOKIE, identity.cookie_header())
            .multipart(form)
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;

        Ok(UploadReply {
            status,
            body: serde_json::from_slice(&bytes).ok(),
        })
    }

    /// Fetch the raw processed-file listing.
    ///
    /// Sends `GET /documents/files`. The shape is interpreted by the
    /// caller so that unexpected shapes can be tolerated.
    pub async fn list_files(
        &self,
        identity: &ClientIdentity,
    ) -> Result<serde_json::Value, ApiError> {
        let response = self
            .client
            .get(format!("{}/documents/files", self.api_url))
            .header(COOKIE, identity.cookie_header())
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }

    // ---- private helpers ----

    /// Return the response unchanged on a success status, or an
    /// [`ApiError::Status`] carrying the status and body text.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

/// Extract a human-readable message from an error body.
///
/// Looks at `error`, then `message`, then the string values of an
/// `errors` object (joined with `; `).
pub fn server_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;

    for key in ["error", "message"] {
        if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
            if !text.trim().is_empty() {
                return Some(text.to_string());
            }
        }
    }

    let joined = value
        .get("errors")?
        .as_object()?
        .values()
        .filter_map(|v| v.as_str())
        .collect::<Vec<_>>()
        .join("; ");
    (!joined.is_empty()).then_some(joined)
}
