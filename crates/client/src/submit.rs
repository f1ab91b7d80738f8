//! Job submission with client-side validation and error classification.
//!
//! [`JobSubmitter::submit`] validates the file/conversion pairing before
//! touching the network, ensures the session identity, uploads the file
//! and maps every outcome onto [`ConversionError`]. Each outcome is also
//! published as a [`Notice`].

use std::sync::Arc;

use serde::Serialize;

use fileconv_core::conversion::ConversionType;
use fileconv_core::error::ConversionError;
use fileconv_core::files::{ConversionRequest, JobHandle, SourceFile};
use fileconv_core::notice::Notice;
use fileconv_core::types::JobId;
use fileconv_events::EventBus;

use crate::api::{self, ApiClient, ApiError, UploadReply};
use crate::identity::IdentityBootstrapper;

/// The only status that means "job queued".
const STATUS_ACCEPTED: u16 = 202;

const MSG_UPLOAD_ACCEPTED: &str = "Upload received! Processing in progress...";
const MSG_SESSION_NOT_IDENTIFIED: &str = "Session not identified. Try again.";
const MSG_INVALID_REQUEST: &str = "Invalid request";
const MSG_QUOTA_OR_DENIED: &str = "Quota limit reached or access denied";
const MSG_UNEXPECTED_RESPONSE: &str = "Unexpected response from the server";

/// Flattened submission result for the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitOutcome {
    pub success: bool,
    pub job_id: Option<JobId>,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl From<&Result<JobHandle, ConversionError>> for SubmitOutcome {
    fn from(result: &Result<JobHandle, ConversionError>) -> Self {
        match result {
            Ok(handle) => Self {
                success: true,
                job_id: Some(handle.job_id.clone()),
                message: Some(handle.server_message.clone()),
                error: None,
            },
            Err(e) => Self {
                success: false,
                job_id: None,
                message: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Uploads files as asynchronously processed conversion jobs.
pub struct JobSubmitter {
    api: ApiClient,
    identity: Arc<IdentityBootstrapper>,
    notices: Arc<EventBus<Notice>>,
}

impl JobSubmitter {
    pub fn new(
        api: ApiClient,
        identity: Arc<IdentityBootstrapper>,
        notices: Arc<EventBus<Notice>>,
    ) -> Self {
        Self {
            api,
            identity,
            notices,
        }
    }

    /// Submit `file` for `conversion`.
    ///
    /// Illegal pairings fail with [`ConversionError::Validation`] without
    /// any network call. Success requires a 202 carrying a job id.
    pub async fn submit(
        &self,
        file: &SourceFile,
        conversion: ConversionType,
    ) -> Result<JobHandle, ConversionError> {
        let result = self.try_submit(file, conversion).await;

        match &result {
            Ok(handle) => {
                tracing::info!(
                    job_id = %handle.job_id,
                    conversion = %conversion,
                    file = file.name(),
                    "Upload accepted",
                );
                self.notices.publish(Notice::success(MSG_UPLOAD_ACCEPTED));
            }
            Err(e) if e.is_local() => {
                tracing::warn!(
                    conversion = %conversion,
                    file = file.name(),
                    error = %e,
                    "Submission rejected before upload",
                );
                self.notices.publish(Notice::error(e.to_string()));
            }
            Err(e) => {
                tracing::error!(
                    conversion = %conversion,
                    file = file.name(),
                    error = %e,
                    "Submission failed",
                );
                self.notices.publish(Notice::error(e.to_string()));
            }
        }

        result
    }

    async fn try_submit(
        &self,
        file: &SourceFile,
        conversion: ConversionType,
    ) -> Result<JobHandle, ConversionError> {
        let request = ConversionRequest::new(file, conversion)?;

        let identity = self
            .identity
            .ensure()
            .await
            .map_err(|_| ConversionError::Session)?;

        let reply = self
            .api
            .upload(&identity, request)
            .await
            .map_err(classify_api_error)?;

        accept_reply(reply)
    }
}

/// Turn a 2xx upload reply into a job handle, or a protocol error unless
/// it is a 202 with a non-empty job id.
fn accept_reply(reply: UploadReply) -> Result<JobHandle, ConversionError> {
    let body = reply.body.unwrap_or_default();

    if reply.status == STATUS_ACCEPTED && !body.job_id.trim().is_empty() {
        return Ok(JobHandle {
            job_id: body.job_id,
            initial_status: body.status,
            server_message: body.message,
        });
    }

    tracing::warn!(
        status = reply.status,
        has_job_id = !body.job_id.is_empty(),
        "Upload answered with an unexpected success response",
    );
    let message = if body.message.trim().is_empty() {
        MSG_UNEXPECTED_RESPONSE.to_string()
    } else {
        body.message
    };
    Err(ConversionError::Protocol(message))
}

fn classify_api_error(error: ApiError) -> ConversionError {
    match error {
        ApiError::Request(e) if e.is_builder() => ConversionError::Unexpected(e.to_string()),
        ApiError::Request(_) => ConversionError::Transport,
        ApiError::Status { status, body } => classify_status(status, &body),
        ApiError::Decode(_) => ConversionError::Protocol(MSG_UNEXPECTED_RESPONSE.to_string()),
    }
}

/// Map a non-2xx upload answer onto a user-facing server error.
pub fn classify_status(status: u16, body: &str) -> ConversionError {
    let message = match status {
        400 if body.contains("client_id") => MSG_SESSION_NOT_IDENTIFIED.to_string(),
        400 => api::server_message(body).unwrap_or_else(|| MSG_INVALID_REQUEST.to_string()),
        403 => MSG_QUOTA_OR_DENIED.to_string(),
        _ => api::server_message(body).unwrap_or_else(|| format!("Server error {status}")),
    };
    ConversionError::Server { status, message }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::api::UploadResponse;

    fn reply(status: u16, job_id: &str) -> UploadReply {
        UploadReply {
            status,
            body: Some(UploadResponse {
                job_id: job_id.into(),
                status: "pending".into(),
                message: String::new(),
            }),
        }
    }

    #[test]
    fn accepted_with_job_id_is_success() {
        let handle = accept_reply(reply(202, "abc")).unwrap();
        assert_eq!(handle.job_id, "abc");
        assert_eq!(handle.initial_status, "pending");
    }

    #[test]
    fn accepted_without_job_id_is_protocol_error() {
        assert_matches!(accept_reply(reply(202, "")), Err(ConversionError::Protocol(_)));
    }

    #[test]
    fn other_success_status_is_protocol_error() {
        assert_matches!(accept_reply(reply(200, "abc")), Err(ConversionError::Protocol(_)));
        assert_matches!(accept_reply(reply(201, "abc")), Err(ConversionError::Protocol(_)));
    }

    #[test]
    fn undecodable_body_is_protocol_error() {
        let reply = UploadReply {
            status: 202,
            body: None,
        };
        assert_eq!(
            accept_reply(reply),
            Err(ConversionError::Protocol(MSG_UNEXPECTED_RESPONSE.into()))
        );
    }

    #[test]
    fn protocol_error_keeps_server_message() {
        let reply = UploadReply {
            status: 200,
            body: Some(UploadResponse {
                message: "Try later".into(),
                ..Default::default()
            }),
        };
        assert_eq!(
            accept_reply(reply),
            Err(ConversionError::Protocol("Try later".into()))
        );
    }

    #[test]
    fn bad_request_about_client_id_is_session_message() {
        let err = classify_status(400, r#"{"errors":{"cookie":"client_id cookie is required"}}"#);
        assert_eq!(
            err,
            ConversionError::Server {
                status: 400,
                message: MSG_SESSION_NOT_IDENTIFIED.into()
            }
        );
    }

    #[test]
    fn other_bad_request_uses_server_message() {
        let err = classify_status(400, r#"{"message":"Unsupported file format"}"#);
        assert_eq!(err.to_string(), "Unsupported file format");

        let err = classify_status(400, "");
        assert_eq!(err.to_string(), MSG_INVALID_REQUEST);
    }

    #[test]
    fn forbidden_is_quota_message() {
        let err = classify_status(403, r#"{"error":"Storage full"}"#);
        assert_eq!(err.to_string(), MSG_QUOTA_OR_DENIED);
    }

    #[test]
    fn other_status_uses_message_or_status() {
        assert_eq!(
            classify_status(500, r#"{"error":"worker down"}"#).to_string(),
            "worker down"
        );
        assert_eq!(classify_status(502, "gateway").to_string(), "Server error 502");
    }

    #[test]
    fn outcome_flattens_result() {
        let ok: Result<JobHandle, ConversionError> = Ok(JobHandle {
            job_id: "abc".into(),
            initial_status: "processing".into(),
            server_message: "ok".into(),
        });
        let outcome = SubmitOutcome::from(&ok);
        assert!(outcome.success);
        assert_eq!(outcome.job_id.as_deref(), Some("abc"));

        let err: Result<JobHandle, ConversionError> = Err(ConversionError::Transport);
        let outcome = SubmitOutcome::from(&err);
        assert!(!outcome.success);
        assert!(outcome.job_id.is_none());
        assert!(outcome.error.is_some());
    }
}
