//! Push-channel message types and parser.
//!
//! The service sends JSON text frames shaped
//! `{"type": "<kind>", "data": {...}}`. This module deserializes them
//! into a strongly-typed [`ServerMessage`] enum.

use serde::Deserialize;

use fileconv_core::job_events::JobEvent;
use fileconv_core::types::JobId;

/// All known inbound push-channel messages.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    /// The handshake was accepted.
    #[serde(rename = "connected")]
    Connected(ConnectedData),

    /// Intermediate progress of a running job.
    #[serde(rename = "job_progress")]
    JobProgress(JobProgressData),

    #[serde(rename = "job_completed")]
    JobCompleted(JobCompletedData),

    #[serde(rename = "job_failed")]
    JobFailed(JobFailedData),

    /// The session identity was rejected.
    #[serde(rename = "auth_error")]
    AuthError(AuthErrorData),
}

/// Payload for `connected` messages.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectedData {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub client_id: Option<String>,
}

/// Payload for `job_progress` messages. The progress shape is not fixed.
#[derive(Debug, Clone, Deserialize)]
pub struct JobProgressData {
    pub job_id: JobId,
    #[serde(default)]
    pub progress: Option<serde_json::Value>,
}

/// Payload for `job_completed` messages.
#[derive(Debug, Clone, Deserialize)]
pub struct JobCompletedData {
    pub job_id: JobId,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
}

/// Payload for `job_failed` messages.
#[derive(Debug, Clone, Deserialize)]
pub struct JobFailedData {
    pub job_id: JobId,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: String,
}

/// Payload for `auth_error` messages.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthErrorData {
    #[serde(default)]
    pub message: String,
}

impl ServerMessage {
    /// Convert into the event delivered to subscribers.
    ///
    /// Progress messages have no subscriber-facing event.
    pub fn into_job_event(self) -> Option<JobEvent> {
        match self {
            Self::Connected(data) => Some(JobEvent::Connected {
                message: data.message,
            }),
            Self::JobProgress(_) => None,
            Self::JobCompleted(data) => Some(JobEvent::JobCompleted {
                job_id: data.job_id,
                filename: data.filename,
            }),
            Self::JobFailed(data) => Some(JobEvent::JobFailed {
                job_id: data.job_id,
                error: data.error,
            }),
            Self::AuthError(data) => Some(JobEvent::AuthError {
                message: data.message,
            }),
        }
    }
}

/// Parse a push-channel text frame into a typed message.
///
/// Returns `Err` for malformed JSON or unknown `type` values. Callers
/// should log and continue.
pub fn parse_message(text: &str) -> Result<ServerMessage, serde_json::Error> {
    serde_json::from_str(text)
}

#[cfg(test)]
mod tests {
    use fileconv_core::job_events::{
        MSG_TYPE_AUTH_ERROR, MSG_TYPE_CONNECTED, MSG_TYPE_JOB_COMPLETED, MSG_TYPE_JOB_FAILED,
        MSG_TYPE_JOB_PROGRESS,
    };

    use super::*;

    #[test]
    fn parse_connected_message() {
        let json = r#"{"type":"connected","data":{"message":"Connected","client_id":"c1"}}"#;
        match parse_message(json).unwrap() {
            ServerMessage::Connected(data) => {
                assert_eq!(data.message, "Connected");
                assert_eq!(data.client_id.as_deref(), Some("c1"));
            }
            other => panic!("Expected Connected, got {other:?}"),
        }
    }

    #[test]
    fn parse_job_completed_with_filename() {
        let json = r#"{"type":"job_completed","data":{"job_id":"abc","status":"completed","filename":"report.csv","download_url":"/documents/download/abc","client_id":"c1"}}"#;
        let event = parse_message(json).unwrap().into_job_event();
        assert_eq!(
            event,
            Some(JobEvent::JobCompleted {
                job_id: "abc".into(),
                filename: Some("report.csv".into()),
            })
        );
    }

    #[test]
    fn parse_job_completed_without_filename() {
        let json = r#"{"type":"job_completed","data":{"job_id":"abc"}}"#;
        let event = parse_message(json).unwrap().into_job_event();
        assert_eq!(
            event,
            Some(JobEvent::JobCompleted {
                job_id: "abc".into(),
                filename: None,
            })
        );
    }

    #[test]
    fn parse_job_failed() {
        let json = r#"{"type":"job_failed","data":{"job_id":"x","status":"failed","error":"bad format"}}"#;
        let event = parse_message(json).unwrap().into_job_event();
        assert_eq!(
            event,
            Some(JobEvent::JobFailed {
                job_id: "x".into(),
                error: "bad format".into(),
            })
        );
    }

    #[test]
    fn parse_auth_error() {
        let json = r#"{"type":"auth_error","data":{"message":"client_id required"}}"#;
        let event = parse_message(json).unwrap().into_job_event();
        assert_eq!(
            event,
            Some(JobEvent::AuthError {
                message: "client_id required".into(),
            })
        );
    }

    #[test]
    fn progress_has_no_job_event() {
        let json = r#"{"type":"job_progress","data":{"job_id":"abc","progress":40}}"#;
        let msg = parse_message(json).unwrap();
        assert!(msg.into_job_event().is_none());
    }

    #[test]
    fn wire_names_match_constants() {
        for (kind, data) in [
            (MSG_TYPE_CONNECTED, r#"{}"#),
            (MSG_TYPE_JOB_PROGRESS, r#"{"job_id":"a"}"#),
            (MSG_TYPE_JOB_COMPLETED, r#"{"job_id":"a"}"#),
            (MSG_TYPE_JOB_FAILED, r#"{"job_id":"a"}"#),
            (MSG_TYPE_AUTH_ERROR, r#"{}"#),
        ] {
            let json = format!(r#"{{"type":"{kind}","data":{data}}}"#);
            assert!(parse_message(&json).is_ok(), "{kind} did not parse");
        }
    }

    #[test]
    fn parse_unknown_type_returns_error() {
        let json = r#"{"type":"unknown_thing","data":{}}"#;
        assert!(parse_message(json).is_err());
    }

    #[test]
    fn parse_invalid_json_returns_error() {
        assert!(parse_message("not json at all").is_err());
    }
}
