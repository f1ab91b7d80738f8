//! Push-channel event names and the typed job lifecycle events derived
//! from them.

use serde::Serialize;

use crate::types::JobId;

/// Handshake acknowledged by the server.
pub const MSG_TYPE_CONNECTED: &str = "connected";

/// Progress update during job execution.
pub const MSG_TYPE_JOB_PROGRESS: &str = "job_progress";

/// Job completed successfully.
pub const MSG_TYPE_JOB_COMPLETED: &str = "job_completed";

/// Job failed with an error.
pub const MSG_TYPE_JOB_FAILED: &str = "job_failed";

/// The server rejected the session identity.
pub const MSG_TYPE_AUTH_ERROR: &str = "auth_error";

/// A lifecycle event delivered by the notification channel.
///
/// Delivery is at-least-once and unordered relative to listing polls;
/// consumers must be idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum JobEvent {
    /// The server accepted the channel handshake.
    Connected { message: String },

    /// A job finished and its output is (or will shortly be) listed.
    JobCompleted {
        job_id: JobId,
        filename: Option<String>,
    },

    /// A job failed server-side.
    JobFailed { job_id: JobId, error: String },

    /// The server no longer trusts the session; the channel closes.
    AuthError { message: String },

    /// A connection attempt failed or the retry budget ran out.
    ConnectionError { message: String },
}

impl JobEvent {
    /// Whether the event means the processed-file listing may have changed.
    pub fn signals_completion(&self) -> bool {
        matches!(self, Self::JobCompleted { .. } | Self::JobFailed { .. })
    }
}
