//! Transient user-facing notices.
//!
//! Components publish a [`Notice`] instead of rendering anything; the
//! boundary decides how (and whether) to show it.

use std::time::Duration;

use serde::Serialize;

use crate::job_events::JobEvent;

/// How long a notice stays visible unless overridden.
pub const DEFAULT_NOTICE_DURATION: Duration = Duration::from_secs(4);

/// Duration for job lifecycle notices.
pub const JOB_NOTICE_DURATION: Duration = Duration::from_secs(10);

/// Duration for connection and auth failure notices.
pub const CONNECTION_NOTICE_DURATION: Duration = Duration::from_secs(8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub description: Option<String>,
    pub duration: Duration,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            description: None,
            duration: DEFAULT_NOTICE_DURATION,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, message)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// The notice shown for a push-channel event.
    pub fn for_job_event(event: &JobEvent) -> Self {
        match event {
            JobEvent::Connected { message } => {
                Self::success(message.clone()).with_duration(JOB_NOTICE_DURATION)
            }
            JobEvent::JobCompleted { job_id, filename } => {
                let notice = Self::success(format!("Conversion finished! Job {job_id}"))
                    .with_duration(JOB_NOTICE_DURATION);
                match filename {
                    Some(name) => notice.with_description(format!("File: {name}")),
                    None => notice,
                }
            }
            JobEvent::JobFailed { job_id, error } => {
                Self::error(format!("Processing failed for job {job_id}"))
                    .with_description(error.clone())
                    .with_duration(JOB_NOTICE_DURATION)
            }
            JobEvent::AuthError { message } => {
                Self::error(message.clone()).with_duration(CONNECTION_NOTICE_DURATION)
            }
            JobEvent::ConnectionError { .. } => {
                Self::error("Could not connect to the notification server")
                    .with_duration(CONNECTION_NOTICE_DURATION)
            }
        }
    }
}
