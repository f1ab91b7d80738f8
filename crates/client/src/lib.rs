//! Client side of the conversion service.
//!
//! Provides the HTTP API wrapper, the single-flight session identity,
//! job submission with error classification, the auto-reconnecting push
//! notification channel, and the processed-file history reconciler.

pub mod api;
pub mod channel;
pub mod history;
pub mod identity;
pub mod messages;
pub mod processor;
pub mod reconnect;
pub mod submit;

pub use api::{ApiClient, ApiError};
pub use channel::{ChannelConfig, ChannelHandle, ChannelState, NotificationChannel};
pub use history::{HistoryReconciler, HistorySnapshot};
pub use identity::{IdentityBootstrapper, IdentityError};
pub use submit::{JobSubmitter, SubmitOutcome};
