//! WebSocket message processing loop.
//!
//! Reads frames from an established push-channel connection, parses them
//! into typed [`ServerMessage`]s and publishes the resulting
//! [`JobEvent`]s until the connection ends, the server rejects the
//! session, or the channel is torn down.

use std::time::Duration;

use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_util::sync::CancellationToken;

use fileconv_core::job_events::JobEvent;
use fileconv_events::EventBus;

use crate::messages::{parse_message, ServerMessage};

/// Upper bound on sending our close frame before giving up on the peer.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Why a connection stopped being processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The channel was torn down locally.
    Cancelled,
    /// The connection closed or failed; a reconnect may follow.
    Dropped,
    /// The server sent `auth_error`; the channel must stay closed.
    AuthRejected,
}

/// Process push-channel frames until the session ends.
///
/// Binary frames are ignored. Malformed or unknown text frames are
/// logged and skipped. No event is published once `cancel` fires.
pub async fn process_messages<S>(
    ws_stream: &mut S,
    events: &EventBus<JobEvent>,
    cancel: &CancellationToken,
) -> SessionEnd
where
    S: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Unpin,
{
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                close_quietly(ws_stream).await;
                return SessionEnd::Cancelled;
            }
            next = ws_stream.next() => next,
        };

        match next {
            Some(Ok(Message::Text(text))) => {
                if cancel.is_cancelled() {
                    return SessionEnd::Cancelled;
                }
                if handle_text_message(&text, events) == Flow::AuthRejected {
                    close_quietly(ws_stream).await;
                    return SessionEnd::AuthRejected;
                }
            }
            Some(Ok(Message::Binary(_))) => {
                tracing::trace!("Ignoring binary push frame");
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                // Handled automatically by tungstenite.
            }
            Some(Ok(Message::Close(frame))) => {
                tracing::info!(?frame, "Notification channel closed by server");
                return SessionEnd::Dropped;
            }
            Some(Ok(Message::Frame(_))) => {}
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Notification channel receive error");
                return SessionEnd::Dropped;
            }
            None => {
                tracing::info!("Notification channel stream exhausted");
                return SessionEnd::Dropped;
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    AuthRejected,
}

/// Dispatch a single text frame.
fn handle_text_message(text: &str, events: &EventBus<JobEvent>) -> Flow {
    let message = match parse_message(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(
                error = %e,
                raw_message = %text,
                "Failed to parse push message",
            );
            return Flow::Continue;
        }
    };

    if let ServerMessage::JobProgress(data) = &message {
        tracing::debug!(job_id = %data.job_id, progress = ?data.progress, "Job progress");
        return Flow::Continue;
    }

    let Some(event) = message.into_job_event() else {
        return Flow::Continue;
    };

    let flow = match &event {
        JobEvent::AuthError { message } => {
            tracing::error!(message = %message, "Session rejected by notification server");
            Flow::AuthRejected
        }
        JobEvent::JobCompleted { job_id, .. } => {
            tracing::info!(job_id = %job_id, "Job completed");
            Flow::Continue
        }
        JobEvent::JobFailed { job_id, error } => {
            tracing::warn!(job_id = %job_id, error = %error, "Job failed");
            Flow::Continue
        }
        _ => Flow::Continue,
    };

    events.publish(event);
    flow
}

async fn close_quietly<S>(ws_stream: &mut S)
where
    S: Sink<Message, Error = WsError> + Unpin,
{
    if let Ok(Err(e)) = tokio::time::timeout(CLOSE_TIMEOUT, ws_stream.close()).await {
        tracing::debug!(error = %e, "Error while closing notification channel");
    }
}
