//! Auto-reconnecting push notification channel.
//!
//! [`NotificationChannel::open`] spawns one long-lived task per session
//! that ensures the session identity, opens the WebSocket with the
//! identity cookie, processes messages, and reconnects on drop within a
//! bounded budget. State moves
//! `Disconnected -> Connecting -> Connected -> (Connecting | Disconnected)`
//! and is observable through [`ChannelHandle::watch_state`]. `Connecting`
//! is entered only once the identity exists, right before the handshake.

use std::sync::Arc;

use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::COOKIE;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use fileconv_core::job_events::JobEvent;
use fileconv_core::types::ClientIdentity;
use fileconv_events::EventBus;

use crate::identity::IdentityBootstrapper;
use crate::processor::{process_messages, SessionEnd};
use crate::reconnect::{wait_before_retry, ReconnectBudget, ReconnectConfig};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection state of the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
}

/// Where and how to connect.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// WebSocket endpoint, e.g. `ws://host:4000/ws`.
    pub ws_url: String,
    pub reconnect: ReconnectConfig,
}

impl ChannelConfig {
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Errors from a single connection attempt.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The session identity could not be established.
    #[error("Session not established: {0}")]
    Session(String),

    /// The WebSocket handshake failed.
    #[error("Connection error: {0}")]
    Connection(String),
}

/// Entry point for opening the push channel.
pub struct NotificationChannel;

impl NotificationChannel {
    /// Spawn the channel task.
    ///
    /// Events are published on `events`; subscribe before calling this to
    /// see the first `Connected` event. Must be called inside a tokio
    /// runtime.
    pub fn open(
        config: ChannelConfig,
        identity: Arc<IdentityBootstrapper>,
        events: Arc<EventBus<JobEvent>>,
    ) -> ChannelHandle {
        let (state_tx, state_rx) = watch::channel(ChannelState::Disconnected);
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();

        let task = tokio::spawn(async move {
            tracing::info!(url = %config.ws_url, "Starting notification channel");
            run_channel(&config, &identity, &events, &state_tx, &task_cancel).await;
            state_tx.send_replace(ChannelState::Disconnected);
            tracing::info!("Notification channel task exited");
        });

        ChannelHandle {
            state_rx,
            cancel,
            task: Some(task),
        }
    }
}

/// Owner of a running channel.
///
/// Dropping the handle cancels the channel; [`close`](Self::close) also
/// waits for the task to finish, after which no further event is
/// published.
pub struct ChannelHandle {
    state_rx: watch::Receiver<ChannelState>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ChannelHandle {
    pub fn state(&self) -> ChannelState {
        *self.state_rx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.state_rx.clone()
    }

    /// Whether the channel task has stopped on its own (retry budget
    /// exhausted or session rejected) or after teardown.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Tear the channel down and wait for its task to exit.
    pub async fn close(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Notification channel task panicked");
            }
        }
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Core loop: connect -> process messages -> reconnect within budget.
async fn run_channel(
    config: &ChannelConfig,
    identity: &IdentityBootstrapper,
    events: &EventBus<JobEvent>,
    state_tx: &watch::Sender<ChannelState>,
    cancel: &CancellationToken,
) {
    let mut budget = ReconnectBudget::new(&config.reconnect);
    let mut first_attempt = true;

    loop {
        if !first_attempt {
            let Some(attempt) = budget.next_attempt() else {
                tracing::error!(
                    max_attempts = config.reconnect.max_attempts,
                    "Reconnect attempts exhausted, notification channel stays disconnected",
                );
                publish_unless_cancelled(
                    events,
                    cancel,
                    JobEvent::ConnectionError {
                        message: "Reconnect attempts exhausted".into(),
                    },
                );
                return;
            };
            tracing::info!(
                attempt,
                delay_ms = config.reconnect.delay.as_millis() as u64,
                "Reconnecting notification channel",
            );
            if !wait_before_retry(config.reconnect.delay, cancel).await {
                return;
            }
        }
        first_attempt = false;

        // The handshake is deferred until the session identity exists.
        let client_identity = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Notification channel closed while establishing identity");
                return;
            }
            result = identity.ensure() => result,
        };
        let client_identity = match client_identity {
            Ok(client_identity) => client_identity,
            Err(e) => {
                report_failure(&ChannelError::Session(e.to_string()), events, state_tx, cancel);
                continue;
            }
        };

        state_tx.send_replace(ChannelState::Connecting);
        let connected = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Notification channel closed during handshake");
                return;
            }
            result = connect(&config.ws_url, &client_identity) => result,
        };

        let mut ws_stream = match connected {
            Ok(ws_stream) => ws_stream,
            Err(e) => {
                report_failure(&e, events, state_tx, cancel);
                continue;
            }
        };

        budget.reset();
        state_tx.send_replace(ChannelState::Connected);

        let end = process_messages(&mut ws_stream, events, cancel).await;
        state_tx.send_replace(ChannelState::Disconnected);

        match end {
            SessionEnd::Cancelled | SessionEnd::AuthRejected => return,
            SessionEnd::Dropped if cancel.is_cancelled() => return,
            SessionEnd::Dropped => {
                tracing::info!("Notification channel lost, entering reconnect loop");
            }
        }
    }
}

async fn connect(ws_url: &str, identity: &ClientIdentity) -> Result<WsStream, ChannelError> {
    let mut request = ws_url
        .into_client_request()
        .map_err(|e| ChannelError::Connection(format!("Invalid channel URL {ws_url}: {e}")))?;
    let cookie = HeaderValue::from_str(&identity.cookie_header())
        .map_err(|e| ChannelError::Connection(format!("Invalid identity cookie: {e}")))?;
    request.headers_mut().insert(COOKIE, cookie);

    let (ws_stream, _response) = connect_async(request).await.map_err(|e| {
        ChannelError::Connection(format!("Failed to connect to {ws_url}: {e}"))
    })?;

    tracing::info!(url = %ws_url, "Notification channel connected");
    Ok(ws_stream)
}

/// A failed attempt: back to `Disconnected` and tell subscribers.
fn report_failure(
    error: &ChannelError,
    events: &EventBus<JobEvent>,
    state_tx: &watch::Sender<ChannelState>,
    cancel: &CancellationToken,
) {
    tracing::warn!(error = %error, "Notification channel connection failed");
    state_tx.send_replace(ChannelState::Disconnected);
    publish_unless_cancelled(
        events,
        cancel,
        JobEvent::ConnectionError {
            message: error.to_string(),
        },
    );
}

fn publish_unless_cancelled(
    events: &EventBus<JobEvent>,
    cancel: &CancellationToken,
    event: JobEvent,
) {
    if !cancel.is_cancelled() {
        events.publish(event);
    }
}
