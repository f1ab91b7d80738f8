//! Composition root of one conversion session.
//!
//! The [`ConversionCoordinator`] holds the file and conversion-type
//! selection, owns the "submitting" flag and the last submission result,
//! and wires the pieces together once [`activate`](ConversionCoordinator::activate)d:
//!
//! - push-channel job events become notices, and completed or failed jobs
//!   raise the local [`LocalSignal::ConversionCompleted`] signal;
//! - a successful submission raises the same signal;
//! - every signal triggers a history refresh;
//! - a settled, non-empty listing arms the safety-net refresh.
//!
//! [`shutdown`](ConversionCoordinator::shutdown) closes the channel and
//! stops every listener.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use fileconv_client::{
    ApiClient, ApiError, ChannelConfig, ChannelHandle, ChannelState, HistoryReconciler,
    HistorySnapshot, IdentityBootstrapper, JobSubmitter, NotificationChannel,
};
use fileconv_core::conversion::ConversionType;
use fileconv_core::error::{ConversionError, HistoryError};
use fileconv_core::files::{JobHandle, ProcessedFileEntry, SourceFile};
use fileconv_core::job_events::JobEvent;
use fileconv_core::notice::Notice;
use fileconv_events::{EventBus, LocalSignal, Subscription};

use crate::config::AppConfig;
use crate::safety_net::start_safety_net;

const MSG_SELECT_FILE: &str = "Select a file first";
const MSG_NOT_SUPPORTED: &str = "Conversion not supported for this file type";
const MSG_ALREADY_SUBMITTING: &str = "A conversion is already being submitted";

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Read-only view of the coordinator's selection state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    pub file_name: Option<String>,
    /// Lower-cased extension of the selected file.
    pub extension: Option<String>,
    pub legal_conversions: Vec<ConversionType>,
    pub selected_conversion: Option<ConversionType>,
    pub submitting: bool,
    pub last_job: Option<JobHandle>,
    pub last_error: Option<ConversionError>,
}

#[derive(Debug, Default)]
struct Selection {
    file: Option<Arc<SourceFile>>,
    conversion: Option<ConversionType>,
    last_job: Option<JobHandle>,
    last_error: Option<ConversionError>,
}

impl Selection {
    fn legal(&self) -> &'static [ConversionType] {
        match &self.file {
            Some(file) => file.legal_conversions(),
            None => &[],
        }
    }

    /// Replace the file. The chosen conversion survives only if it is
    /// legal for the new file; otherwise the first legal one is chosen.
    fn set_file(&mut self, file: SourceFile) {
        let legal = file.legal_conversions();
        self.conversion = match self.conversion {
            Some(current) if legal.contains(&current) => Some(current),
            _ => legal.first().copied(),
        };
        self.file = Some(Arc::new(file));
        self.last_job = None;
        self.last_error = None;
    }

    /// Whether `file` is still the selected file.
    fn holds(&self, file: &Arc<SourceFile>) -> bool {
        self.file.as_ref().is_some_and(|current| Arc::ptr_eq(current, file))
    }

    fn set_conversion(&mut self, conversion: ConversionType) -> Result<(), ConversionError> {
        if self.file.is_none() {
            return Err(ConversionError::validation(MSG_SELECT_FILE));
        }
        if !self.legal().contains(&conversion) {
            return Err(ConversionError::validation(MSG_NOT_SUPPORTED));
        }
        self.conversion = Some(conversion);
        Ok(())
    }

    fn pending_request(&self) -> Result<(Arc<SourceFile>, ConversionType), ConversionError> {
        let file = self
            .file
            .clone()
            .ok_or_else(|| ConversionError::validation(MSG_SELECT_FILE))?;
        let conversion = self
            .conversion
            .ok_or_else(|| ConversionError::validation(MSG_NOT_SUPPORTED))?;
        Ok((file, conversion))
    }

    fn view(&self, submitting: bool) -> SelectionState {
        SelectionState {
            file_name: self.file.as_ref().map(|f| f.name().to_string()),
            extension: self.file.as_ref().and_then(|f| f.extension()),
            legal_conversions: self.legal().to_vec(),
            selected_conversion: self.conversion,
            submitting,
            last_job: self.last_job.clone(),
            last_error: self.last_error.clone(),
        }
    }
}

/// Whether the safety-net refresh should be armed.
fn safety_net_armed(snapshot: &HistorySnapshot, submitting: bool) -> bool {
    !snapshot.files.is_empty() && !submitting && snapshot.error.is_none()
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

pub struct ConversionCoordinator {
    identity: Arc<IdentityBootstrapper>,
    submitter: JobSubmitter,
    history: Arc<HistoryReconciler>,
    signals: Arc<EventBus<LocalSignal>>,
    job_events: Arc<EventBus<JobEvent>>,
    notices: Arc<EventBus<Notice>>,
    selection: Mutex<Selection>,
    submitting: watch::Sender<bool>,
    channel_config: Option<ChannelConfig>,
    safety_net_delay: Duration,
    activated: AtomicBool,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    channel: Mutex<Option<ChannelHandle>>,
}

impl ConversionCoordinator {
    /// Build a session. Without a `channel_config` no push channel is
    /// opened and the listing only follows local signals and the
    /// safety net.
    pub fn new(
        api: ApiClient,
        channel_config: Option<ChannelConfig>,
        safety_net_delay: Duration,
    ) -> Self {
        let identity = Arc::new(IdentityBootstrapper::new(api.clone()));
        let notices = Arc::new(EventBus::default());
        let submitter = JobSubmitter::new(api.clone(), Arc::clone(&identity), Arc::clone(&notices));
        let history = Arc::new(HistoryReconciler::new(api, Arc::clone(&identity)));
        let (submitting, _) = watch::channel(false);

        Self {
            identity,
            submitter,
            history,
            signals: Arc::new(EventBus::default()),
            job_events: Arc::new(EventBus::default()),
            notices,
            selection: Mutex::new(Selection::default()),
            submitting,
            channel_config,
            safety_net_delay,
            activated: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
            channel: Mutex::new(None),
        }
    }

    /// Build a session with the push channel enabled.
    pub fn from_config(config: &AppConfig) -> Result<Self, ApiError> {
        let api = ApiClient::new(&config.api_url, config.request_timeout)?;
        Ok(Self::new(
            api,
            Some(config.channel_config()),
            config.safety_net_delay,
        ))
    }

    // ---- wiring ----------------------------------------------------------

    /// Start the session: listeners, safety net, push channel, and the
    /// initial history refresh. Later calls are no-ops.
    pub async fn activate(&self) {
        if self.activated.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!(
            push_channel = self.channel_config.is_some(),
            "Activating conversion session",
        );

        // Subscribe before anything can publish.
        let signals = self.signals.subscribe();
        let job_events = self.job_events.subscribe();

        let mut tasks = vec![
            tokio::spawn(listen_for_signals(
                signals,
                Arc::clone(&self.history),
                self.cancel.clone(),
            )),
            tokio::spawn(listen_for_job_events(
                job_events,
                Arc::clone(&self.signals),
                Arc::clone(&self.notices),
                self.cancel.clone(),
            )),
        ];
        tasks.extend(self.spawn_safety_net());
        self.lock_tasks().extend(tasks);

        if let Some(config) = &self.channel_config {
            let handle = NotificationChannel::open(
                config.clone(),
                Arc::clone(&self.identity),
                Arc::clone(&self.job_events),
            );
            *self.lock_channel() = Some(handle);
        }

        if let Err(e) = self.history.refresh().await {
            tracing::warn!(error = %e, "Initial history refresh failed");
        }
    }

    fn spawn_safety_net(&self) -> [JoinHandle<()>; 2] {
        let (armed_tx, armed_rx) = watch::channel(false);
        let mut history_rx = self.history.subscribe();
        let mut submitting_rx = self.submitting.subscribe();
        let cancel = self.cancel.clone();

        let condition = tokio::spawn(async move {
            loop {
                let armed = safety_net_armed(
                    &history_rx.borrow_and_update(),
                    *submitting_rx.borrow_and_update(),
                );
                armed_tx.send_if_modified(|current| {
                    let changed = *current != armed;
                    *current = armed;
                    changed
                });

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = history_rx.changed() => if changed.is_err() { break },
                    changed = submitting_rx.changed() => if changed.is_err() { break },
                }
            }
        });

        let history = Arc::clone(&self.history);
        let net = start_safety_net(
            self.safety_net_delay,
            armed_rx,
            self.cancel.clone(),
            move || {
                let history = Arc::clone(&history);
                async move {
                    if let Err(e) = history.refresh().await {
                        tracing::warn!(error = %e, "Safety-net refresh failed");
                    }
                }
                .boxed()
            },
        );

        [condition, net]
    }

    /// Close the push channel and stop every listener.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down conversion session");
        self.cancel.cancel();

        let channel = self.lock_channel().take();
        if let Some(channel) = channel {
            channel.close().await;
        }

        let tasks: Vec<_> = self.lock_tasks().drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Session task panicked");
            }
        }
    }

    // ---- selection -------------------------------------------------------

    /// Select a new file, clearing the previous result and error.
    pub fn select_file(&self, file: SourceFile) -> SelectionState {
        tracing::debug!(file = file.name(), "File selected");
        let mut selection = self.lock_selection();
        selection.set_file(file);
        selection.view(*self.submitting.borrow())
    }

    /// Choose the conversion for the selected file.
    pub fn select_conversion(
        &self,
        conversion: ConversionType,
    ) -> Result<SelectionState, ConversionError> {
        let mut selection = self.lock_selection();
        selection.set_conversion(conversion)?;
        Ok(selection.view(*self.submitting.borrow()))
    }

    pub fn selection(&self) -> SelectionState {
        self.lock_selection().view(*self.submitting.borrow())
    }

    // ---- submission ------------------------------------------------------

    /// Submit the selected file with the selected conversion.
    ///
    /// On success the local completed signal is raised so the listing
    /// picks up the new job.
    pub async fn submit(&self) -> Result<JobHandle, ConversionError> {
        let pending = self.lock_selection().pending_request();
        let (file, conversion) = match pending {
            Ok(pending) => pending,
            Err(e) => return Err(self.reject(e)),
        };

        let started = self.submitting.send_if_modified(|submitting| {
            if *submitting {
                return false;
            }
            *submitting = true;
            true
        });
        if !started {
            return Err(self.reject(ConversionError::validation(MSG_ALREADY_SUBMITTING)));
        }
        let _submitting = Submitting {
            flag: &self.submitting,
        };

        {
            let mut selection = self.lock_selection();
            selection.last_job = None;
            selection.last_error = None;
        }

        let result = self.submitter.submit(&file, conversion).await;

        {
            let mut selection = self.lock_selection();
            if selection.holds(&file) {
                match &result {
                    Ok(handle) => selection.last_job = Some(handle.clone()),
                    Err(e) => selection.last_error = Some(e.clone()),
                }
            } else {
                tracing::debug!(
                    file = file.name(),
                    "File changed during submission, result not recorded",
                );
            }
        }
        if result.is_ok() {
            self.signals.publish(LocalSignal::ConversionCompleted);
        }
        result
    }

    /// Record and announce a failure detected before submission.
    fn reject(&self, error: ConversionError) -> ConversionError {
        tracing::warn!(error = %error, "Submission rejected locally");
        self.lock_selection().last_error = Some(error.clone());
        self.notices.publish(Notice::error(error.to_string()));
        error
    }

    // ---- history ---------------------------------------------------------

    /// Reconcile the listing now.
    pub async fn refresh(&self) -> Result<Vec<ProcessedFileEntry>, HistoryError> {
        self.history.refresh().await
    }

    pub fn history(&self) -> HistorySnapshot {
        self.history.snapshot()
    }

    pub fn watch_history(&self) -> watch::Receiver<HistorySnapshot> {
        self.history.subscribe()
    }

    // ---- observation -----------------------------------------------------

    pub fn notices(&self) -> Subscription<Notice> {
        self.notices.subscribe()
    }

    pub fn job_events(&self) -> Subscription<JobEvent> {
        self.job_events.subscribe()
    }

    pub fn signals(&self) -> Subscription<LocalSignal> {
        self.signals.subscribe()
    }

    /// Push channel state, or `None` when no channel is open.
    pub fn channel_state(&self) -> Option<ChannelState> {
        self.lock_channel().as_ref().map(|c| c.state())
    }

    fn lock_selection(&self) -> MutexGuard<'_, Selection> {
        self.selection.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_tasks(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_channel(&self) -> MutexGuard<'_, Option<ChannelHandle>> {
        self.channel.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for ConversionCoordinator {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Clears the submitting flag however `submit` exits.
struct Submitting<'a> {
    flag: &'a watch::Sender<bool>,
}

impl Drop for Submitting<'_> {
    fn drop(&mut self) {
        self.flag.send_replace(false);
    }
}

// ---------------------------------------------------------------------------
// Listeners
// ---------------------------------------------------------------------------

async fn listen_for_signals(
    mut signals: Subscription<LocalSignal>,
    history: Arc<HistoryReconciler>,
    cancel: CancellationToken,
) {
    loop {
        let signal = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            signal = signals.recv() => signal,
        };
        match signal {
            Some(LocalSignal::ConversionCompleted) => {
                tracing::debug!("Conversion completed signal, refreshing history");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    result = history.refresh() => {
                        if let Err(e) = result {
                            tracing::warn!(error = %e, "History refresh after completion failed");
                        }
                    }
                }
            }
            None => break,
        }
    }
    signals.unsubscribe();
}

async fn listen_for_job_events(
    mut events: Subscription<JobEvent>,
    signals: Arc<EventBus<LocalSignal>>,
    notices: Arc<EventBus<Notice>>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = events.recv() => event,
        };
        let Some(event) = event else { break };

        notices.publish(Notice::for_job_event(&event));
        if event.signals_completion() {
            signals.publish(LocalSignal::ConversionCompleted);
        }
    }
    events.unsubscribe();
}
