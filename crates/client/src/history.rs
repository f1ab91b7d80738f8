//! Reconciliation of the processed-file listing.
//!
//! Every [`HistoryReconciler::refresh`] replaces the whole list with a
//! fresh server snapshot; nothing is patched incrementally. Refreshes may
//! overlap: each takes a ticket when it starts and its result is applied
//! only if no later-started refresh has already been applied, so a slow
//! response never overwrites a newer one. `loading` stays set while any
//! refresh is in flight and is cleared on every exit path, including a
//! dropped refresh future.

use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tokio::sync::watch;

use fileconv_core::error::HistoryError;
use fileconv_core::files::{FileListItem, ProcessedFileEntry};

use crate::api::{ApiClient, ApiError};
use crate::identity::IdentityBootstrapper;

/// What the boundary sees of the listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistorySnapshot {
    pub files: Vec<ProcessedFileEntry>,
    pub loading: bool,
    pub error: Option<HistoryError>,
}

#[derive(Debug, Default)]
struct Bookkeeping {
    next_ticket: u64,
    last_applied: u64,
    in_flight: usize,
}

/// Maintains the list of files currently available for download.
pub struct HistoryReconciler {
    api: ApiClient,
    identity: Arc<IdentityBootstrapper>,
    state: watch::Sender<HistorySnapshot>,
    books: Mutex<Bookkeeping>,
}

impl HistoryReconciler {
    pub fn new(api: ApiClient, identity: Arc<IdentityBootstrapper>) -> Self {
        let (state, _) = watch::channel(HistorySnapshot::default());
        Self {
            api,
            identity,
            state,
            books: Mutex::new(Bookkeeping::default()),
        }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> HistorySnapshot {
        self.state.borrow().clone()
    }

    /// Receive every snapshot change.
    pub fn subscribe(&self) -> watch::Receiver<HistorySnapshot> {
        self.state.subscribe()
    }

    /// Fetch a fresh listing and replace the current one.
    ///
    /// A session failure empties the list; a fetch failure keeps the last
    /// known list. Either way the error is recorded in the snapshot.
    pub async fn refresh(&self) -> Result<Vec<ProcessedFileEntry>, HistoryError> {
        let ticket = self.begin();
        let _in_flight = InFlight { reconciler: self };

        let outcome = self.fetch().await;
        self.apply(ticket, &outcome);
        outcome
    }

    fn books(&self) -> MutexGuard<'_, Bookkeeping> {
        self.books.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn begin(&self) -> u64 {
        let mut books = self.books();
        books.next_ticket += 1;
        books.in_flight += 1;
        self.state.send_modify(|s| s.loading = true);
        books.next_ticket
    }

    fn finish(&self) {
        let mut books = self.books();
        books.in_flight = books.in_flight.saturating_sub(1);
        let loading = books.in_flight > 0;
        self.state.send_if_modified(|s| {
            let changed = s.loading != loading;
            s.loading = loading;
            changed
        });
    }

    fn apply(&self, ticket: u64, outcome: &Result<Vec<ProcessedFileEntry>, HistoryError>) {
        let mut books = self.books();
        if ticket < books.last_applied {
            tracing::debug!(
                ticket,
                last_applied = books.last_applied,
                "Discarding stale history result",
            );
            return;
        }
        books.last_applied = ticket;

        self.state.send_modify(|s| match outcome {
            Ok(files) => {
                s.files = files.clone();
                s.error = None;
            }
            Err(HistoryError::Session) => {
                s.files.clear();
                s.error = Some(HistoryError::Session);
            }
            Err(e) => {
                s.error = Some(e.clone());
            }
        });
    }

    async fn fetch(&self) -> Result<Vec<ProcessedFileEntry>, HistoryError> {
        let identity = self.identity.ensure().await.map_err(|e| {
            tracing::warn!(error = %e, "History refresh without a session");
            HistoryError::Session
        })?;

        let listing = self.api.list_files(&identity).await.map_err(|e| {
            tracing::warn!(error = %e, "History refresh failed");
            HistoryError::Fetch(describe(&e))
        })?;

        let files = parse_listing(listing);
        tracing::debug!(count = files.len(), "History refreshed");
        Ok(files)
    }
}

/// Clears the in-flight count however `refresh` exits.
struct InFlight<'a> {
    reconciler: &'a HistoryReconciler,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.reconciler.finish();
    }
}

/// Interpret a listing body.
///
/// Anything without an array-shaped `files` field means "no files".
/// Array elements that do not decode are skipped.
pub fn parse_listing(listing: Value) -> Vec<ProcessedFileEntry> {
    let items = match listing {
        Value::Object(mut body) => match body.remove("files") {
            Some(Value::Array(items)) => items,
            other => {
                tracing::warn!(files = ?other, "Listing has no files array, treating as empty");
                return Vec::new();
            }
        },
        other => {
            tracing::warn!(body = ?other, "Listing is not an object, treating as empty");
            return Vec::new();
        }
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<FileListItem>(item) {
            Ok(item) => Some(ProcessedFileEntry::from(item)),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed listing entry");
                None
            }
        })
        .collect()
}

fn describe(error: &ApiError) -> String {
    match error {
        ApiError::Request(_) => "no response from the server".to_string(),
        ApiError::Status { status, .. } => format!("HTTP {status}"),
        ApiError::Decode(_) => "malformed response".to_string(),
    }
}
