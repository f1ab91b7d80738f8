//! Error taxonomy surfaced to the user boundary.
//!
//! Display strings are the user-facing messages; callers render them
//! verbatim.

/// Outcome of a failed submission (or a failed local precondition).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversionError {
    /// The session identity could not be established.
    #[error("Could not identify the session. Try reloading the page.")]
    Session,

    /// Illegal file / conversion pairing, caught before any network call.
    #[error("{0}")]
    Validation(String),

    /// No response was received (network failure or timeout).
    #[error("No response from the server. Check your connection.")]
    Transport,

    /// The server answered with a non-success status.
    #[error("{message}")]
    Server { status: u16, message: String },

    /// The server answered with a success status but an unexpected shape.
    #[error("{0}")]
    Protocol(String),

    #[error("{0}")]
    Unexpected(String),
}

impl ConversionError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether the failure was detected locally, without contacting the
    /// server.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Failure of a history reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    /// The session identity could not be established.
    #[error("Could not identify the session. Try reloading the page.")]
    Session,

    /// The listing endpoint could not be reached or refused the request.
    #[error("Could not load converted files: {0}")]
    Fetch(String),
}
