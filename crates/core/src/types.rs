use std::fmt;

use serde::{Deserialize, Serialize};

/// Server-assigned conversion job identifier.
pub type JobId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Name of the cookie the service reads the session identity from.
pub const CLIENT_ID_COOKIE: &str = "client_id";

/// Opaque anonymous session token handed out by the identity endpoint.
///
/// Lives only in memory for the lifetime of one session; never persisted
/// and never rotated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value for the `Cookie` header that scopes a request to this session.
    pub fn cookie_header(&self) -> String {
        format!("{CLIENT_ID_COOKIE}={}", self.0)
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
