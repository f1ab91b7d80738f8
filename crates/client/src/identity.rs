//! Lazily-created, session-wide client identity.
//!
//! [`IdentityBootstrapper::ensure`] issues at most one creation request
//! at a time: callers arriving while a request is in flight wait for its
//! result instead of issuing their own. A failed request leaves the cache
//! empty, so the next caller retries.

use tokio::sync::OnceCell;

use fileconv_core::types::ClientIdentity;

use crate::api::{ApiClient, ApiError};

/// Errors from establishing the session identity.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The identity endpoint could not be reached or refused the request.
    #[error("Failed to obtain client_id: {0}")]
    Api(#[from] ApiError),

    /// The endpoint answered with an empty identifier.
    #[error("Identity endpoint returned an empty client_id")]
    Empty,
}

/// Obtains and caches the session identity.
///
/// Share one instance per session (behind an `Arc`); the cache lives
/// exactly as long as the bootstrapper.
pub struct IdentityBootstrapper {
    api: ApiClient,
    identity: OnceCell<ClientIdentity>,
}

impl IdentityBootstrapper {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            identity: OnceCell::new(),
        }
    }

    /// Return the cached identity, creating it on first use.
    pub async fn ensure(&self) -> Result<ClientIdentity, IdentityError> {
        self.identity
            .get_or_try_init(|| self.create())
            .await
            .cloned()
    }

    async fn create(&self) -> Result<ClientIdentity, IdentityError> {
        match self.api.create_client_id().await {
            Ok(response) if response.client_id.trim().is_empty() => {
                tracing::error!("Identity endpoint returned an empty client_id");
                Err(IdentityError::Empty)
            }
            Ok(response) => {
                tracing::info!(
                    status = response.status.as_deref().unwrap_or("unknown"),
                    "Client identity established",
                );
                Ok(ClientIdentity::new(response.client_id))
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to obtain client identity");
                Err(e.into())
            }
        }
    }
}
