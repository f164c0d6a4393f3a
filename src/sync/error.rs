//! Errors of the sync engine.

use thiserror::Error;

use crate::remote::RemoteError;
use crate::store::StoreError;

/// Errors surfaced to whoever triggered a sync operation.
///
/// The deliberate no-ops (refresh already in flight, throttle window open)
/// are not errors; they are reported through
/// [`RefreshOutcome`](super::RefreshOutcome).
#[derive(Error, Debug)]
pub enum SyncError {
    /// A remote call failed.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// The snapshot could not be persisted.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The request collides with work already running locally or remotely.
    /// Detected before any mutating call is issued.
    #[error("{0}")]
    Conflict(String),

    /// The API key matches none of the personal token's projects.
    #[error("The configured API key does not match any of your projects")]
    StaleCredentials,

    /// No session, or credentials with an empty API key or project token.
    #[error("Project not configured")]
    NotConfigured,

    /// The personal token is malformed.
    #[error("It's not a valid personal token")]
    InvalidPersonalToken,

    /// Auto-translation was requested for a project without languages.
    #[error("No languages to auto-translate")]
    NoLanguages,
}

impl SyncError {
    /// [`SyncError::Conflict`] with `message`.
    pub(crate) fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// The remote rejected the request because of rate limiting.
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Remote(error) if error.is_rate_limited())
    }

    /// The credentials themselves are unusable, as opposed to the service
    /// being unreachable while checking them.
    #[must_use]
    pub const fn is_credential_error(&self) -> bool {
        matches!(self, Self::StaleCredentials | Self::NotConfigured | Self::InvalidPersonalToken)
    }
}
