//! Errors returned by the remote API.

use thiserror::Error;

/// Failure of a single remote call.
///
/// The client never retries; whoever called decides what to do with it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The request never produced an HTTP response (DNS, connect, timeout).
    #[error("Network error: {0}")]
    Transport(String),
    /// The service answered with a non-2xx status.
    #[error("Request rejected ({status}): {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Message reported by the service, or the raw body.
        message: String,
    },
    /// A 2xx response whose body could not be decoded.
    #[error("Unexpected response: {0}")]
    Decode(String),
    /// A paginated listing returned an empty page while reporting more pages.
    #[error("Listing ended early: page {page} was empty but more pages were reported")]
    IncompleteListing {
        /// Zero-based index of the empty page.
        page: u32,
    },
}

impl RemoteError {
    /// Builds a rejection from a non-2xx response body.
    ///
    /// Prefers the service's own `msg`/`message` field, then the raw body, then
    /// a generic status text.
    #[must_use]
    pub fn rejected(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|value| {
                value
                    .get("msg")
                    .or_else(|| value.get("message"))
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_owned)
            })
            .or_else(|| {
                let trimmed = body.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_owned())
            })
            .unwrap_or_else(|| format!("HTTP {status}"));
        Self::Rejected { status, message }
    }

    /// HTTP status code, when the service answered at all.
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            Self::Transport(_) | Self::Decode(_) | Self::IncompleteListing { .. } => None,
        }
    }

    /// `true` for 429 Too Many Requests.
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Rejected { status: 429, .. })
    }

    /// `true` when the credentials were refused.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Rejected { status: 401 | 403, .. })
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Decode(error.to_string())
        } else if let Some(status) = error.status() {
            Self::Rejected { status: status.as_u16(), message: error.to_string() }
        } else {
            Self::Transport(error.to_string())
        }
    }
}
