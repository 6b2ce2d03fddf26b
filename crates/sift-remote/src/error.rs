//! Provider client error types.

use thiserror::Error;

/// Errors that can occur when talking to a provider API.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider API returned a non-success status code.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code returned by the provider.
        status: u16,
        /// Error message or response body.
        message: String,
    },

    /// The provider rejected the credentials (401/403).
    #[error("unauthorized ({status}): {message}")]
    Unauthorized { status: u16, message: String },

    /// The stored credential blob cannot be used for this provider.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The requested remote entity does not exist (404/410).
    #[error("not found: {0}")]
    NotFound(String),

    /// The provider returned a 429 (or an exhausted rate limit).
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// A call did not complete within its time budget.
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Failed to parse a provider response.
    #[error("parse error: {0}")]
    Parse(String),
}

impl RemoteError {
    /// Errors that are expected to clear up on their own. The next scheduled
    /// cycle retries them.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::RateLimited { .. } | Self::Timeout { .. } => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Unauthorized { .. }
            | Self::InvalidCredentials(_)
            | Self::NotFound(_)
            | Self::Parse(_) => false,
        }
    }

    /// Errors meaning the account's credentials no longer work.
    #[must_use]
    pub const fn is_revoked(&self) -> bool {
        matches!(self, Self::Unauthorized { .. } | Self::InvalidCredentials(_))
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
