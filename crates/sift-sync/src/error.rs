//! Sync engine error types.

use sift_core::enums::Provider;
use sift_core::errors::CoreError;
use sift_db::error::DatabaseError;
use sift_remote::RemoteError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Storage failed; nothing from the current pass was written.
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// A transient provider failure on an on-demand path.
    #[error("{provider} is temporarily unavailable: {source}")]
    TemporarilyUnavailable {
        provider: Provider,
        #[source]
        source: RemoteError,
    },

    /// The provider rejected the account's credentials. The account has
    /// been flagged.
    #[error("account {account_id} needs to be re-authenticated")]
    Revoked { account_id: String },

    /// The account is flagged and cannot be used until re-authenticated.
    #[error("account {account_id} has a credential problem: {problem}")]
    AccountUnusable { account_id: String, problem: String },

    #[error("account {account_id} belongs to {actual}, not {expected}")]
    WrongProvider {
        account_id: String,
        expected: Provider,
        actual: Provider,
    },

    /// A remote entity could not be mapped onto a core item.
    #[error("cannot map remote entity {key}: {reason}")]
    Mapping { key: String, reason: String },

    #[error("invalid list query: {0}")]
    InvalidQuery(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl SyncError {
    pub(crate) fn mapping(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Mapping {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
