use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::enums::Provider;
use crate::errors::CoreError;

/// Cached display metadata for a linked account.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct AccountDisplay {
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub icon: Option<String>,
}

/// One linked external identity of a user with one service.
///
/// The credential blob is opaque to everything except the provider adapter.
/// `problem` is set when the service rejected the credentials; such accounts
/// are skipped until re-authenticated.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Account {
    pub id: String,
    pub provider: Provider,
    pub user_id: String,
    pub external_id: String,
    pub credentials: serde_json::Value,
    pub display: AccountDisplay,
    pub problem: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Whether reconciliation may use this account.
    #[must_use]
    pub const fn is_usable(&self) -> bool {
        self.problem.is_none()
    }

    /// Decode the credential blob into the provider's credential type.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` if the blob does not match `T`.
    pub fn credentials<T: DeserializeOwned>(&self) -> Result<T, CoreError> {
        serde_json::from_value(self.credentials.clone()).map_err(|e| {
            CoreError::Validation(format!(
                "{} credentials for account {}: {e}",
                self.provider, self.id
            ))
        })
    }
}
