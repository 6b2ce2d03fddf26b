use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::{Controller, Provider};

/// What kind of thing a core item is, with its kind-specific payload.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemDetail {
    Task,
    Link { url: String },
    Note { body: String },
    File { name: String, mime_type: Option<String> },
    Service { provider: Provider, url: Option<String> },
}

impl ItemDetail {
    /// The provider that sourced this item, if any.
    #[must_use]
    pub const fn provider(&self) -> Option<Provider> {
        match self {
            Self::Service { provider, .. } => Some(*provider),
            Self::Task | Self::Link { .. } | Self::Note { .. } | Self::File { .. } => None,
        }
    }

    /// The URL a user can open for this item, if any.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Link { url } => Some(url),
            Self::Service { url, .. } => url.as_deref(),
            Self::Task | Self::Note { .. } | Self::File { .. } => None,
        }
    }
}

/// The canonical task record in the user's inbox.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Item {
    pub id: String,
    pub user_id: String,
    pub summary: String,
    pub fields: serde_json::Value,
    pub due: Option<DateTime<Utc>>,
    pub done: Option<DateTime<Utc>>,
    pub controller: Controller,
    pub detail: ItemDetail,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Whether the synced fields already match `params`.
    #[must_use]
    pub fn matches(&self, params: &ItemParams) -> bool {
        self.summary == params.summary
            && self.fields == params.fields
            && self.due == params.due
            && self.done == params.done
            && self.detail.url() == params.url.as_deref()
    }
}

/// Provider-mapped values for the synced fields of a core item.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ItemParams {
    pub summary: String,
    pub fields: serde_json::Value,
    pub due: Option<DateTime<Utc>>,
    pub done: Option<DateTime<Utc>>,
    /// Link back to the remote entity.
    pub url: Option<String>,
}

/// Reference to a core item together with the remote entity controlling it.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
pub struct ItemRef {
    pub item_id: String,
    pub account_id: String,
    pub native_key: String,
}
