use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::due::DueOffset;

/// A saved remote query belonging to an account.
///
/// `query` is provider-specific; its display URL is derived by the provider
/// adapter rather than stored.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct List {
    pub id: String,
    pub account_id: String,
    pub name: String,
    pub query: serde_json::Value,
    #[schemars(with = "Option<String>")]
    pub due_offset: Option<DueOffset>,
    pub created_at: DateTime<Utc>,
}
