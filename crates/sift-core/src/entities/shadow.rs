use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::Provider;

/// Persisted record tracking one remote entity.
///
/// Keyed by `(provider, account_id, native_key)`. Exactly one shadow entity
/// controls exactly one core item (`item_id`). `done_at` is memoized: once set
/// it is never overwritten.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ShadowEntity {
    pub provider: Provider,
    pub account_id: String,
    pub native_key: String,
    pub item_id: String,
    pub done_at: Option<DateTime<Utc>>,
    pub memo: serde_json::Value,
}

impl ShadowEntity {
    #[must_use]
    pub fn state(&self) -> EntityState {
        EntityState {
            done_at: self.done_at,
            memo: self.memo.clone(),
        }
    }
}

/// The memoized, provider-computed part of a shadow entity.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct EntityState {
    pub done_at: Option<DateTime<Utc>>,
    pub memo: serde_json::Value,
}
