//! Bugzilla: one bug per entity, keyed by bug id.
//!
//! Lists hold a raw buglist query (`{"query": "assigned_to=me&resolution=---"}`).
//! Done time comes from the bug history the first time a bug is seen in a
//! terminal status and is memoized on the shadow from then on.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde_json::json;
use sift_core::entities::{Account, EntityState, ItemParams, List, ShadowEntity};
use sift_core::enums::{MissingPolicy, Provider};
use sift_remote::bugzilla::{Bug, BugzillaSite, resolved_at};
use sift_remote::{RemoteClient, RemoteError};

use super::{credentials, end_of_day, list_query, query_field, require_query_field};
use crate::adapter::ProviderAdapter;
use crate::error::SyncError;

pub struct BugzillaAdapter {
    client: RemoteClient,
}

impl BugzillaAdapter {
    #[must_use]
    pub const fn new(client: RemoteClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProviderAdapter for BugzillaAdapter {
    type Remote = Bug;

    fn provider(&self) -> Provider {
        Provider::Bugzilla
    }

    fn missing_policy(&self) -> MissingPolicy {
        MissingPolicy::Delete
    }

    fn native_key(&self, bug: &Bug) -> Option<String> {
        Some(bug.id.to_string())
    }

    async fn list_items(&self, account: &Account, list: &List) -> Result<Vec<Bug>, RemoteError> {
        let site: BugzillaSite = credentials(account)?;
        self.client.bugzilla_search(&site, list_query(list, "query")?).await
    }

    async fn refresh(&self, account: &Account, keys: &[String]) -> Result<Vec<Bug>, RemoteError> {
        let site: BugzillaSite = credentials(account)?;
        let ids: Vec<u64> = keys.iter().filter_map(|key| key.parse().ok()).collect();
        self.client.bugzilla_get_bugs(&site, &ids).await
    }

    async fn fetch_one(&self, account: &Account, key: &str) -> Result<Option<Bug>, RemoteError> {
        let site: BugzillaSite = credentials(account)?;
        let Ok(id) = key.parse::<u64>() else {
            return Ok(None);
        };
        self.client.bugzilla_get_bug(&site, id).await
    }

    async fn entity_for_remote(
        &self,
        account: &Account,
        bug: &Bug,
        previous: Option<&ShadowEntity>,
    ) -> Result<EntityState, RemoteError> {
        if let Some(done_at) = previous.and_then(|shadow| shadow.done_at) {
            return Ok(EntityState {
                done_at: Some(done_at),
                ..EntityState::default()
            });
        }
        if !bug.is_terminal() {
            return Ok(EntityState::default());
        }

        let site: BugzillaSite = credentials(account)?;
        let history = self.client.bugzilla_history(&site, bug.id).await?;
        let done_at = resolved_at(&history)
            .or(bug.last_change_time)
            .unwrap_or_else(Utc::now);
        tracing::debug!(account_id = %account.id, bug = bug.id, %done_at, "resolved done time from history");
        Ok(EntityState {
            done_at: Some(done_at),
            ..EntityState::default()
        })
    }

    fn params_for_remote(
        &self,
        account: &Account,
        bug: &Bug,
        state: &EntityState,
    ) -> Result<ItemParams, SyncError> {
        let site: BugzillaSite =
            credentials(account).map_err(|e| SyncError::mapping(bug.id.to_string(), e.to_string()))?;
        let due = bug
            .deadline
            .as_deref()
            .and_then(|deadline| NaiveDate::parse_from_str(deadline, "%Y-%m-%d").ok())
            .and_then(end_of_day);

        Ok(ItemParams {
            summary: bug.summary.clone(),
            fields: json!({
                "id": bug.id,
                "product": bug.product,
                "component": bug.component,
                "status": bug.status,
                "resolution": bug.resolution,
                "assigned_to": bug.assigned_to,
                "priority": bug.priority,
                "severity": bug.severity,
                "keywords": bug.keywords,
            }),
            due,
            done: if bug.is_terminal() { state.done_at } else { None },
            url: Some(site.bug_url(bug.id)),
        })
    }

    fn parse_url(&self, account: &Account, url: &str) -> Option<String> {
        let site: BugzillaSite = credentials(account).ok()?;
        site.parse_bug_url(url).map(|id| id.to_string())
    }

    fn list_url(&self, account: &Account, list: &List) -> Option<String> {
        let site: BugzillaSite = credentials(account).ok()?;
        Some(site.buglist_url(query_field(&list.query, "query")?))
    }

    fn validate_query(&self, query: &serde_json::Value) -> Result<(), SyncError> {
        require_query_field(query, "query")
    }
}
