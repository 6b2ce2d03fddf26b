//! Jira: issues keyed by issue key, lists hold a JQL query
//! (`{"jql": "assignee = currentUser() AND resolution = Unresolved"}`).

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use sift_core::entities::{Account, EntityState, ItemParams, List, ShadowEntity};
use sift_core::enums::{MissingPolicy, Provider};
use sift_remote::jira::{Issue, JiraSite};
use sift_remote::{RemoteClient, RemoteError};

use super::{credentials, end_of_day, list_query, query_field, require_query_field};
use crate::adapter::ProviderAdapter;
use crate::error::SyncError;

pub struct JiraAdapter {
    client: RemoteClient,
}

impl JiraAdapter {
    #[must_use]
    pub const fn new(client: RemoteClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProviderAdapter for JiraAdapter {
    type Remote = Issue;

    fn provider(&self) -> Provider {
        Provider::Jira
    }

    fn missing_policy(&self) -> MissingPolicy {
        MissingPolicy::Delete
    }

    fn native_key(&self, issue: &Issue) -> Option<String> {
        Some(issue.key.clone())
    }

    async fn list_items(&self, account: &Account, list: &List) -> Result<Vec<Issue>, RemoteError> {
        let site: JiraSite = credentials(account)?;
        self.client.jira_search(&site, list_query(list, "jql")?).await
    }

    async fn refresh(&self, account: &Account, keys: &[String]) -> Result<Vec<Issue>, RemoteError> {
        let site: JiraSite = credentials(account)?;
        self.client.jira_get_issues(&site, keys).await
    }

    async fn entity_for_remote(
        &self,
        _account: &Account,
        issue: &Issue,
        previous: Option<&ShadowEntity>,
    ) -> Result<EntityState, RemoteError> {
        let done_at = previous
            .and_then(|shadow| shadow.done_at)
            .or_else(|| issue.is_done().then(|| issue.resolved_at().unwrap_or_else(Utc::now)));
        Ok(EntityState {
            done_at,
            ..EntityState::default()
        })
    }

    fn params_for_remote(
        &self,
        account: &Account,
        issue: &Issue,
        state: &EntityState,
    ) -> Result<ItemParams, SyncError> {
        let site: JiraSite =
            credentials(account).map_err(|e| SyncError::mapping(&issue.key, e.to_string()))?;
        let fields = &issue.fields;
        Ok(ItemParams {
            summary: fields.summary.clone(),
            fields: json!({
                "key": issue.key,
                "project": fields.project.as_ref().map(|p| &p.key),
                "status": fields.status.name,
                "priority": fields.priority.as_ref().map(|p| &p.name),
                "issuetype": fields.issuetype.as_ref().map(|t| &t.name),
                "assignee": fields.assignee.as_ref().map(|a| &a.display_name),
                "labels": fields.labels,
            }),
            due: issue.due_date().and_then(end_of_day),
            done: if issue.is_done() { state.done_at } else { None },
            url: Some(site.browse_url(&issue.key)),
        })
    }

    fn parse_url(&self, account: &Account, url: &str) -> Option<String> {
        let site: JiraSite = credentials(account).ok()?;
        site.parse_issue_url(url)
    }

    fn list_url(&self, account: &Account, list: &List) -> Option<String> {
        let site: JiraSite = credentials(account).ok()?;
        Some(site.search_url(query_field(&list.query, "jql")?))
    }

    fn validate_query(&self, query: &serde_json::Value) -> Result<(), SyncError> {
        require_query_field(query, "jql")
    }
}
