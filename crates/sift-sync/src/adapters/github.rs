//! GitHub: issues and pull requests, keyed `owner/repo#number`.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use sift_core::entities::{Account, EntityState, ItemParams, List, ShadowEntity};
use sift_core::enums::{MissingPolicy, Provider};
use sift_remote::github::{DEFAULT_API_BASE, GithubToken, Issue, IssueRef};
use sift_remote::{RemoteClient, RemoteError};

use super::{credentials, list_query, query_field, require_query_field};
use crate::adapter::ProviderAdapter;
use crate::error::SyncError;

pub struct GithubAdapter {
    client: RemoteClient,
    api_base: String,
}

impl GithubAdapter {
    #[must_use]
    pub fn new(client: RemoteClient, api_base: Option<&str>) -> Self {
        Self {
            client,
            api_base: api_base.unwrap_or(DEFAULT_API_BASE).to_string(),
        }
    }
}

fn is_closed(issue: &Issue) -> bool {
    issue.state == "closed"
}

#[async_trait]
impl ProviderAdapter for GithubAdapter {
    type Remote = Issue;

    fn provider(&self) -> Provider {
        Provider::Github
    }

    fn missing_policy(&self) -> MissingPolicy {
        MissingPolicy::Delete
    }

    fn native_key(&self, issue: &Issue) -> Option<String> {
        issue.issue_ref().map(|r| r.to_string())
    }

    async fn list_items(&self, account: &Account, list: &List) -> Result<Vec<Issue>, RemoteError> {
        let token: GithubToken = credentials(account)?;
        self.client
            .github_search_issues(&self.api_base, &token, list_query(list, "query")?)
            .await
    }

    /// No bulk endpoint; issues are fetched one by one.
    async fn refresh(&self, account: &Account, keys: &[String]) -> Result<Vec<Issue>, RemoteError> {
        let token: GithubToken = credentials(account)?;
        let mut issues = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(issue_ref) = IssueRef::parse_key(key) else {
                continue;
            };
            if let Some(issue) = self.client.github_get_issue(&self.api_base, &token, &issue_ref).await? {
                issues.push(issue);
            }
        }
        Ok(issues)
    }

    async fn entity_for_remote(
        &self,
        _account: &Account,
        issue: &Issue,
        previous: Option<&ShadowEntity>,
    ) -> Result<EntityState, RemoteError> {
        let done_at = previous.and_then(|shadow| shadow.done_at).or_else(|| {
            is_closed(issue).then(|| issue.closed_at.or(issue.updated_at).unwrap_or_else(Utc::now))
        });
        Ok(EntityState {
            done_at,
            ..EntityState::default()
        })
    }

    fn params_for_remote(
        &self,
        _account: &Account,
        issue: &Issue,
        state: &EntityState,
    ) -> Result<ItemParams, SyncError> {
        let labels: Vec<&str> = issue.labels.iter().map(|label| label.name.as_str()).collect();
        Ok(ItemParams {
            summary: issue.title.clone(),
            fields: json!({
                "repository": issue.repository(),
                "number": issue.number,
                "state": issue.state,
                "kind": if issue.is_pull_request() { "pull_request" } else { "issue" },
                "labels": labels,
            }),
            due: None,
            done: if is_closed(issue) { state.done_at } else { None },
            url: Some(issue.html_url.clone()),
        })
    }

    fn parse_url(&self, _account: &Account, url: &str) -> Option<String> {
        IssueRef::parse_url(url).map(|r| r.to_string())
    }

    fn list_url(&self, _account: &Account, list: &List) -> Option<String> {
        let query = query_field(&list.query, "query")?;
        Some(format!("https://github.com/issues?q={}", urlencoding::encode(query)))
    }

    fn validate_query(&self, query: &serde_json::Value) -> Result<(), SyncError> {
        require_query_field(query, "query")
    }
}
