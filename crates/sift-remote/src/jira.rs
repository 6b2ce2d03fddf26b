//! Jira REST client (v2 API, basic auth with an API token).

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::http::check_response;
use crate::{RemoteClient, RemoteError, trim_base, warn_truncated};

const FIELDS: &str = "summary,status,resolutiondate,duedate,priority,issuetype,assignee,labels,project";

static ISSUE_KEY: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^[A-Z][A-Z0-9_]*-[1-9][0-9]*$").expect("valid regex"));

/// Credential blob of a Jira account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JiraSite {
    /// `https://example.atlassian.net`
    pub url: String,
    pub email: String,
    pub api_token: String,
}

impl JiraSite {
    #[must_use]
    pub fn base(&self) -> &str {
        trim_base(&self.url)
    }

    #[must_use]
    pub fn browse_url(&self, key: &str) -> String {
        format!("{}/browse/{key}", self.base())
    }

    /// Web UI URL of a JQL search.
    #[must_use]
    pub fn search_url(&self, jql: &str) -> String {
        format!("{}/issues/?jql={}", self.base(), urlencoding::encode(jql))
    }

    /// Extract an issue key from a `/browse/KEY` link on this site.
    #[must_use]
    pub fn parse_issue_url(&self, link: &str) -> Option<String> {
        let site = Url::parse(self.base()).ok()?;
        let link = Url::parse(link.trim()).ok()?;
        if site.host_str()? != link.host_str()? {
            return None;
        }
        let key = link
            .path()
            .trim_end_matches('/')
            .strip_prefix("/browse/")?;
        is_issue_key(key).then(|| key.to_string())
    }
}

#[must_use]
pub fn is_issue_key(key: &str) -> bool {
    ISSUE_KEY.is_match(key)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Named {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCategory {
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub name: String,
    pub status_category: StatusCategory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignee {
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub key: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueFields {
    pub summary: String,
    pub status: Status,
    #[serde(default)]
    pub resolutiondate: Option<String>,
    #[serde(default)]
    pub duedate: Option<String>,
    #[serde(default)]
    pub priority: Option<Named>,
    #[serde(default)]
    pub issuetype: Option<Named>,
    #[serde(default)]
    pub assignee: Option<Assignee>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub project: Option<Project>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub key: String,
    pub fields: IssueFields,
}

impl Issue {
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.fields.status.status_category.key == "done"
    }

    /// `resolutiondate` parsed; Jira writes offsets without a colon.
    #[must_use]
    pub fn resolved_at(&self) -> Option<DateTime<Utc>> {
        self.fields.resolutiondate.as_deref().and_then(parse_timestamp)
    }

    #[must_use]
    pub fn due_date(&self) -> Option<NaiveDate> {
        self.fields
            .duedate
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
    }
}

/// Parse Jira's `2026-03-01T12:00:00.000+0000` timestamps (RFC 3339 accepted too).
#[must_use]
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z")
        .or_else(|_| DateTime::parse_from_rfc3339(s))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    start_at: u64,
    #[serde(default)]
    total: u64,
    #[serde(default)]
    issues: Vec<Issue>,
}

impl RemoteClient {
    /// Run a JQL search, paging by `startAt` until `total` is reached or
    /// the client's page cap. With `lenient`, JQL referencing missing issues
    /// produces warnings instead of a 400.
    async fn jira_search_jql(
        &self,
        site: &JiraSite,
        jql: &str,
        lenient: bool,
    ) -> Result<Vec<Issue>, RemoteError> {
        let validate = if lenient { "warn" } else { "strict" };
        let mut issues: Vec<Issue> = Vec::new();
        let mut start_at = 0_u64;
        for _ in 0..self.max_pages {
            let url = format!(
                "{}/rest/api/2/search?jql={}&fields={FIELDS}&startAt={start_at}&maxResults=100&validateQuery={validate}",
                site.base(),
                urlencoding::encode(jql)
            );
            let resp = check_response(
                self.http
                    .get(&url)
                    .basic_auth(&site.email, Some(&site.api_token))
                    .header(reqwest::header::ACCEPT, "application/json")
                    .send()
                    .await?,
            )
            .await?;
            let data: SearchResponse = resp.json().await?;
            if data.issues.is_empty() {
                return Ok(issues);
            }
            start_at = data.start_at + data.issues.len() as u64;
            issues.extend(data.issues);
            if start_at >= data.total {
                return Ok(issues);
            }
        }
        warn_truncated("jira", self.max_pages);
        Ok(issues)
    }

    /// Run a saved JQL query.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] if the request fails or the JQL is rejected.
    pub async fn jira_search(&self, site: &JiraSite, jql: &str) -> Result<Vec<Issue>, RemoteError> {
        self.jira_search_jql(site, jql, false).await
    }

    /// Fetch many issues by key in one JQL query. Missing keys are absent
    /// from the result.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] if the request fails.
    pub async fn jira_get_issues(&self, site: &JiraSite, keys: &[String]) -> Result<Vec<Issue>, RemoteError> {
        let keys: Vec<&str> = keys
            .iter()
            .map(String::as_str)
            .filter(|key| is_issue_key(key))
            .collect();
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let jql = format!("key in ({})", keys.join(","));
        self.jira_search_jql(site, &jql, true).await
    }
}
