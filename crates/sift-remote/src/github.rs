//! GitHub REST client.

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::http::{check_response, found, next_link};
use crate::{RemoteClient, RemoteError, trim_base, warn_truncated};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

static ISSUE_URL: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(
        r"^https?://(?:www\.)?github\.com/([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+)/(?:issues|pull)/(\d+)(?:[/?#].*)?$",
    )
    .expect("valid regex")
});

static ISSUE_KEY: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+)#(\d+)$").expect("valid regex")
});

/// Credential blob of a GitHub account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubToken {
    pub token: String,
}

/// An issue or pull request, addressed as `owner/repo#number`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IssueRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

impl IssueRef {
    /// Parse the `owner/repo#number` form.
    #[must_use]
    pub fn parse_key(key: &str) -> Option<Self> {
        let caps = ISSUE_KEY.captures(key)?;
        Some(Self {
            owner: caps[1].to_string(),
            repo: caps[2].to_string(),
            number: caps[3].parse().ok()?,
        })
    }

    /// Recognise a github.com issue or pull request link.
    #[must_use]
    pub fn parse_url(link: &str) -> Option<Self> {
        let caps = ISSUE_URL.captures(link.trim())?;
        Some(Self {
            owner: caps[1].to_string(),
            repo: caps[2].to_string(),
            number: caps[3].parse().ok()?,
        })
    }
}

impl fmt::Display for IssueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub html_url: String,
    /// `https://api.github.com/repos/{owner}/{repo}`.
    pub repository_url: String,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Present only on pull requests.
    #[serde(default)]
    pub pull_request: Option<serde_json::Value>,
}

impl Issue {
    /// `owner/repo`, taken from the repository API URL.
    #[must_use]
    pub fn repository(&self) -> Option<String> {
        let mut segments = self.repository_url.trim_end_matches('/').rsplit('/');
        let repo = segments.next()?;
        let owner = segments.next()?;
        Some(format!("{owner}/{repo}"))
    }

    #[must_use]
    pub fn issue_ref(&self) -> Option<IssueRef> {
        let repository = self.repository()?;
        let (owner, repo) = repository.split_once('/')?;
        Some(IssueRef {
            owner: owner.to_string(),
            repo: repo.to_string(),
            number: self.number,
        })
    }

    #[must_use]
    pub const fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<Issue>,
}

impl RemoteClient {
    async fn github_get(&self, token: &GithubToken, url: &str) -> Result<reqwest::Response, RemoteError> {
        check_response(
            self.http
                .get(url)
                .bearer_auth(&token.token)
                .header(reqwest::header::ACCEPT, "application/vnd.github+json")
                .header("X-GitHub-Api-Version", "2022-11-28")
                .send()
                .await?,
        )
        .await
    }

    /// Run an issue search (`is:open assignee:@me`), following the `Link`
    /// header across result pages up to the client's page cap.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] if the request fails or the response cannot
    /// be parsed.
    pub async fn github_search_issues(
        &self,
        api_base: &str,
        token: &GithubToken,
        query: &str,
    ) -> Result<Vec<Issue>, RemoteError> {
        let mut url = format!(
            "{}/search/issues?q={}&per_page=100",
            trim_base(api_base),
            urlencoding::encode(query)
        );
        let mut issues = Vec::new();
        for _ in 0..self.max_pages {
            let resp = self.github_get(token, &url).await?;
            let next = next_link(resp.headers());
            let data: SearchResponse = resp.json().await?;
            issues.extend(data.items);
            match next {
                Some(link) => url = link,
                None => return Ok(issues),
            }
        }
        warn_truncated("github", self.max_pages);
        Ok(issues)
    }

    /// Fetch one issue or pull request, `None` if it is gone.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] if the request fails.
    pub async fn github_get_issue(
        &self,
        api_base: &str,
        token: &GithubToken,
        issue: &IssueRef,
    ) -> Result<Option<Issue>, RemoteError> {
        let url = format!(
            "{}/repos/{}/{}/issues/{}",
            trim_base(api_base),
            urlencoding::encode(&issue.owner),
            urlencoding::encode(&issue.repo),
            issue.number
        );
        match found(self.github_get(token, &url).await)? {
            Some(resp) => Ok(Some(resp.json().await?)),
            None => Ok(None),
        }
    }
}
