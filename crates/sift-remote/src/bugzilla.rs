//! Bugzilla REST client.
//!
//! Authenticates with the `X-BUGZILLA-API-KEY` header. Every site is
//! self-hosted, so the base URL comes from the account credentials.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::http::{check_response, found};
use crate::{RemoteClient, RemoteError, trim_base};

/// Bug statuses that mean the bug is done.
pub const TERMINAL_STATUSES: &[&str] = &["RESOLVED", "VERIFIED", "CLOSED"];

/// Credential blob of a Bugzilla account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BugzillaSite {
    /// Base URL of the installation, e.g. `https://bugzilla.mozilla.org`.
    pub url: String,
    pub api_key: String,
}

impl BugzillaSite {
    #[must_use]
    pub fn base(&self) -> &str {
        trim_base(&self.url)
    }

    #[must_use]
    pub fn bug_url(&self, id: u64) -> String {
        format!("{}/show_bug.cgi?id={id}", self.base())
    }

    /// Web UI URL of a saved buglist query.
    #[must_use]
    pub fn buglist_url(&self, query: &str) -> String {
        format!("{}/buglist.cgi?{}", self.base(), query.trim_start_matches('?'))
    }

    /// Extract a bug id from a link to this installation.
    ///
    /// Accepts `show_bug.cgi?id=N` and the short `/N` form. Links to other
    /// hosts never match.
    #[must_use]
    pub fn parse_bug_url(&self, link: &str) -> Option<u64> {
        let site = Url::parse(self.base()).ok()?;
        let link = Url::parse(link.trim()).ok()?;
        if site.host_str()? != link.host_str()? || site.port_or_known_default() != link.port_or_known_default() {
            return None;
        }

        let prefix = site.path().trim_end_matches('/');
        let rest = link.path().strip_prefix(prefix)?.trim_start_matches('/');
        if rest == "show_bug.cgi" {
            return link
                .query_pairs()
                .find(|(name, _)| name == "id")
                .and_then(|(_, value)| value.parse().ok());
        }
        rest.trim_end_matches('/').parse().ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bug {
    pub id: u64,
    pub summary: String,
    pub status: String,
    #[serde(default)]
    pub resolution: String,
    #[serde(default)]
    pub product: String,
    #[serde(default)]
    pub component: String,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    /// `YYYY-MM-DD`, when the installation tracks deadlines.
    #[serde(default)]
    pub deadline: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub last_change_time: Option<DateTime<Utc>>,
}

impl Bug {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        TERMINAL_STATUSES.contains(&self.status.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HistoryChange {
    pub field_name: String,
    #[serde(default)]
    pub removed: String,
    #[serde(default)]
    pub added: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HistoryEntry {
    pub when: DateTime<Utc>,
    #[serde(default)]
    pub who: String,
    #[serde(default)]
    pub changes: Vec<HistoryChange>,
}

/// When the bug most recently moved into a terminal status.
#[must_use]
pub fn resolved_at(history: &[HistoryEntry]) -> Option<DateTime<Utc>> {
    history
        .iter()
        .filter(|entry| {
            entry.changes.iter().any(|change| {
                change.field_name == "status" && TERMINAL_STATUSES.contains(&change.added.as_str())
            })
        })
        .map(|entry| entry.when)
        .max()
}

#[derive(Deserialize)]
struct BugsResponse {
    #[serde(default)]
    bugs: Vec<Bug>,
}

#[derive(Deserialize)]
struct HistoryResponse {
    bugs: Vec<BugHistory>,
}

#[derive(Deserialize)]
struct BugHistory {
    #[serde(default)]
    history: Vec<HistoryEntry>,
}

impl RemoteClient {
    async fn bugzilla_get(&self, site: &BugzillaSite, url: &str) -> Result<reqwest::Response, RemoteError> {
        check_response(
            self.http
                .get(url)
                .header("X-BUGZILLA-API-KEY", site.api_key.as_str())
                .header(reqwest::header::ACCEPT, "application/json")
                .send()
                .await?,
        )
        .await
    }

    /// Run a saved buglist query (`assigned_to=...&resolution=---`).
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] if the request fails or the response cannot
    /// be parsed.
    pub async fn bugzilla_search(&self, site: &BugzillaSite, query: &str) -> Result<Vec<Bug>, RemoteError> {
        let url = format!("{}/rest/bug?{}", site.base(), query.trim_start_matches('?'));
        let data: BugsResponse = self.bugzilla_get(site, &url).await?.json().await?;
        Ok(data.bugs)
    }

    /// Fetch many bugs in one request. Bugs that do not exist (or are not
    /// visible) are simply absent from the result.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] if the request fails.
    pub async fn bugzilla_get_bugs(&self, site: &BugzillaSite, ids: &[u64]) -> Result<Vec<Bug>, RemoteError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = ids.iter().map(u64::to_string).collect::<Vec<_>>().join(",");
        let url = format!(
            "{}/rest/bug?id={}&permissive=1",
            site.base(),
            urlencoding::encode(&ids)
        );
        let data: BugsResponse = self.bugzilla_get(site, &url).await?.json().await?;
        Ok(data.bugs)
    }

    /// Fetch one bug, `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] if the request fails.
    pub async fn bugzilla_get_bug(&self, site: &BugzillaSite, id: u64) -> Result<Option<Bug>, RemoteError> {
        let url = format!("{}/rest/bug/{id}", site.base());
        let Some(resp) = found(self.bugzilla_get(site, &url).await)? else {
            return Ok(None);
        };
        let data: BugsResponse = resp.json().await?;
        Ok(data.bugs.into_iter().next())
    }

    /// Change history of one bug, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] if the request fails.
    pub async fn bugzilla_history(&self, site: &BugzillaSite, id: u64) -> Result<Vec<HistoryEntry>, RemoteError> {
        let url = format!("{}/rest/bug/{id}/history", site.base());
        let data: HistoryResponse = self.bugzilla_get(site, &url).await?.json().await?;
        Ok(data
            .bugs
            .into_iter()
            .next()
            .map(|bug| bug.history)
            .unwrap_or_default())
    }
}
