//! Google client: Gmail threads and Drive files.
//!
//! Both APIs are served from `https://www.googleapis.com` and take an OAuth
//! bearer token.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::http::{check_response, found};
use crate::{RemoteClient, RemoteError, trim_base, warn_truncated};

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com";

const FILE_FIELDS: &str = "id,name,mimeType,webViewLink,modifiedTime,trashed";

static DOC_PATH: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^/(?:document|spreadsheets|presentation|drawings|forms|file)/(?:u/\d+/)?d/([A-Za-z0-9_-]{10,})")
        .expect("valid regex")
});

static THREAD_ID: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^[0-9a-f]{16}$").expect("valid regex"));

/// Credential blob of a Google account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoogleToken {
    pub access_token: String,
}

/// A Google entity recognised from a pasted link.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GoogleRef {
    Thread(String),
    File(String),
}

impl GoogleRef {
    /// Recognise Gmail thread links and Docs/Sheets/Slides/Drive file links.
    #[must_use]
    pub fn parse_url(link: &str) -> Option<Self> {
        let url = Url::parse(link.trim()).ok()?;
        match url.host_str()? {
            "mail.google.com" => {
                let fragment = url.fragment()?;
                let last = fragment.trim_end_matches('/').rsplit('/').next()?;
                THREAD_ID
                    .is_match(last)
                    .then(|| Self::Thread(last.to_string()))
            }
            "docs.google.com" | "drive.google.com" => {
                if let Some(caps) = DOC_PATH.captures(url.path()) {
                    return Some(Self::File(caps[1].to_string()));
                }
                if url.path() == "/open" {
                    return url
                        .query_pairs()
                        .find(|(name, _)| name == "id")
                        .map(|(_, id)| Self::File(id.into_owned()));
                }
                None
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    #[serde(default)]
    pub headers: Vec<Header>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub label_ids: Vec<String>,
    /// Milliseconds since the epoch, as a string.
    #[serde(default)]
    pub internal_date: Option<String>,
    #[serde(default)]
    pub payload: Option<Payload>,
}

impl Message {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.payload
            .as_ref()?
            .headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    #[must_use]
    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        let millis = self.internal_date.as_deref()?.parse::<i64>().ok()?;
        DateTime::from_timestamp_millis(millis)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Thread {
    /// A thread stays in the inbox while any message carries `INBOX`.
    #[must_use]
    pub fn in_inbox(&self) -> bool {
        self.messages
            .iter()
            .any(|m| m.label_ids.iter().any(|l| l == "INBOX"))
    }

    /// Subject of the first message.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.messages.first()?.header("Subject")
    }

    #[must_use]
    pub fn web_url(&self) -> String {
        format!("https://mail.google.com/mail/#all/{}", self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct File {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    #[serde(default)]
    pub web_view_link: Option<String>,
    #[serde(default)]
    pub modified_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub trashed: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadList {
    #[serde(default)]
    threads: Vec<ThreadStub>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct ThreadStub {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<File>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// `&pageToken=...` for a follow-up page request.
fn page_param(token: Option<&str>) -> String {
    token.map_or_else(String::new, |token| format!("&pageToken={}", urlencoding::encode(token)))
}

impl RemoteClient {
    async fn google_get(&self, token: &GoogleToken, url: &str) -> Result<reqwest::Response, RemoteError> {
        check_response(
            self.http
                .get(url)
                .bearer_auth(&token.access_token)
                .send()
                .await?,
        )
        .await
    }

    /// Ids of the threads matching a Gmail search (`is:starred`), across
    /// result pages up to the client's page cap.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] if the request fails.
    pub async fn gmail_search_threads(
        &self,
        api_base: &str,
        token: &GoogleToken,
        query: &str,
    ) -> Result<Vec<String>, RemoteError> {
        let mut ids = Vec::new();
        let mut page: Option<String> = None;
        for _ in 0..self.max_pages {
            let url = format!(
                "{}/gmail/v1/users/me/threads?q={}&maxResults=100{}",
                trim_base(api_base),
                urlencoding::encode(query),
                page_param(page.as_deref())
            );
            let data: ThreadList = self.google_get(token, &url).await?.json().await?;
            ids.extend(data.threads.into_iter().map(|t| t.id));
            page = data.next_page_token;
            if page.is_none() {
                return Ok(ids);
            }
        }
        warn_truncated("gmail", self.max_pages);
        Ok(ids)
    }

    /// Fetch one thread with message labels and headers, `None` if deleted.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] if the request fails.
    pub async fn gmail_get_thread(
        &self,
        api_base: &str,
        token: &GoogleToken,
        id: &str,
    ) -> Result<Option<Thread>, RemoteError> {
        let url = format!(
            "{}/gmail/v1/users/me/threads/{}?format=metadata&metadataHeaders=Subject&metadataHeaders=From",
            trim_base(api_base),
            urlencoding::encode(id)
        );
        match found(self.google_get(token, &url).await)? {
            Some(resp) => Ok(Some(resp.json().await?)),
            None => Ok(None),
        }
    }

    /// Run a Drive file search (`'me' in owners and starred`), across
    /// result pages up to the client's page cap.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] if the request fails.
    pub async fn drive_search_files(
        &self,
        api_base: &str,
        token: &GoogleToken,
        query: &str,
    ) -> Result<Vec<File>, RemoteError> {
        let fields = format!("nextPageToken,files({FILE_FIELDS})");
        let mut files = Vec::new();
        let mut page: Option<String> = None;
        for _ in 0..self.max_pages {
            let url = format!(
                "{}/drive/v3/files?q={}&fields={}&pageSize=100{}",
                trim_base(api_base),
                urlencoding::encode(query),
                urlencoding::encode(&fields),
                page_param(page.as_deref())
            );
            let data: FileList = self.google_get(token, &url).await?.json().await?;
            files.extend(data.files);
            page = data.next_page_token;
            if page.is_none() {
                return Ok(files);
            }
        }
        warn_truncated("drive", self.max_pages);
        Ok(files)
    }

    /// Fetch one file's metadata, `None` if it no longer exists.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] if the request fails.
    pub async fn drive_get_file(
        &self,
        api_base: &str,
        token: &GoogleToken,
        id: &str,
    ) -> Result<Option<File>, RemoteError> {
        let url = format!(
            "{}/drive/v3/files/{}?fields={FILE_FIELDS}",
            trim_base(api_base),
            urlencoding::encode(id)
        );
        match found(self.google_get(token, &url).await)? {
            Some(resp) => Ok(Some(resp.json().await?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const THREAD: &str = r#"{
        "id": "18c2f0a1b2c3d4e5",
        "snippet": "Can you review the draft?",
        "messages": [
            {
                "id": "m1",
                "labelIds": ["INBOX", "UNREAD"],
                "internalDate": "1772359200000",
                "payload": {"headers": [
                    {"name": "Subject", "value": "Draft review"},
                    {"name": "From", "value": "Ann <ann@example.org>"}
                ]}
            },
            {"id": "m2", "labelIds": ["SENT"]}
        ]
    }"#;

    #[test]
    fn parse_thread() {
        let thread: Thread = serde_json::from_str(THREAD).unwrap();
        assert!(thread.in_inbox());
        assert_eq!(thread.subject(), Some("Draft review"));
        assert_eq!(thread.messages[0].header("from"), Some("Ann <ann@example.org>"));
        assert!(thread.messages[0].received_at().is_some());
        assert!(thread.messages[1].received_at().is_none());
    }

    #[test]
    fn archived_thread_is_out_of_inbox() {
        let mut thread: Thread = serde_json::from_str(THREAD).unwrap();
        thread.messages[0].label_ids.retain(|l| l != "INBOX");
        assert!(!thread.in_inbox());
    }

    #[test]
    fn parse_file() {
        let file: File = serde_json::from_str(
            r#"{"id": "1AbCdEfGhIjK", "name": "Plan", "mimeType": "application/vnd.google-apps.document",
                "webViewLink": "https://docs.google.com/document/d/1AbCdEfGhIjK/edit",
                "modifiedTime": "2026-03-01T10:00:00.000Z"}"#,
        )
        .unwrap();
        assert!(!file.trashed);
        assert!(file.modified_time.is_some());
    }

    #[rstest]
    #[case("https://mail.google.com/mail/u/0/#inbox/18c2f0a1b2c3d4e5", Some(GoogleRef::Thread("18c2f0a1b2c3d4e5".into())))]
    #[case("https://mail.google.com/mail/#label/Work/18c2f0a1b2c3d4e5", Some(GoogleRef::Thread("18c2f0a1b2c3d4e5".into())))]
    #[case("https://mail.google.com/mail/u/0/#inbox", None)]
    #[case("https://docs.google.com/document/d/1AbCdEfGhIjKlMn/edit", Some(GoogleRef::File("1AbCdEfGhIjKlMn".into())))]
    #[case("https://docs.google.com/spreadsheets/u/1/d/1AbCdEfGhIjKlMn/", Some(GoogleRef::File("1AbCdEfGhIjKlMn".into())))]
    #[case("https://drive.google.com/file/d/1AbCdEfGhIjKlMn/view", Some(GoogleRef::File("1AbCdEfGhIjKlMn".into())))]
    #[case("https://drive.google.com/open?id=1AbCdEfGhIjKlMn", Some(GoogleRef::File("1AbCdEfGhIjKlMn".into())))]
    #[case("https://drive.google.com/drive/folders/1AbCdEfGhIjKlMn", None)]
    #[case("https://example.org/document/d/1AbCdEfGhIjKlMn", None)]
    fn parses_google_urls(#[case] link: &str, #[case] expected: Option<GoogleRef>) {
        assert_eq!(GoogleRef::parse_url(link), expected);
    }
}
