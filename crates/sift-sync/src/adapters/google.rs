//! Google: Gmail threads and Drive files under one account.
//!
//! A list picks its backend with `kind`:
//! `{"kind": "mail", "query": "is:starred"}` or
//! `{"kind": "drive", "query": "starred = true"}`.
//! Keys are prefixed with the kind (`thread:<id>`, `file:<id>`).

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use sift_core::entities::{Account, EntityState, ItemParams, List, ShadowEntity};
use sift_core::enums::{MissingPolicy, Provider};
use sift_remote::google::{DEFAULT_API_BASE, File, GoogleRef, GoogleToken, Thread};
use sift_remote::{RemoteClient, RemoteError};

use super::{credentials, list_query, query_field, require_query_field};
use crate::adapter::ProviderAdapter;
use crate::error::SyncError;

const THREAD_PREFIX: &str = "thread";
const FILE_PREFIX: &str = "file";

/// A Gmail thread or a Drive file.
#[derive(Debug, Clone)]
pub enum GoogleRemote {
    Thread(Thread),
    File(File),
}

pub struct GoogleAdapter {
    client: RemoteClient,
    api_base: String,
}

impl GoogleAdapter {
    #[must_use]
    pub fn new(client: RemoteClient, api_base: Option<&str>) -> Self {
        Self {
            client,
            api_base: api_base.unwrap_or(DEFAULT_API_BASE).to_string(),
        }
    }

    async fn threads(&self, token: &GoogleToken, ids: &[&str]) -> Result<Vec<GoogleRemote>, RemoteError> {
        let mut threads = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(thread) = self.client.gmail_get_thread(&self.api_base, token, id).await? {
                threads.push(GoogleRemote::Thread(thread));
            }
        }
        Ok(threads)
    }
}

fn ref_key(google_ref: &GoogleRef) -> String {
    match google_ref {
        GoogleRef::Thread(id) => format!("{THREAD_PREFIX}:{id}"),
        GoogleRef::File(id) => format!("{FILE_PREFIX}:{id}"),
    }
}

fn is_kind(kind: &str) -> bool {
    matches!(kind, "mail" | "drive")
}

#[async_trait]
impl ProviderAdapter for GoogleAdapter {
    type Remote = GoogleRemote;

    fn provider(&self) -> Provider {
        Provider::Google
    }

    /// Starred mail and files come and go; the item outlives the link.
    fn missing_policy(&self) -> MissingPolicy {
        MissingPolicy::Detach
    }

    fn native_key(&self, remote: &GoogleRemote) -> Option<String> {
        let key = match remote {
            GoogleRemote::Thread(thread) => ref_key(&GoogleRef::Thread(thread.id.clone())),
            GoogleRemote::File(file) => ref_key(&GoogleRef::File(file.id.clone())),
        };
        Some(key)
    }

    async fn list_items(&self, account: &Account, list: &List) -> Result<Vec<GoogleRemote>, RemoteError> {
        let token: GoogleToken = credentials(account)?;
        let query = list_query(list, "query")?;
        match list_query(list, "kind")? {
            "mail" => {
                let ids = self
                    .client
                    .gmail_search_threads(&self.api_base, &token, query)
                    .await?;
                let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
                self.threads(&token, &ids).await
            }
            "drive" => Ok(self
                .client
                .drive_search_files(&self.api_base, &token, query)
                .await?
                .into_iter()
                .filter(|file| !file.trashed)
                .map(GoogleRemote::File)
                .collect()),
            other => Err(RemoteError::Parse(format!(
                "list {} has unknown kind '{other}'",
                list.id
            ))),
        }
    }

    /// Trashed files count as gone.
    async fn refresh(&self, account: &Account, keys: &[String]) -> Result<Vec<GoogleRemote>, RemoteError> {
        let token: GoogleToken = credentials(account)?;
        let mut remotes = Vec::with_capacity(keys.len());
        for key in keys {
            match key.split_once(':') {
                Some((THREAD_PREFIX, id)) => remotes.extend(self.threads(&token, &[id]).await?),
                Some((FILE_PREFIX, id)) => {
                    let file = self.client.drive_get_file(&self.api_base, &token, id).await?;
                    remotes.extend(file.filter(|f| !f.trashed).map(GoogleRemote::File));
                }
                _ => tracing::warn!(account_id = %account.id, key, "unrecognised google key"),
            }
        }
        Ok(remotes)
    }

    async fn entity_for_remote(
        &self,
        _account: &Account,
        remote: &GoogleRemote,
        previous: Option<&ShadowEntity>,
    ) -> Result<EntityState, RemoteError> {
        let done_at = match remote {
            // Gmail has no archive timestamp; the first cycle that sees the
            // thread out of the inbox fixes it.
            GoogleRemote::Thread(thread) => previous
                .and_then(|shadow| shadow.done_at)
                .or_else(|| (!thread.in_inbox()).then(Utc::now)),
            GoogleRemote::File(_) => None,
        };
        Ok(EntityState {
            done_at,
            ..EntityState::default()
        })
    }

    fn params_for_remote(
        &self,
        _account: &Account,
        remote: &GoogleRemote,
        state: &EntityState,
    ) -> Result<ItemParams, SyncError> {
        match remote {
            GoogleRemote::Thread(thread) => {
                let summary = thread
                    .subject()
                    .map(str::trim)
                    .filter(|subject| !subject.is_empty())
                    .unwrap_or_else(|| thread.snippet.trim());
                let from = thread.messages.first().and_then(|m| m.header("From"));
                Ok(ItemParams {
                    summary: summary.to_string(),
                    fields: json!({
                        "kind": "mail",
                        "from": from,
                        "messages": thread.messages.len(),
                    }),
                    due: None,
                    done: if thread.in_inbox() { None } else { state.done_at },
                    url: Some(thread.web_url()),
                })
            }
            GoogleRemote::File(file) => Ok(ItemParams {
                summary: file.name.clone(),
                fields: json!({
                    "kind": "drive",
                    "mime_type": file.mime_type,
                }),
                due: None,
                done: None,
                url: Some(
                    file.web_view_link
                        .clone()
                        .unwrap_or_else(|| format!("https://drive.google.com/open?id={}", file.id)),
                ),
            }),
        }
    }

    fn parse_url(&self, _account: &Account, url: &str) -> Option<String> {
        GoogleRef::parse_url(url).map(|google_ref| ref_key(&google_ref))
    }

    fn list_url(&self, _account: &Account, list: &List) -> Option<String> {
        let query = urlencoding::encode(query_field(&list.query, "query")?);
        match query_field(&list.query, "kind")? {
            "mail" => Some(format!("https://mail.google.com/mail/#search/{query}")),
            "drive" => Some(format!("https://drive.google.com/drive/search?q={query}")),
            _ => None,
        }
    }

    fn validate_query(&self, query: &serde_json::Value) -> Result<(), SyncError> {
        require_query_field(query, "query")?;
        match query_field(query, "kind") {
            Some(kind) if is_kind(kind) => Ok(()),
            _ => Err(SyncError::InvalidQuery(
                "expected 'kind' to be \"mail\" or \"drive\"".to_string(),
            )),
        }
    }
}
