//! Provider adapters and the helpers they share.

pub mod bugzilla;
pub mod github;
pub mod google;
pub mod jira;

pub use bugzilla::BugzillaAdapter;
pub use github::GithubAdapter;
pub use google::{GoogleAdapter, GoogleRemote};
pub use jira::JiraAdapter;

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use sift_core::entities::{Account, List};
use sift_remote::RemoteError;

use crate::error::SyncError;

/// Decode the account's credential blob. A blob that does not fit counts
/// as rejected credentials.
pub(crate) fn credentials<T: DeserializeOwned>(account: &Account) -> Result<T, RemoteError> {
    account
        .credentials()
        .map_err(|e| RemoteError::InvalidCredentials(e.to_string()))
}

/// A non-empty string field of a list query.
pub(crate) fn query_field<'a>(query: &'a serde_json::Value, field: &str) -> Option<&'a str> {
    query
        .get(field)
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

pub(crate) fn require_query_field(query: &serde_json::Value, field: &str) -> Result<(), SyncError> {
    query_field(query, field)
        .map(|_| ())
        .ok_or_else(|| SyncError::InvalidQuery(format!("expected a non-empty string field '{field}'")))
}

/// The query field a stored list runs with.
pub(crate) fn list_query<'a>(list: &'a List, field: &str) -> Result<&'a str, RemoteError> {
    query_field(&list.query, field)
        .ok_or_else(|| RemoteError::Parse(format!("list {} has no '{field}' in its query", list.id)))
}

/// A remote due date, due at the end of that day (UTC).
pub(crate) fn end_of_day(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(23, 59, 59).map(|end| end.and_utc())
}
