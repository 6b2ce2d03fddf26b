//! # sift-remote
//!
//! Provider HTTP clients for sift.
//!
//! Thin, authenticated wrappers over the upstream APIs the sync engine reads:
//! - Bugzilla REST (search, bulk get by id, bug history)
//! - GitHub REST (issue search, single issue)
//! - Jira REST (JQL search, bulk get by key)
//! - Google Gmail threads and Drive files
//!
//! Each module also carries the URL matcher that recognises a pasted link as
//! one of that provider's entities.

pub mod bugzilla;
pub mod github;
pub mod google;
pub mod jira;

mod error;
mod http;

pub use error::RemoteError;

use std::time::Duration;

/// Result pages followed by a search unless overridden.
pub const DEFAULT_MAX_PAGES: u32 = 10;

/// HTTP client shared by every provider.
#[derive(Clone)]
pub struct RemoteClient {
    http: reqwest::Client,
    max_pages: u32,
}

impl Default for RemoteClient {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl RemoteClient {
    /// Create a client whose requests give up after `timeout`.
    ///
    /// # Panics
    ///
    /// Panics if the underlying `reqwest::Client` fails to build.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::builder()
                .user_agent(concat!("sift/", env!("CARGO_PKG_VERSION")))
                .timeout(timeout)
                .build()
                .expect("reqwest client should build"),
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Cap the result pages a search follows. Results past the cap are
    /// dropped with a warning.
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    #[must_use]
    pub const fn max_pages(&self) -> u32 {
        self.max_pages
    }
}

/// Log a search that still had pages left when the cap was reached.
pub(crate) fn warn_truncated(provider: &str, max_pages: u32) {
    tracing::warn!(provider, max_pages, "search has more results than the page cap; the rest are ignored");
}

/// Strip a trailing slash so paths can be appended with `format!`.
pub(crate) fn trim_base(base: &str) -> &str {
    base.trim_end_matches('/')
}
