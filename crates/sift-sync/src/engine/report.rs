use serde::Serialize;
use sift_core::entities::ItemRef;
use sift_core::enums::Provider;
use sift_db::changeset::CommitSummary;

/// An account whose remote half failed this cycle. Its stored state is
/// untouched and it is retried next cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountFailure {
    pub account_id: String,
    pub reason: String,
}

/// Outcome of one reconciliation cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub provider: Provider,
    pub accounts: usize,
    pub failed: Vec<AccountFailure>,
    /// Accounts whose credentials were rejected and are now flagged.
    pub flagged: Vec<String>,
    /// Entities dropped this cycle because they could not be mapped.
    pub skipped: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub deleted: usize,
    pub detached: usize,
    pub memberships: usize,
    /// Rows written by the commit.
    pub writes: usize,
}

impl CycleReport {
    pub(crate) const fn new(provider: Provider, accounts: usize) -> Self {
        Self {
            provider,
            accounts,
            failed: Vec::new(),
            flagged: Vec::new(),
            skipped: 0,
            created: 0,
            updated: 0,
            unchanged: 0,
            deleted: 0,
            detached: 0,
            memberships: 0,
            writes: 0,
        }
    }

    pub(crate) fn absorb(&mut self, summary: &CommitSummary) {
        self.created = summary.created.len();
        self.updated = summary.updated.len();
        self.unchanged = summary.unchanged;
        self.deleted = summary.deleted;
        self.detached = summary.detached;
        self.memberships = summary.memberships_written;
        self.writes = summary.writes();
    }
}

/// Outcome of resolving a pasted URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "item", rename_all = "snake_case")]
pub enum Resolution {
    /// The entity was already tracked; its item is returned unchanged.
    Existing(ItemRef),
    /// The entity was fetched and a new item created for it.
    Created(ItemRef),
    /// The URL does not point at any of the user's accounts.
    NotFound,
}

impl Resolution {
    #[must_use]
    pub const fn item(&self) -> Option<&ItemRef> {
        match self {
            Self::Existing(item) | Self::Created(item) => Some(item),
            Self::NotFound => None,
        }
    }
}
