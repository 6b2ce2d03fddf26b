//! The persistence seam of the engine.

use async_trait::async_trait;
use sift_core::entities::{Account, Item, List, ShadowEntity};
use sift_core::enums::Provider;
use sift_core::ids::PREFIX_LIST;
use sift_db::SiftDb;
use sift_db::changeset::{Changeset, CommitSummary};
use sift_db::error::DatabaseError;
use sift_db::repos::account::AccountFilter;

/// Everything the engine reads from storage, plus the single transactional
/// write of a pass.
#[async_trait]
pub trait SyncStore: Send + Sync + 'static {
    /// Usable accounts of one provider, optionally restricted to one user.
    async fn accounts(&self, provider: Provider, user_id: Option<&str>) -> Result<Vec<Account>, DatabaseError>;

    async fn account(&self, id: &str) -> Result<Account, DatabaseError>;

    async fn lists(&self, account_id: &str) -> Result<Vec<List>, DatabaseError>;

    async fn shadows(&self, account_id: &str) -> Result<Vec<ShadowEntity>, DatabaseError>;

    async fn shadow(
        &self,
        provider: Provider,
        account_id: &str,
        native_key: &str,
    ) -> Result<Option<ShadowEntity>, DatabaseError>;

    /// Core items controlled by the account's shadow entities.
    async fn items(&self, account_id: &str) -> Result<Vec<Item>, DatabaseError>;

    async fn new_list_id(&self) -> Result<String, DatabaseError>;

    async fn flag_account(&self, account_id: &str, problem: &str) -> Result<(), DatabaseError>;

    /// Apply one pass atomically.
    async fn commit(&self, changeset: &Changeset) -> Result<CommitSummary, DatabaseError>;
}

#[async_trait]
impl SyncStore for SiftDb {
    async fn accounts(&self, provider: Provider, user_id: Option<&str>) -> Result<Vec<Account>, DatabaseError> {
        self.list_accounts(&AccountFilter {
            provider: Some(provider),
            user_id: user_id.map(str::to_string),
            usable_only: true,
        })
        .await
    }

    async fn account(&self, id: &str) -> Result<Account, DatabaseError> {
        self.get_account(id).await
    }

    async fn lists(&self, account_id: &str) -> Result<Vec<List>, DatabaseError> {
        self.lists_for_account(account_id).await
    }

    async fn shadows(&self, account_id: &str) -> Result<Vec<ShadowEntity>, DatabaseError> {
        self.shadows_for_account(account_id).await
    }

    async fn shadow(
        &self,
        provider: Provider,
        account_id: &str,
        native_key: &str,
    ) -> Result<Option<ShadowEntity>, DatabaseError> {
        self.find_shadow(provider, account_id, native_key).await
    }

    async fn items(&self, account_id: &str) -> Result<Vec<Item>, DatabaseError> {
        self.items_for_account(account_id).await
    }

    async fn new_list_id(&self) -> Result<String, DatabaseError> {
        self.generate_id(PREFIX_LIST).await
    }

    async fn flag_account(&self, account_id: &str, problem: &str) -> Result<(), DatabaseError> {
        self.set_account_problem(account_id, Some(problem)).await
    }

    async fn commit(&self, changeset: &Changeset) -> Result<CommitSummary, DatabaseError> {
        self.apply_changeset(changeset).await
    }
}
