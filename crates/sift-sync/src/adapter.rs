//! The capability interface every provider plugs into the engine.

use async_trait::async_trait;
use sift_core::entities::{Account, EntityState, ItemParams, List, ShadowEntity};
use sift_core::enums::{MissingPolicy, Provider};
use sift_remote::RemoteError;

use crate::error::SyncError;

/// Provider-specific half of the reconciliation engine.
///
/// The engine owns the cycle; an adapter only knows how to talk to its
/// service and how to map one remote entity onto a core item.
#[async_trait]
pub trait ProviderAdapter: Send + Sync + 'static {
    /// One decoded API result. Lives only for the duration of a pass.
    type Remote: Send + Sync + 'static;

    fn provider(&self) -> Provider;

    /// What happens to a tracked item whose remote entity is gone.
    fn missing_policy(&self) -> MissingPolicy;

    /// The provider-native identity of a remote entity, unique per account.
    /// `None` if the payload carries no usable identity.
    fn native_key(&self, remote: &Self::Remote) -> Option<String>;

    /// Current remote membership of one saved list, in display order.
    async fn list_items(&self, account: &Account, list: &List) -> Result<Vec<Self::Remote>, RemoteError>;

    /// Fetch the given keys, in bulk where the service allows it. Keys
    /// absent from the result are confirmed gone upstream.
    async fn refresh(&self, account: &Account, keys: &[String]) -> Result<Vec<Self::Remote>, RemoteError>;

    /// Fetch one key, `None` if it does not exist.
    async fn fetch_one(&self, account: &Account, key: &str) -> Result<Option<Self::Remote>, RemoteError> {
        let remotes = self.refresh(account, &[key.to_string()]).await?;
        Ok(remotes
            .into_iter()
            .find(|remote| self.native_key(remote).as_deref() == Some(key)))
    }

    /// The memoized state of an entity.
    ///
    /// `previous` is the stored shadow, if the key is already tracked; its
    /// memoized fields should be reused instead of recomputed.
    async fn entity_for_remote(
        &self,
        account: &Account,
        remote: &Self::Remote,
        previous: Option<&ShadowEntity>,
    ) -> Result<EntityState, RemoteError>;

    /// Map a remote entity onto the synced fields of its core item.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Mapping`] if the payload is unusable.
    fn params_for_remote(
        &self,
        account: &Account,
        remote: &Self::Remote,
        state: &EntityState,
    ) -> Result<ItemParams, SyncError>;

    /// Extract a native key from a pasted link, if it points at this account.
    fn parse_url(&self, account: &Account, url: &str) -> Option<String>;

    /// Web URL showing the list's query, where the service has one.
    fn list_url(&self, account: &Account, list: &List) -> Option<String>;

    /// Reject query specs this provider cannot run.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidQuery`] describing the problem.
    fn validate_query(&self, query: &serde_json::Value) -> Result<(), SyncError>;
}
