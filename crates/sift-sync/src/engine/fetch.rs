//! Remote half of a pass: everything that talks to the provider for one
//! account. Runs concurrently across accounts; never touches storage.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::time::Duration;

use sift_core::entities::{Account, EntityState, ItemParams, List, ShadowEntity};
use sift_remote::RemoteError;

use crate::adapter::ProviderAdapter;
use crate::error::SyncError;

/// Bound one provider call by `timeout`.
pub(crate) async fn bounded<T>(
    timeout: Duration,
    call: impl Future<Output = Result<T, RemoteError>>,
) -> Result<T, RemoteError> {
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| RemoteError::Timeout {
            secs: timeout.as_secs(),
        })?
}

/// One remote entity, mapped and ready to be diffed against storage.
#[derive(Debug)]
pub(crate) struct Prepared {
    pub key: String,
    pub state: EntityState,
    pub params: ItemParams,
    /// Ids of the lists that returned this key this pass, in scan order.
    pub lists: Vec<String>,
}

/// The result of the remote half of a pass for one account.
#[derive(Debug, Default)]
pub(crate) struct AccountFetch {
    pub entities: Vec<Prepared>,
    /// Per-list ordered keys, for every list that was scanned.
    pub memberships: Vec<(String, Vec<String>)>,
    /// Stragglers the provider confirmed gone.
    pub missing: Vec<String>,
    /// Entities dropped this pass because they could not be mapped.
    pub skipped: usize,
}

/// A remote entity seen this pass, before mapping.
struct Seen<R> {
    remote: R,
    lists: Vec<String>,
}

/// Remote entities gathered for one account, de-duplicated by key.
struct Scan<R> {
    order: Vec<String>,
    seen: HashMap<String, Seen<R>>,
    memberships: Vec<(String, Vec<String>)>,
    skipped: usize,
}

impl<R> Scan<R> {
    fn insert(&mut self, key: String, remote: R, list_id: Option<&str>) {
        match self.seen.get_mut(&key) {
            Some(entry) => entry.lists.extend(list_id.map(str::to_string)),
            None => {
                self.order.push(key.clone());
                self.seen.insert(
                    key,
                    Seen {
                        remote,
                        lists: list_id.map(str::to_string).into_iter().collect(),
                    },
                );
            }
        }
    }
}

async fn scan_lists<A: ProviderAdapter>(
    adapter: &A,
    account: &Account,
    lists: &[List],
    timeout: Duration,
) -> Result<Scan<A::Remote>, RemoteError> {
    let mut scan = Scan {
        order: Vec::new(),
        seen: HashMap::new(),
        memberships: Vec::with_capacity(lists.len()),
        skipped: 0,
    };
    for list in lists {
        let remotes = bounded(timeout, adapter.list_items(account, list)).await?;
        let mut keys: Vec<String> = Vec::with_capacity(remotes.len());
        for remote in remotes {
            let Some(key) = adapter.native_key(&remote) else {
                tracing::warn!(account_id = %account.id, list_id = %list.id, "remote entity without a key");
                scan.skipped += 1;
                continue;
            };
            if keys.contains(&key) {
                continue;
            }
            keys.push(key.clone());
            scan.insert(key, remote, Some(&list.id));
        }
        scan.memberships.push((list.id.clone(), keys));
    }
    Ok(scan)
}

/// Refresh tracked keys the list scan did not reconfirm. Returns the keys
/// the provider confirmed gone.
async fn refresh_stragglers<A: ProviderAdapter>(
    adapter: &A,
    account: &Account,
    shadows: &[ShadowEntity],
    scan: &mut Scan<A::Remote>,
    timeout: Duration,
) -> Result<Vec<String>, RemoteError> {
    let stale: Vec<String> = shadows
        .iter()
        .map(|shadow| shadow.native_key.clone())
        .filter(|key| !scan.seen.contains_key(key))
        .collect();
    if stale.is_empty() {
        return Ok(Vec::new());
    }

    let refreshed = bounded(timeout, adapter.refresh(account, &stale)).await?;
    let wanted: HashSet<&str> = stale.iter().map(String::as_str).collect();
    for remote in refreshed {
        if let Some(key) = adapter.native_key(&remote)
            && wanted.contains(key.as_str())
        {
            scan.insert(key, remote, None);
        }
    }
    tracing::debug!(
        account_id = %account.id,
        stale = stale.len(),
        "refreshed stragglers"
    );
    Ok(stale
        .into_iter()
        .filter(|key| !scan.seen.contains_key(key))
        .collect())
}

/// Map every scanned entity. Mapping failures skip the entity; rejected
/// credentials abort the account.
async fn map_entities<A: ProviderAdapter>(
    adapter: &A,
    account: &Account,
    shadows: &[ShadowEntity],
    mut scan: Scan<A::Remote>,
    timeout: Duration,
) -> Result<AccountFetch, RemoteError> {
    let previous: HashMap<&str, &ShadowEntity> = shadows
        .iter()
        .map(|shadow| (shadow.native_key.as_str(), shadow))
        .collect();
    let mut fetch = AccountFetch {
        memberships: std::mem::take(&mut scan.memberships),
        skipped: scan.skipped,
        ..AccountFetch::default()
    };

    for key in scan.order {
        let Some(entry) = scan.seen.remove(&key) else {
            continue;
        };
        let prior = previous.get(key.as_str()).copied();
        match prepare(adapter, account, &key, &entry.remote, prior, timeout).await {
            Ok((state, params)) => fetch.entities.push(Prepared {
                key,
                state,
                params,
                lists: entry.lists,
            }),
            Err(SyncError::Remote(e)) if e.is_revoked() => return Err(e),
            Err(e) => {
                tracing::warn!(account_id = %account.id, key = %key, error = %e, "skipping remote entity");
                fetch.skipped += 1;
            }
        }
    }
    Ok(fetch)
}

/// Scan every list of one account, refresh the stragglers, then map every
/// entity seen.
///
/// Any provider failure aborts the whole account so its stored state is
/// left as it was.
pub(crate) async fn fetch_account<A: ProviderAdapter>(
    adapter: &A,
    account: &Account,
    lists: &[List],
    shadows: &[ShadowEntity],
    timeout: Duration,
) -> Result<AccountFetch, RemoteError> {
    let mut scan = scan_lists(adapter, account, lists, timeout).await?;
    let missing = refresh_stragglers(adapter, account, shadows, &mut scan, timeout).await?;
    let mut fetch = map_entities(adapter, account, shadows, scan, timeout).await?;
    fetch.missing = missing;
    Ok(fetch)
}

/// Scan and map only the given lists. Tracked keys outside them are left
/// alone.
pub(crate) async fn fetch_lists<A: ProviderAdapter>(
    adapter: &A,
    account: &Account,
    lists: &[List],
    shadows: &[ShadowEntity],
    timeout: Duration,
) -> Result<AccountFetch, RemoteError> {
    let scan = scan_lists(adapter, account, lists, timeout).await?;
    map_entities(adapter, account, shadows, scan, timeout).await
}

/// `entity_for_remote` then `params_for_remote` for one entity.
///
/// A done timestamp already memoized on the stored shadow always wins over
/// whatever the adapter computed.
pub(crate) async fn prepare<A: ProviderAdapter>(
    adapter: &A,
    account: &Account,
    key: &str,
    remote: &A::Remote,
    previous: Option<&ShadowEntity>,
    timeout: Duration,
) -> Result<(EntityState, ItemParams), SyncError> {
    let mut state = bounded(timeout, adapter.entity_for_remote(account, remote, previous)).await?;
    if let Some(done_at) = previous.and_then(|shadow| shadow.done_at) {
        state.done_at = Some(done_at);
    }
    let params = adapter.params_for_remote(account, remote, &state)?;
    if params.summary.trim().is_empty() {
        return Err(SyncError::mapping(key, "empty summary"));
    }
    Ok((state, params))
}
