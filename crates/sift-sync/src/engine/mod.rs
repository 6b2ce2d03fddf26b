//! The reconciliation engine.
//!
//! One [`ItemUpdater`] per provider. A cycle runs in two halves:
//!
//! 1. **Remote**: every usable account is fetched concurrently (bounded by
//!    the provider's concurrency cap, every call bounded by its timeout):
//!    list scans, straggler refresh, then per-entity mapping.
//! 2. **Storage**: the fetched state is diffed against the stored shadow
//!    rows and items into one [`Changeset`], committed in a single
//!    transaction.
//!
//! A failing account drops out of the changeset and keeps its stored state.
//! A failing commit leaves nothing behind.

mod fetch;
mod reconcile;
mod report;

pub use report::{AccountFailure, CycleReport, Resolution};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sift_config::ProviderConfig;
use sift_core::due::DueOffset;
use sift_core::entities::{Account, Item, ItemRef, List, ShadowEntity};
use sift_core::enums::Provider;
use sift_db::changeset::{AccountProblem, Changeset};
use sift_db::error::DatabaseError;
use sift_remote::RemoteError;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::adapter::ProviderAdapter;
use crate::error::SyncError;
use crate::scheduler::{RecurringTask, Scheduler};
use crate::store::SyncStore;
use fetch::{AccountFetch, Prepared, bounded, fetch_account, fetch_lists, prepare};
use reconcile::{Stored, reconcile_account};

/// Timing and parallelism of one provider's engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Bound on every provider call.
    pub timeout: Duration,
    /// Accounts fetched at the same time.
    pub concurrency: usize,
    /// Delay between successful cycles.
    pub interval: Duration,
    pub initial_delay: Duration,
    /// Delay after a failed cycle.
    pub retry: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&ProviderConfig::default())
    }
}

impl From<&ProviderConfig> for EngineSettings {
    fn from(config: &ProviderConfig) -> Self {
        Self {
            timeout: config.timeout(),
            concurrency: config.concurrency.max(1),
            interval: config.interval(),
            initial_delay: config.initial_delay(),
            retry: config.retry_delay(),
        }
    }
}

/// Provider-agnostic handle on one provider's engine.
#[async_trait]
pub trait SyncEngine: Send + Sync {
    fn provider(&self) -> Provider;

    /// Run one full reconciliation cycle.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Database`] if storage fails; nothing from the
    /// cycle is written in that case. Provider failures never fail the
    /// cycle; they are reported per account.
    async fn run(&self) -> Result<CycleReport, SyncError>;

    /// Create a list and reconcile its initial content before returning.
    ///
    /// # Errors
    ///
    /// Rejects unusable accounts, invalid due offsets and invalid queries.
    /// Transient provider failures surface as
    /// [`SyncError::TemporarilyUnavailable`].
    async fn add_list(
        &self,
        account_id: &str,
        name: &str,
        query: serde_json::Value,
        due_offset: Option<&str>,
    ) -> Result<List, SyncError>;

    /// Resolve a pasted link to the item tracking it, creating one if the
    /// link points at an untracked entity of one of the user's accounts.
    ///
    /// # Errors
    ///
    /// Transient provider failures surface as
    /// [`SyncError::TemporarilyUnavailable`].
    async fn resolve_url(&self, user_id: &str, url: &str) -> Result<Resolution, SyncError>;

    /// Display URL of a list, where the service has one.
    fn list_url(&self, account: &Account, list: &List) -> Option<String>;

    /// Register this engine's cycle as a recurring task.
    fn start(self: Arc<Self>, scheduler: &Scheduler) -> RecurringTask;
}

/// Stored state of one account, read once at the start of a cycle.
struct AccountState {
    account: Account,
    lists: Vec<List>,
    shadows: Vec<ShadowEntity>,
    items: Vec<Item>,
}

impl AccountState {
    fn stored(&self) -> Stored<'_> {
        Stored {
            account: &self.account,
            lists: &self.lists,
            shadows: &self.shadows,
            items: &self.items,
        }
    }
}

/// The generic reconciliation engine for one provider.
pub struct ItemUpdater<A, S> {
    adapter: Arc<A>,
    store: Arc<S>,
    settings: EngineSettings,
}

impl<A: ProviderAdapter, S: SyncStore> ItemUpdater<A, S> {
    pub fn new(adapter: A, store: Arc<S>, settings: EngineSettings) -> Self {
        Self {
            adapter: Arc::new(adapter),
            store,
            settings,
        }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub const fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Run one cycle and return the delay before the next one.
    pub async fn tick(&self) -> Duration {
        match self.run().await {
            Ok(_) => self.settings.interval,
            Err(e) => {
                tracing::error!(provider = %self.adapter.provider(), error = %e, "sync cycle failed");
                self.settings.retry
            }
        }
    }

    async fn usable_account(&self, account_id: &str) -> Result<Account, SyncError> {
        let account = self.store.account(account_id).await?;
        let expected = self.adapter.provider();
        if account.provider != expected {
            return Err(SyncError::WrongProvider {
                account_id: account.id,
                expected,
                actual: account.provider,
            });
        }
        if let Some(problem) = account.problem {
            return Err(SyncError::AccountUnusable {
                account_id: account.id,
                problem,
            });
        }
        Ok(account)
    }

    /// Turn a provider failure on an on-demand path into the caller's error,
    /// flagging the account if its credentials were rejected.
    async fn surface(&self, account: &Account, error: RemoteError) -> SyncError {
        if error.is_revoked() {
            tracing::warn!(account_id = %account.id, error = %error, "credentials rejected");
            if let Err(e) = self.store.flag_account(&account.id, &error.to_string()).await {
                tracing::error!(account_id = %account.id, error = %e, "failed to flag account");
            }
            return SyncError::Revoked {
                account_id: account.id.clone(),
            };
        }
        if error.is_transient() {
            return SyncError::TemporarilyUnavailable {
                provider: self.adapter.provider(),
                source: error,
            };
        }
        SyncError::Remote(error)
    }

    async fn load_state(&self, account: Account) -> Result<AccountState, DatabaseError> {
        let lists = self.store.lists(&account.id).await?;
        let shadows = self.store.shadows(&account.id).await?;
        let items = self.store.items(&account.id).await?;
        Ok(AccountState {
            account,
            lists,
            shadows,
            items,
        })
    }
}

#[async_trait]
impl<A: ProviderAdapter, S: SyncStore> SyncEngine for ItemUpdater<A, S> {
    fn provider(&self) -> Provider {
        self.adapter.provider()
    }

    async fn run(&self) -> Result<CycleReport, SyncError> {
        let provider = self.adapter.provider();
        let accounts = self.store.accounts(provider, None).await?;
        let mut report = CycleReport::new(provider, accounts.len());

        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency));
        let mut tasks = JoinSet::new();
        let mut states: HashMap<String, Arc<AccountState>> = HashMap::with_capacity(accounts.len());

        for account in accounts {
            let state = Arc::new(self.load_state(account).await?);
            states.insert(state.account.id.clone(), Arc::clone(&state));

            let adapter = Arc::clone(&self.adapter);
            let semaphore = Arc::clone(&semaphore);
            let timeout = self.settings.timeout;
            tasks.spawn(async move {
                let _permit = semaphore.acquire().await;
                let outcome =
                    fetch_account(&*adapter, &state.account, &state.lists, &state.shadows, timeout).await;
                (state.account.id.clone(), outcome)
            });
        }

        let policy = self.adapter.missing_policy();
        let now = Utc::now();
        let mut changeset = Changeset::new(provider);
        let mut pending: HashSet<String> = states.keys().cloned().collect();

        while let Some(joined) = tasks.join_next().await {
            let (account_id, outcome) = match joined {
                Ok(done) => done,
                Err(e) => {
                    tracing::error!(%provider, error = %e, "account task aborted");
                    continue;
                }
            };
            pending.remove(&account_id);
            let Some(state) = states.get(&account_id) else {
                continue;
            };

            match outcome {
                Ok(fetch) => {
                    report.skipped += fetch.skipped;
                    reconcile_account(&mut changeset, &state.stored(), fetch, policy, now);
                }
                Err(e) if e.is_revoked() => {
                    tracing::warn!(%provider, account_id = %account_id, error = %e, "credentials rejected, flagging account");
                    changeset.problems.push(AccountProblem {
                        account_id: account_id.clone(),
                        problem: e.to_string(),
                    });
                    report.flagged.push(account_id);
                }
                Err(e) => {
                    tracing::warn!(%provider, account_id = %account_id, error = %e, "account fetch failed, keeping prior state");
                    report.failed.push(AccountFailure {
                        account_id,
                        reason: e.to_string(),
                    });
                }
            }
        }
        for account_id in pending {
            report.failed.push(AccountFailure {
                account_id,
                reason: "account task aborted".into(),
            });
        }
        report.failed.sort_by(|a, b| a.account_id.cmp(&b.account_id));
        report.flagged.sort();

        let summary = self.store.commit(&changeset).await?;
        report.absorb(&summary);

        tracing::info!(
            %provider,
            accounts = report.accounts,
            failed = report.failed.len(),
            flagged = report.flagged.len(),
            created = report.created,
            updated = report.updated,
            deleted = report.deleted,
            detached = report.detached,
            skipped = report.skipped,
            "sync cycle finished"
        );
        Ok(report)
    }

    async fn add_list(
        &self,
        account_id: &str,
        name: &str,
        query: serde_json::Value,
        due_offset: Option<&str>,
    ) -> Result<List, SyncError> {
        let account = self.usable_account(account_id).await?;
        let due_offset = due_offset.map(str::parse::<DueOffset>).transpose()?;
        self.adapter.validate_query(&query)?;

        let list = List {
            id: self.store.new_list_id().await?,
            account_id: account.id.clone(),
            name: name.to_string(),
            query,
            due_offset,
            created_at: Utc::now(),
        };
        let shadows = self.store.shadows(&account.id).await?;
        let items = self.store.items(&account.id).await?;

        let fetch = match fetch_lists(
            &*self.adapter,
            &account,
            std::slice::from_ref(&list),
            &shadows,
            self.settings.timeout,
        )
        .await
        {
            Ok(fetch) => fetch,
            Err(e) => return Err(self.surface(&account, e).await),
        };

        let mut changeset = Changeset::new(self.adapter.provider());
        changeset.new_lists.push(list.clone());
        let stored = Stored {
            account: &account,
            lists: std::slice::from_ref(&list),
            shadows: &shadows,
            items: &items,
        };
        reconcile_account(&mut changeset, &stored, fetch, self.adapter.missing_policy(), Utc::now());
        let summary = self.store.commit(&changeset).await?;

        tracing::info!(
            provider = %self.adapter.provider(),
            account_id = %account.id,
            list_id = %list.id,
            created = summary.created.len(),
            "list added"
        );
        Ok(list)
    }

    async fn resolve_url(&self, user_id: &str, url: &str) -> Result<Resolution, SyncError> {
        let provider = self.adapter.provider();
        for account in self.store.accounts(provider, Some(user_id)).await? {
            let Some(key) = self.adapter.parse_url(&account, url) else {
                continue;
            };

            if let Some(shadow) = self.store.shadow(provider, &account.id, &key).await? {
                tracing::debug!(%provider, account_id = %account.id, key = %key, "url already tracked");
                return Ok(Resolution::Existing(ItemRef {
                    item_id: shadow.item_id,
                    account_id: account.id,
                    native_key: key,
                }));
            }

            let remote = match bounded(self.settings.timeout, self.adapter.fetch_one(&account, &key)).await {
                Ok(Some(remote)) => remote,
                Ok(None) => continue,
                Err(e) => return Err(self.surface(&account, e).await),
            };
            let (state, params) =
                match prepare(&*self.adapter, &account, &key, &remote, None, self.settings.timeout).await {
                    Ok(prepared) => prepared,
                    Err(SyncError::Remote(e)) => return Err(self.surface(&account, e).await),
                    Err(e) => return Err(e),
                };

            let mut changeset = Changeset::new(provider);
            let fetch = AccountFetch {
                entities: vec![Prepared {
                    key: key.clone(),
                    state,
                    params,
                    lists: Vec::new(),
                }],
                ..AccountFetch::default()
            };
            let stored = Stored {
                account: &account,
                lists: &[],
                shadows: &[],
                items: &[],
            };
            reconcile_account(&mut changeset, &stored, fetch, self.adapter.missing_policy(), Utc::now());
            let summary = self.store.commit(&changeset).await?;

            let created = summary
                .created
                .iter()
                .any(|r| r.account_id == account.id && r.native_key == key);
            let item = match summary.item_for(&account.id, &key) {
                Some(item) => item.clone(),
                None => {
                    let shadow = self
                        .store
                        .shadow(provider, &account.id, &key)
                        .await?
                        .ok_or(DatabaseError::NoResult)?;
                    ItemRef {
                        item_id: shadow.item_id,
                        account_id: account.id.clone(),
                        native_key: key.clone(),
                    }
                }
            };
            tracing::info!(%provider, account_id = %account.id, key = %key, created, "url resolved");
            return Ok(if created {
                Resolution::Created(item)
            } else {
                Resolution::Existing(item)
            });
        }
        Ok(Resolution::NotFound)
    }

    fn list_url(&self, account: &Account, list: &List) -> Option<String> {
        self.adapter.list_url(account, list)
    }

    fn start(self: Arc<Self>, scheduler: &Scheduler) -> RecurringTask {
        let name = format!("sync:{}", self.adapter.provider());
        let initial_delay = self.settings.initial_delay;
        scheduler.queue_recurring_task(name, initial_delay, move || {
            let engine = Arc::clone(&self);
            async move { engine.tick().await }
        })
    }
}
