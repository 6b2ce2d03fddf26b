//! A scripted provider for engine tests.
//!
//! Each account (by `external_id`) owns a universe of entities and a set of
//! saved searches; a list's query `{"query": "<name>"}` picks the search.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use sift_core::entities::{Account, AccountDisplay, EntityState, ItemParams, List, ShadowEntity};
use sift_core::enums::{MissingPolicy, Provider};
use sift_db::SiftDb;
use sift_db::repos::account::NewAccount;
use sift_remote::RemoteError;
use sift_sync::{EngineSettings, ItemUpdater, ProviderAdapter, SyncError};

pub const USER: &str = "user-1";

#[derive(Debug, Clone)]
pub struct FakeRemote {
    pub key: String,
    pub summary: String,
    pub done: bool,
    pub due: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Transient,
    Revoked,
    Slow,
}

#[derive(Default)]
struct World {
    entities: HashMap<(String, String), FakeRemote>,
    searches: HashMap<(String, String), Vec<String>>,
    failures: HashMap<String, Failure>,
}

#[derive(Default)]
pub struct Calls {
    pub list_items: AtomicUsize,
    pub refresh: AtomicUsize,
    pub fetch_one: AtomicUsize,
    pub done_detections: AtomicUsize,
}

impl Calls {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// Handle the test keeps to script the remote side while the engine owns
/// the adapter.
#[derive(Clone, Default)]
pub struct Remote {
    world: Arc<Mutex<World>>,
    pub calls: Arc<Calls>,
}

impl Remote {
    pub fn put(&self, account: &str, key: &str, summary: &str) {
        self.world.lock().unwrap().entities.insert(
            (account.into(), key.into()),
            FakeRemote {
                key: key.into(),
                summary: summary.into(),
                done: false,
                due: None,
            },
        );
    }

    pub fn edit(&self, account: &str, key: &str, edit: impl FnOnce(&mut FakeRemote)) {
        let mut world = self.world.lock().unwrap();
        edit(world.entities.get_mut(&(account.into(), key.into())).unwrap());
    }

    pub fn remove(&self, account: &str, key: &str) {
        self.world
            .lock()
            .unwrap()
            .entities
            .remove(&(account.into(), key.into()));
    }

    pub fn search(&self, account: &str, name: &str, keys: &[&str]) {
        self.world.lock().unwrap().searches.insert(
            (account.into(), name.into()),
            keys.iter().map(|k| (*k).to_string()).collect(),
        );
    }

    pub fn fail(&self, account: &str, failure: Failure) {
        self.world
            .lock()
            .unwrap()
            .failures
            .insert(account.into(), failure);
    }

    pub fn heal(&self, account: &str) {
        self.world.lock().unwrap().failures.remove(account);
    }

    async fn check(&self, account: &Account) -> Result<(), RemoteError> {
        let failure = self.world.lock().unwrap().failures.get(&account.external_id).copied();
        match failure {
            None => Ok(()),
            Some(Failure::Transient) => Err(RemoteError::Api {
                status: 503,
                message: "unavailable".into(),
            }),
            Some(Failure::Revoked) => Err(RemoteError::Unauthorized {
                status: 401,
                message: "token revoked".into(),
            }),
            Some(Failure::Slow) => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            }
        }
    }

    fn lookup(&self, account: &Account, key: &str) -> Option<FakeRemote> {
        self.world
            .lock()
            .unwrap()
            .entities
            .get(&(account.external_id.clone(), key.to_string()))
            .cloned()
    }
}

pub struct FakeAdapter {
    pub remote: Remote,
    pub policy: MissingPolicy,
}

#[async_trait]
impl ProviderAdapter for FakeAdapter {
    type Remote = FakeRemote;

    fn provider(&self) -> Provider {
        Provider::Jira
    }

    fn missing_policy(&self) -> MissingPolicy {
        self.policy
    }

    fn native_key(&self, remote: &FakeRemote) -> Option<String> {
        Some(remote.key.clone())
    }

    async fn list_items(&self, account: &Account, list: &List) -> Result<Vec<FakeRemote>, RemoteError> {
        self.remote.calls.list_items.fetch_add(1, Ordering::SeqCst);
        self.remote.check(account).await?;
        let name = list.query["query"].as_str().unwrap_or_default().to_string();
        let keys = self
            .remote
            .world
            .lock()
            .unwrap()
            .searches
            .get(&(account.external_id.clone(), name))
            .cloned()
            .unwrap_or_default();
        Ok(keys
            .iter()
            .filter_map(|key| self.remote.lookup(account, key))
            .collect())
    }

    async fn refresh(&self, account: &Account, keys: &[String]) -> Result<Vec<FakeRemote>, RemoteError> {
        self.remote.calls.refresh.fetch_add(1, Ordering::SeqCst);
        self.remote.check(account).await?;
        Ok(keys.iter().filter_map(|key| self.remote.lookup(account, key)).collect())
    }

    async fn fetch_one(&self, account: &Account, key: &str) -> Result<Option<FakeRemote>, RemoteError> {
        self.remote.calls.fetch_one.fetch_add(1, Ordering::SeqCst);
        self.remote.check(account).await?;
        Ok(self.remote.lookup(account, key))
    }

    async fn entity_for_remote(
        &self,
        _account: &Account,
        remote: &FakeRemote,
        previous: Option<&ShadowEntity>,
    ) -> Result<EntityState, RemoteError> {
        if let Some(shadow) = previous.filter(|shadow| shadow.done_at.is_some()) {
            return Ok(shadow.state());
        }
        if !remote.done {
            return Ok(EntityState::default());
        }
        self.remote.calls.done_detections.fetch_add(1, Ordering::SeqCst);
        Ok(EntityState {
            done_at: Some(Utc::now()),
            memo: json!({"detected": true}),
        })
    }

    fn params_for_remote(
        &self,
        account: &Account,
        remote: &FakeRemote,
        state: &EntityState,
    ) -> Result<ItemParams, SyncError> {
        Ok(ItemParams {
            summary: remote.summary.clone(),
            fields: json!({"status": if remote.done { "closed" } else { "open" }}),
            due: remote.due,
            done: if remote.done { state.done_at } else { None },
            url: Some(format!("fake://{}/{}", account.external_id, remote.key)),
        })
    }

    fn parse_url(&self, account: &Account, url: &str) -> Option<String> {
        let (external_id, key) = url.strip_prefix("fake://")?.split_once('/')?;
        (external_id == account.external_id).then(|| key.to_string())
    }

    fn list_url(&self, account: &Account, list: &List) -> Option<String> {
        Some(format!("fake://{}/search/{}", account.external_id, list.id))
    }

    fn validate_query(&self, query: &serde_json::Value) -> Result<(), SyncError> {
        match query.get("query").and_then(serde_json::Value::as_str) {
            Some(name) if !name.is_empty() => Ok(()),
            _ => Err(SyncError::InvalidQuery("missing 'query'".into())),
        }
    }
}

pub type Engine = ItemUpdater<FakeAdapter, SiftDb>;

pub struct Harness {
    pub db: Arc<SiftDb>,
    pub remote: Remote,
    pub engine: Engine,
}

pub fn settings() -> EngineSettings {
    EngineSettings {
        timeout: Duration::from_millis(200),
        concurrency: 2,
        initial_delay: Duration::ZERO,
        ..EngineSettings::default()
    }
}

pub async fn harness(policy: MissingPolicy) -> Harness {
    let db = Arc::new(SiftDb::open_local(":memory:").await.unwrap());
    let remote = Remote::default();
    let adapter = FakeAdapter {
        remote: remote.clone(),
        policy,
    };
    let engine = ItemUpdater::new(adapter, Arc::clone(&db), settings());
    Harness { db, remote, engine }
}

impl Harness {
    pub async fn account(&self, external_id: &str) -> Account {
        self.db
            .create_account(NewAccount {
                provider: Provider::Jira,
                user_id: USER.into(),
                external_id: external_id.into(),
                credentials: json!({}),
                display: AccountDisplay::default(),
            })
            .await
            .unwrap()
    }

    pub async fn list(&self, account: &Account, search: &str, due_offset: Option<&str>) -> List {
        self.db
            .create_list(
                &account.id,
                search,
                json!({"query": search}),
                due_offset.map(|rule| rule.parse().unwrap()),
            )
            .await
            .unwrap()
    }

    /// Shadow keys of an account, sorted.
    pub async fn keys(&self, account: &Account) -> Vec<String> {
        let mut keys: Vec<String> = self
            .db
            .shadows_for_account(&account.id)
            .await
            .unwrap()
            .into_iter()
            .map(|shadow| shadow.native_key)
            .collect();
        keys.sort();
        keys
    }

    pub async fn shadow(&self, account: &Account, key: &str) -> ShadowEntity {
        self.db
            .find_shadow(Provider::Jira, &account.id, key)
            .await
            .unwrap()
            .unwrap_or_else(|| panic!("no shadow for {key}"))
    }

    /// Every distinct item id across the user's items.
    pub async fn item_ids(&self) -> HashSet<String> {
        self.db
            .list_items_for_user(USER, 1000)
            .await
            .unwrap()
            .into_iter()
            .map(|item| item.id)
            .collect()
    }
}
