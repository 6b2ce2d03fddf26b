//! # sift-sync
//!
//! Keeps core items in step with the remote services users connect.
//!
//! Every provider runs the same [`ItemUpdater`] cycle over its own
//! [`ProviderAdapter`]: fetch each account's saved lists, refresh tracked
//! entities that fell out of them, diff against the stored shadows and
//! commit the difference in one transaction. The [`Scheduler`] re-runs each
//! provider's cycle on its configured interval.

pub mod adapter;
pub mod adapters;
mod engine;
pub mod error;
pub mod scheduler;
pub mod store;

pub use adapter::ProviderAdapter;
pub use engine::{AccountFailure, CycleReport, EngineSettings, ItemUpdater, Resolution, SyncEngine};
pub use error::SyncError;
pub use scheduler::{RecurringTask, Scheduler};
pub use store::SyncStore;

use std::sync::Arc;

use sift_config::{ProviderConfig, ProvidersConfig};
use sift_core::enums::Provider;
use sift_remote::RemoteClient;

use adapters::{BugzillaAdapter, GithubAdapter, GoogleAdapter, JiraAdapter};

/// Build the engine of one provider from its configuration.
pub fn engine_for<S: SyncStore>(
    provider: Provider,
    config: &ProviderConfig,
    store: Arc<S>,
) -> Arc<dyn SyncEngine> {
    let client = RemoteClient::new(config.timeout()).with_max_pages(config.max_pages);
    let settings = EngineSettings::from(config);
    match provider {
        Provider::Bugzilla => Arc::new(ItemUpdater::new(BugzillaAdapter::new(client), store, settings)),
        Provider::Github => Arc::new(ItemUpdater::new(
            GithubAdapter::new(client, config.api_base()),
            store,
            settings,
        )),
        Provider::Jira => Arc::new(ItemUpdater::new(JiraAdapter::new(client), store, settings)),
        Provider::Google => Arc::new(ItemUpdater::new(
            GoogleAdapter::new(client, config.api_base()),
            store,
            settings,
        )),
    }
}

/// Engines of every enabled provider, sharing one store.
pub fn engines<S: SyncStore>(config: &ProvidersConfig, store: &Arc<S>) -> Vec<Arc<dyn SyncEngine>> {
    config
        .enabled()
        .into_iter()
        .map(|provider| engine_for(provider, config.get(provider), Arc::clone(store)))
        .collect()
}
