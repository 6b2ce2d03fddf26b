use std::sync::Arc;

use anyhow::Context;
use sift_config::SiftConfig;
use sift_core::enums::Provider;
use sift_db::SiftDb;
use sift_sync::SyncEngine;

/// Everything a command handler needs: config, storage and one engine per
/// enabled provider.
pub struct AppContext {
    pub config: SiftConfig,
    pub db: Arc<SiftDb>,
    pub engines: Vec<Arc<dyn SyncEngine>>,
}

impl AppContext {
    pub async fn init(config: SiftConfig) -> anyhow::Result<Self> {
        let db = SiftDb::open_local(&config.database.path)
            .await
            .with_context(|| format!("failed to open database at {}", config.database.path))?;
        let db = Arc::new(db);
        let engines = sift_sync::engines(&config.providers, &db);
        tracing::debug!(
            database = %config.database.path,
            engines = engines.len(),
            "context ready"
        );
        Ok(Self { config, db, engines })
    }

    pub fn engine(&self, provider: Provider) -> anyhow::Result<&Arc<dyn SyncEngine>> {
        self.engines
            .iter()
            .find(|engine| engine.provider() == provider)
            .with_context(|| format!("provider '{provider}' is disabled in config"))
    }
}
