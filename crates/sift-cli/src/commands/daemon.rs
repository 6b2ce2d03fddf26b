use std::sync::Arc;

use anyhow::{Context, bail};
use sift_sync::{RecurringTask, Scheduler};

use crate::context::AppContext;

/// Handle `sift daemon`: run every engine on its schedule until Ctrl-C.
pub async fn handle(ctx: &AppContext) -> anyhow::Result<()> {
    if ctx.engines.is_empty() {
        bail!("no provider is enabled in config");
    }

    let scheduler = Scheduler::new();
    let tasks: Vec<RecurringTask> = ctx
        .engines
        .iter()
        .map(|engine| Arc::clone(engine).start(&scheduler))
        .collect();
    tracing::info!(tasks = tasks.len(), "sync daemon started");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;

    tracing::info!("shutting down");
    scheduler.shutdown();
    for task in tasks {
        task.stop().await;
    }
    Ok(())
}
