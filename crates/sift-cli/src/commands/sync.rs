use anyhow::Context;
use sift_core::enums::Provider;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::SyncArgs;
use crate::commands::shared::parse::parse_enum;
use crate::context::AppContext;
use crate::output::output;

/// Handle `sift sync`: one cycle per enabled provider, in order.
pub async fn handle(args: &SyncArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let engines = match args.provider.as_deref() {
        Some(raw) => vec![ctx.engine(parse_enum::<Provider>(raw, "provider")?)?],
        None => ctx.engines.iter().collect(),
    };

    let mut reports = Vec::with_capacity(engines.len());
    for engine in engines {
        let report = engine
            .run()
            .await
            .with_context(|| format!("{} sync failed", engine.provider()))?;
        reports.push(report);
    }
    output(&reports, flags.format)
}
