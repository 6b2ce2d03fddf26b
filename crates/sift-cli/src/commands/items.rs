use crate::cli::GlobalFlags;
use crate::cli::root_commands::ItemsArgs;
use crate::commands::shared::limit::effective_limit;
use crate::context::AppContext;
use crate::output::output;

/// Handle `sift items`.
pub async fn handle(args: &ItemsArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let limit = effective_limit(args.limit, flags.limit, ctx.config.general.default_limit);
    let items = ctx.db.list_items_for_user(&args.user, limit).await?;
    output(&items, flags.format)
}
