use crate::cli::GlobalFlags;
use crate::cli::root_commands::Commands;
use crate::commands;
use crate::context::AppContext;

/// Dispatch a parsed command to the corresponding handler module.
pub async fn dispatch(command: Commands, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    match command {
        Commands::Account { action } => commands::account::handle(&action, ctx, flags).await,
        Commands::List { action } => commands::list::handle(&action, ctx, flags).await,
        Commands::Sync(args) => commands::sync::handle(&args, ctx, flags).await,
        Commands::Resolve(args) => commands::resolve::handle(&args, ctx, flags).await,
        Commands::Items(args) => commands::items::handle(&args, ctx, flags).await,
        Commands::Daemon => commands::daemon::handle(ctx).await,
    }
}
