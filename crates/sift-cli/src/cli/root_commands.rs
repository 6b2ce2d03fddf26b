use clap::{Args, Subcommand};

use crate::cli::subcommands::{AccountCommands, ListCommands};

/// Top-level command tree.
#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Linked service accounts.
    Account {
        #[command(subcommand)]
        action: AccountCommands,
    },
    /// Saved remote searches.
    List {
        #[command(subcommand)]
        action: ListCommands,
    },
    /// Run one reconciliation cycle now.
    Sync(SyncArgs),
    /// Resolve a pasted link to the item tracking it.
    Resolve(ResolveArgs),
    /// Show a user's items.
    Items(ItemsArgs),
    /// Keep every enabled provider in sync until interrupted.
    Daemon,
}

#[derive(Clone, Debug, Args)]
pub struct SyncArgs {
    /// Only this provider (bugzilla, github, jira, google).
    #[arg(long)]
    pub provider: Option<String>,
}

#[derive(Clone, Debug, Args)]
pub struct ResolveArgs {
    pub url: String,
    #[arg(long)]
    pub user: String,
}

#[derive(Clone, Debug, Args)]
pub struct ItemsArgs {
    #[arg(long)]
    pub user: String,
    #[arg(long)]
    pub limit: Option<u32>,
}
