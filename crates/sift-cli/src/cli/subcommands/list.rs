use clap::Subcommand;

/// Saved list commands.
#[derive(Clone, Debug, Subcommand)]
pub enum ListCommands {
    /// Save a remote search and sync its first results.
    Add {
        #[arg(long)]
        account: String,
        #[arg(long)]
        name: String,
        /// Provider query as JSON, e.g. `{"jql": "..."}`.
        #[arg(long)]
        query: String,
        /// Due rule for new items, e.g. `+1d end of day`.
        #[arg(long)]
        due: Option<String>,
    },
    /// Show an account's lists.
    #[command(visible_alias = "ls")]
    Show {
        #[arg(long)]
        account: String,
    },
    /// Delete a list. Its items stay tracked while they exist upstream.
    Remove { id: String },
}
