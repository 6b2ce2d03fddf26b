use clap::Subcommand;

/// Linked account commands.
#[derive(Clone, Debug, Subcommand)]
pub enum AccountCommands {
    /// Link a service account to a user.
    Add {
        #[arg(long)]
        provider: String,
        #[arg(long)]
        user: String,
        /// The user's identity at the service (login, email).
        #[arg(long)]
        external_id: String,
        /// Credential blob as JSON, e.g. `{"token": "..."}`.
        #[arg(long)]
        credentials: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// List linked accounts.
    List {
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        provider: Option<String>,
        /// Hide accounts flagged with a credential problem.
        #[arg(long)]
        usable: bool,
    },
    /// Unlink an account and drop the items it controls.
    Remove { id: String },
    /// Replace an account's credentials and clear its problem flag.
    Reauth {
        id: String,
        #[arg(long)]
        credentials: String,
    },
}
