use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use sift_core::entities::{Account, AccountDisplay};
use sift_core::enums::Provider;
use sift_db::repos::account::{AccountFilter, NewAccount};

use crate::cli::GlobalFlags;
use crate::cli::subcommands::AccountCommands;
use crate::commands::shared::limit::effective_limit;
use crate::commands::shared::parse::{parse_enum, parse_object};
use crate::context::AppContext;
use crate::output::output;

/// An account as shown to the user; credentials never leave storage.
#[derive(Debug, Serialize)]
struct AccountView {
    id: String,
    provider: Provider,
    user_id: String,
    external_id: String,
    name: Option<String>,
    problem: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<Account> for AccountView {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            provider: account.provider,
            user_id: account.user_id,
            external_id: account.external_id,
            name: account.display.name,
            problem: account.problem,
            created_at: account.created_at,
        }
    }
}

/// Handle `sift account`.
pub async fn handle(action: &AccountCommands, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    match action {
        AccountCommands::Add {
            provider,
            user,
            external_id,
            credentials,
            name,
        } => {
            let account = ctx
                .db
                .create_account(NewAccount {
                    provider: parse_enum(provider, "provider")?,
                    user_id: user.clone(),
                    external_id: external_id.clone(),
                    credentials: parse_object(credentials, "credentials")?,
                    display: AccountDisplay {
                        name: name.clone(),
                        ..AccountDisplay::default()
                    },
                })
                .await?;
            tracing::info!(account_id = %account.id, provider = %account.provider, "account linked");
            output(&AccountView::from(account), flags.format)
        }
        AccountCommands::List {
            user,
            provider,
            usable,
        } => {
            let filter = AccountFilter {
                provider: provider
                    .as_deref()
                    .map(|raw| parse_enum(raw, "provider"))
                    .transpose()?,
                user_id: user.clone(),
                usable_only: *usable,
            };
            let limit = effective_limit(None, flags.limit, ctx.config.general.default_limit);
            let accounts: Vec<AccountView> = ctx
                .db
                .list_accounts(&filter)
                .await?
                .into_iter()
                .take(usize::try_from(limit)?)
                .map(AccountView::from)
                .collect();
            output(&accounts, flags.format)
        }
        AccountCommands::Remove { id } => {
            let items_removed = ctx.db.delete_account(id).await?;
            output(&json!({"id": id, "items_removed": items_removed}), flags.format)
        }
        AccountCommands::Reauth { id, credentials } => {
            let credentials = parse_object(credentials, "credentials")?;
            let account = ctx.db.reauthenticate_account(id, &credentials).await?;
            output(&AccountView::from(account), flags.format)
        }
    }
}
