use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use sift_core::entities::List;

use crate::cli::GlobalFlags;
use crate::cli::subcommands::ListCommands;
use crate::commands::shared::parse::parse_object;
use crate::context::AppContext;
use crate::output::output;

#[derive(Debug, Serialize)]
struct ListView {
    id: String,
    account_id: String,
    name: String,
    query: serde_json::Value,
    due: Option<String>,
    url: Option<String>,
    created_at: DateTime<Utc>,
}

impl ListView {
    fn new(list: List, url: Option<String>) -> Self {
        Self {
            due: list.due_offset.as_ref().map(|offset| offset.as_str().to_string()),
            id: list.id,
            account_id: list.account_id,
            name: list.name,
            query: list.query,
            url,
            created_at: list.created_at,
        }
    }
}

/// Handle `sift list`.
pub async fn handle(action: &ListCommands, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    match action {
        ListCommands::Add {
            account,
            name,
            query,
            due,
        } => {
            let account = ctx.db.get_account(account).await?;
            let engine = ctx.engine(account.provider)?;
            let query = parse_object(query, "query")?;
            let list = engine.add_list(&account.id, name, query, due.as_deref()).await?;
            let url = engine.list_url(&account, &list);
            output(&ListView::new(list, url), flags.format)
        }
        ListCommands::Show { account } => {
            let account = ctx.db.get_account(account).await?;
            let engine = ctx.engine(account.provider).ok();
            let lists: Vec<ListView> = ctx
                .db
                .lists_for_account(&account.id)
                .await?
                .into_iter()
                .map(|list| {
                    let url = engine.and_then(|engine| engine.list_url(&account, &list));
                    ListView::new(list, url)
                })
                .collect();
            output(&lists, flags.format)
        }
        ListCommands::Remove { id } => {
            ctx.db.delete_list(id).await?;
            output(&json!({"id": id, "removed": true}), flags.format)
        }
    }
}
