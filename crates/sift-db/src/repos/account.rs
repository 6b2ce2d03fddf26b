//! Account repository.

use chrono::Utc;
use libsql::Connection;

use sift_core::entities::{Account, AccountDisplay};
use sift_core::enums::Provider;
use sift_core::ids::PREFIX_ACCOUNT;

use crate::error::DatabaseError;
use crate::helpers::{get_opt_string, parse_datetime, parse_enum, parse_json, to_json};
use crate::{SiftDb, generate_id};

const SELECT_COLS: &str = "id, provider, user_id, external_id, credentials, display_name, avatar, icon, problem, created_at, updated_at";

fn row_to_account(row: &libsql::Row) -> Result<Account, DatabaseError> {
    Ok(Account {
        id: row.get(0)?,
        provider: parse_enum(&row.get::<String>(1)?)?,
        user_id: row.get(2)?,
        external_id: row.get(3)?,
        credentials: parse_json(&row.get::<String>(4)?)?,
        display: AccountDisplay {
            name: get_opt_string(row, 5)?,
            avatar: get_opt_string(row, 6)?,
            icon: get_opt_string(row, 7)?,
        },
        problem: get_opt_string(row, 8)?,
        created_at: parse_datetime(&row.get::<String>(9)?)?,
        updated_at: parse_datetime(&row.get::<String>(10)?)?,
    })
}

/// Input for linking a new account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub provider: Provider,
    pub user_id: String,
    pub external_id: String,
    pub credentials: serde_json::Value,
    pub display: AccountDisplay,
}

/// Filter for [`SiftDb::list_accounts`]. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct AccountFilter {
    pub provider: Option<Provider>,
    pub user_id: Option<String>,
    /// Skip accounts flagged with a credential problem.
    pub usable_only: bool,
}

pub(crate) async fn find_account(
    conn: &Connection,
    id: &str,
) -> Result<Option<Account>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!("SELECT {SELECT_COLS} FROM accounts WHERE id = ?1"),
            [id],
        )
        .await?;
    match rows.next().await? {
        Some(row) => Ok(Some(row_to_account(&row)?)),
        None => Ok(None),
    }
}

pub(crate) async fn set_problem(
    conn: &Connection,
    id: &str,
    problem: Option<&str>,
) -> Result<(), DatabaseError> {
    let changed = conn
        .execute(
            "UPDATE accounts SET problem = ?1, updated_at = ?2 WHERE id = ?3",
            libsql::params![problem, Utc::now().to_rfc3339(), id],
        )
        .await?;
    if changed == 0 {
        return Err(DatabaseError::not_found("account", id));
    }
    Ok(())
}

impl SiftDb {
    pub async fn create_account(&self, new: NewAccount) -> Result<Account, DatabaseError> {
        let now = Utc::now();
        let txn = self.begin().await?;
        let result = async {
            let id = generate_id(txn.conn(), PREFIX_ACCOUNT).await?;
            txn.conn()
                .execute(
                    &format!(
                        "INSERT INTO accounts ({SELECT_COLS})
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL, ?9, ?10)"
                    ),
                    libsql::params![
                        id.as_str(),
                        new.provider.as_str(),
                        new.user_id.as_str(),
                        new.external_id.as_str(),
                        to_json(&new.credentials)?,
                        new.display.name.as_deref(),
                        new.display.avatar.as_deref(),
                        new.display.icon.as_deref(),
                        now.to_rfc3339(),
                        now.to_rfc3339()
                    ],
                )
                .await?;
            Ok::<_, DatabaseError>(id)
        }
        .await;
        let id = txn.finish(result).await?;

        Ok(Account {
            id,
            provider: new.provider,
            user_id: new.user_id,
            external_id: new.external_id,
            credentials: new.credentials,
            display: new.display,
            problem: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn get_account(&self, id: &str) -> Result<Account, DatabaseError> {
        let reader = self.read().await;
        find_account(reader.conn(), id)
            .await?
            .ok_or_else(|| DatabaseError::not_found("account", id))
    }

    pub async fn list_accounts(&self, filter: &AccountFilter) -> Result<Vec<Account>, DatabaseError> {
        let mut conditions = Vec::new();
        let mut params: Vec<libsql::Value> = Vec::new();

        if let Some(provider) = filter.provider {
            params.push(provider.as_str().into());
            conditions.push(format!("provider = ?{}", params.len()));
        }
        if let Some(ref user_id) = filter.user_id {
            params.push(user_id.clone().into());
            conditions.push(format!("user_id = ?{}", params.len()));
        }
        if filter.usable_only {
            conditions.push("problem IS NULL".to_string());
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        let reader = self.read().await;
        let mut rows = reader
            .conn()
            .query(
                &format!("SELECT {SELECT_COLS} FROM accounts {where_clause} ORDER BY created_at, id"),
                libsql::params_from_iter(params),
            )
            .await?;

        let mut accounts = Vec::new();
        while let Some(row) = rows.next().await? {
            accounts.push(row_to_account(&row)?);
        }
        Ok(accounts)
    }

    /// Replace the credential blob and clear any credential problem.
    pub async fn reauthenticate_account(
        &self,
        id: &str,
        credentials: &serde_json::Value,
    ) -> Result<Account, DatabaseError> {
        let txn = self.begin().await?;
        let result = async {
            let changed = txn
                .conn()
                .execute(
                    "UPDATE accounts SET credentials = ?1, problem = NULL, updated_at = ?2 WHERE id = ?3",
                    libsql::params![to_json(credentials)?, Utc::now().to_rfc3339(), id],
                )
                .await?;
            if changed == 0 {
                return Err(DatabaseError::not_found("account", id));
            }
            Ok::<_, DatabaseError>(())
        }
        .await;
        txn.finish(result).await?;
        self.get_account(id).await
    }

    pub async fn update_account_display(
        &self,
        id: &str,
        display: &AccountDisplay,
    ) -> Result<Account, DatabaseError> {
        let txn = self.begin().await?;
        let result = txn
            .conn()
            .execute(
                "UPDATE accounts SET display_name = ?1, avatar = ?2, icon = ?3, updated_at = ?4 WHERE id = ?5",
                libsql::params![
                    display.name.as_deref(),
                    display.avatar.as_deref(),
                    display.icon.as_deref(),
                    Utc::now().to_rfc3339(),
                    id
                ],
            )
            .await
            .map_err(DatabaseError::from);
        txn.finish(result).await?;
        self.get_account(id).await
    }

    /// Flag (or clear) a credential problem on an account.
    pub async fn set_account_problem(
        &self,
        id: &str,
        problem: Option<&str>,
    ) -> Result<(), DatabaseError> {
        let txn = self.begin().await?;
        let result = set_problem(txn.conn(), id, problem).await;
        txn.finish(result).await
    }

    /// Delete an account together with its lists, shadow entities and the
    /// items those shadow entities controlled.
    ///
    /// Returns the number of deleted items.
    pub async fn delete_account(&self, id: &str) -> Result<usize, DatabaseError> {
        let txn = self.begin().await?;
        let result = async {
            let conn = txn.conn();
            let mut rows = conn
                .query("SELECT item_id FROM shadow_entities WHERE account_id = ?1", [id])
                .await?;
            let mut item_ids = Vec::new();
            while let Some(row) = rows.next().await? {
                item_ids.push(row.get::<String>(0)?);
            }

            let changed = conn.execute("DELETE FROM accounts WHERE id = ?1", [id]).await?;
            if changed == 0 {
                return Err(DatabaseError::not_found("account", id));
            }
            for item_id in &item_ids {
                conn.execute("DELETE FROM items WHERE id = ?1", [item_id.as_str()])
                    .await?;
            }
            Ok::<_, DatabaseError>(item_ids.len())
        }
        .await;
        txn.finish(result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::helpers::{new_account, test_db};
    use serde_json::json;

    #[tokio::test]
    async fn create_account_roundtrip() {
        let db = test_db().await;
        let account = db.create_account(new_account(Provider::Jira, "user-1", "me@example.org")).await.unwrap();

        assert!(account.id.starts_with("acc-"));
        assert!(account.is_usable());

        let fetched = db.get_account(&account.id).await.unwrap();
        assert_eq!(fetched.external_id, "me@example.org");
        assert_eq!(fetched.provider, Provider::Jira);
        assert_eq!(fetched.credentials, account.credentials);
        assert_eq!(fetched.display, account.display);
    }

    #[tokio::test]
    async fn duplicate_identity_is_rejected() {
        let db = test_db().await;
        db.create_account(new_account(Provider::Github, "user-1", "octocat")).await.unwrap();
        let err = db
            .create_account(new_account(Provider::Github, "user-1", "octocat"))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::LibSql(_)), "{err}");
    }

    #[tokio::test]
    async fn list_accounts_filters() {
        let db = test_db().await;
        let a = db.create_account(new_account(Provider::Github, "user-1", "a")).await.unwrap();
        db.create_account(new_account(Provider::Github, "user-2", "b")).await.unwrap();
        db.create_account(new_account(Provider::Jira, "user-1", "c")).await.unwrap();

        let github = db
            .list_accounts(&AccountFilter {
                provider: Some(Provider::Github),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(github.len(), 2);

        let user_github = db
            .list_accounts(&AccountFilter {
                provider: Some(Provider::Github),
                user_id: Some("user-1".into()),
                usable_only: false,
            })
            .await
            .unwrap();
        assert_eq!(user_github.len(), 1);
        assert_eq!(user_github[0].id, a.id);
    }

    #[tokio::test]
    async fn problem_flag_excludes_and_reauth_clears() {
        let db = test_db().await;
        let account = db.create_account(new_account(Provider::Google, "user-1", "me")).await.unwrap();
        db.set_account_problem(&account.id, Some("token revoked")).await.unwrap();

        let usable = db
            .list_accounts(&AccountFilter {
                usable_only: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(usable.is_empty());

        let fixed = db
            .reauthenticate_account(&account.id, &json!({"access_token": "fresh"}))
            .await
            .unwrap();
        assert!(fixed.is_usable());
        assert_eq!(fixed.credentials, json!({"access_token": "fresh"}));
    }

    #[tokio::test]
    async fn update_display_metadata() {
        let db = test_db().await;
        let account = db.create_account(new_account(Provider::Github, "user-1", "octocat")).await.unwrap();
        let display = AccountDisplay {
            name: Some("The Octocat".into()),
            avatar: Some("https://avatars.example.org/1".into()),
            icon: None,
        };
        let updated = db.update_account_display(&account.id, &display).await.unwrap();
        assert_eq!(updated.display, display);
    }

    #[tokio::test]
    async fn missing_account_is_not_found() {
        let db = test_db().await;
        let err = db.get_account("acc-missing").await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { entity: "account", .. }));
        assert!(db.set_account_problem("acc-missing", None).await.is_err());
    }
}
