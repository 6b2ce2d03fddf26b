//! Core item repository and list membership projection.
//!
//! This is the item store the reconciliation engine upserts into. Items
//! controlled by a shadow entity are written by the engine; `Manual` items
//! belong to the user.

use chrono::{DateTime, Utc};
use libsql::Connection;

use sift_core::entities::{Item, ItemDetail};
use sift_core::enums::Controller;
use sift_core::ids::PREFIX_ITEM;

use crate::error::DatabaseError;
use crate::helpers::{
    get_opt_string, opt_datetime_value, parse_datetime, parse_enum, parse_json,
    parse_optional_datetime, to_json,
};
use crate::updates::item::ItemUpdate;
use crate::{SiftDb, generate_id};

const SELECT_COLS: &str =
    "id, user_id, summary, fields, due, done, controller, detail, created_at, updated_at";

fn row_to_item(row: &libsql::Row) -> Result<Item, DatabaseError> {
    Ok(Item {
        id: row.get(0)?,
        user_id: row.get(1)?,
        summary: row.get(2)?,
        fields: parse_json(&row.get::<String>(3)?)?,
        due: parse_optional_datetime(get_opt_string(row, 4)?.as_deref())?,
        done: parse_optional_datetime(get_opt_string(row, 5)?.as_deref())?,
        controller: parse_enum(&row.get::<String>(6)?)?,
        detail: parse_json(&row.get::<String>(7)?)?,
        created_at: parse_datetime(&row.get::<String>(8)?)?,
        updated_at: parse_datetime(&row.get::<String>(9)?)?,
    })
}

/// Input for creating a core item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub user_id: String,
    pub summary: String,
    pub fields: serde_json::Value,
    pub due: Option<DateTime<Utc>>,
    pub done: Option<DateTime<Utc>>,
    pub controller: Controller,
    pub detail: ItemDetail,
}

impl NewItem {
    /// The update that makes an existing item look like this one.
    #[must_use]
    pub fn as_update(&self) -> ItemUpdate {
        ItemUpdate {
            summary: Some(self.summary.clone()),
            fields: Some(self.fields.clone()),
            due: Some(self.due),
            done: Some(self.done),
            controller: Some(self.controller),
            detail: Some(self.detail.clone()),
        }
    }
}

pub(crate) async fn insert_item(conn: &Connection, new: &NewItem) -> Result<Item, DatabaseError> {
    let now = Utc::now();
    let id = generate_id(conn, PREFIX_ITEM).await?;
    conn.execute(
        &format!("INSERT INTO items ({SELECT_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"),
        libsql::params![
            id.as_str(),
            new.user_id.as_str(),
            new.summary.as_str(),
            to_json(&new.fields)?,
            opt_datetime_value(new.due),
            opt_datetime_value(new.done),
            new.controller.as_str(),
            to_json(&new.detail)?,
            now.to_rfc3339(),
            now.to_rfc3339()
        ],
    )
    .await?;

    Ok(Item {
        id,
        user_id: new.user_id.clone(),
        summary: new.summary.clone(),
        fields: new.fields.clone(),
        due: new.due,
        done: new.done,
        controller: new.controller,
        detail: new.detail.clone(),
        created_at: now,
        updated_at: now,
    })
}

pub(crate) async fn find_item(conn: &Connection, id: &str) -> Result<Option<Item>, DatabaseError> {
    let mut rows = conn
        .query(&format!("SELECT {SELECT_COLS} FROM items WHERE id = ?1"), [id])
        .await?;
    match rows.next().await? {
        Some(row) => Ok(Some(row_to_item(&row)?)),
        None => Ok(None),
    }
}

/// Apply a partial update. Returns `false` when `update` is empty, in which
/// case nothing (not even `updated_at`) is written.
pub(crate) async fn apply_item_update(
    conn: &Connection,
    id: &str,
    update: &ItemUpdate,
) -> Result<bool, DatabaseError> {
    let mut sets = Vec::new();
    let mut params: Vec<libsql::Value> = Vec::new();
    let mut idx = 1usize;

    if let Some(ref summary) = update.summary {
        sets.push(format!("summary = ?{idx}"));
        params.push(summary.clone().into());
        idx += 1;
    }
    if let Some(ref fields) = update.fields {
        sets.push(format!("fields = ?{idx}"));
        params.push(to_json(fields)?.into());
        idx += 1;
    }
    if let Some(due) = update.due {
        sets.push(format!("due = ?{idx}"));
        params.push(opt_datetime_value(due));
        idx += 1;
    }
    if let Some(done) = update.done {
        sets.push(format!("done = ?{idx}"));
        params.push(opt_datetime_value(done));
        idx += 1;
    }
    if let Some(controller) = update.controller {
        sets.push(format!("controller = ?{idx}"));
        params.push(controller.as_str().into());
        idx += 1;
    }
    if let Some(ref detail) = update.detail {
        sets.push(format!("detail = ?{idx}"));
        params.push(to_json(detail)?.into());
        idx += 1;
    }

    if sets.is_empty() {
        return Ok(false);
    }

    sets.push(format!("updated_at = ?{idx}"));
    params.push(Utc::now().to_rfc3339().into());
    idx += 1;

    params.push(id.into());
    let sql = format!("UPDATE items SET {} WHERE id = ?{idx}", sets.join(", "));
    let changed = conn.execute(&sql, libsql::params_from_iter(params)).await?;
    if changed == 0 {
        return Err(DatabaseError::not_found("item", id));
    }
    Ok(true)
}

/// Delete an item. Any shadow row still pointing at it goes first.
pub(crate) async fn remove_item(conn: &Connection, id: &str) -> Result<bool, DatabaseError> {
    conn.execute("DELETE FROM shadow_entities WHERE item_id = ?1", [id])
        .await?;
    let changed = conn.execute("DELETE FROM items WHERE id = ?1", [id]).await?;
    Ok(changed > 0)
}

pub(crate) async fn read_membership(
    conn: &Connection,
    list_id: &str,
) -> Result<Vec<String>, DatabaseError> {
    let mut rows = conn
        .query(
            "SELECT item_id FROM list_items WHERE list_id = ?1 ORDER BY position",
            [list_id],
        )
        .await?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next().await? {
        ids.push(row.get::<String>(0)?);
    }
    Ok(ids)
}

/// Replace the ordered membership of a list.
pub(crate) async fn write_membership(
    conn: &Connection,
    list_id: &str,
    item_ids: &[String],
) -> Result<(), DatabaseError> {
    conn.execute("DELETE FROM list_items WHERE list_id = ?1", [list_id])
        .await?;
    for (position, item_id) in item_ids.iter().enumerate() {
        let position = i64::try_from(position).map_err(|e| DatabaseError::Other(e.into()))?;
        conn.execute(
            "INSERT OR IGNORE INTO list_items (list_id, item_id, position) VALUES (?1, ?2, ?3)",
            libsql::params![list_id, item_id.as_str(), position],
        )
        .await?;
    }
    Ok(())
}

impl SiftDb {
    pub async fn create_item(&self, new: NewItem) -> Result<Item, DatabaseError> {
        let txn = self.begin().await?;
        let result = insert_item(txn.conn(), &new).await;
        txn.finish(result).await
    }

    pub async fn get_item(&self, id: &str) -> Result<Item, DatabaseError> {
        let reader = self.read().await;
        find_item(reader.conn(), id)
            .await?
            .ok_or_else(|| DatabaseError::not_found("item", id))
    }

    pub async fn update_item(&self, id: &str, update: &ItemUpdate) -> Result<Item, DatabaseError> {
        let txn = self.begin().await?;
        let result = apply_item_update(txn.conn(), id, update).await;
        txn.finish(result).await?;
        self.get_item(id).await
    }

    /// Delete an item and stop tracking its remote entity, if any.
    pub async fn delete_item(&self, id: &str) -> Result<(), DatabaseError> {
        let txn = self.begin().await?;
        let result = remove_item(txn.conn(), id).await.and_then(|deleted| {
            if deleted {
                Ok(())
            } else {
                Err(DatabaseError::not_found("item", id))
            }
        });
        txn.finish(result).await
    }

    /// Manually mark an item done (or not done).
    ///
    /// Only allowed on items whose controller permits it; service controlled
    /// items take their done state from upstream.
    pub async fn set_item_done(
        &self,
        id: &str,
        done: Option<DateTime<Utc>>,
    ) -> Result<Item, DatabaseError> {
        let item = self.get_item(id).await?;
        if !item.controller.allows_manual_done() {
            return Err(DatabaseError::InvalidState(format!(
                "item {id} is controlled by {}; its done state follows upstream",
                item.controller
            )));
        }
        let update = ItemUpdate {
            done: Some(done),
            ..ItemUpdate::default()
        };
        self.update_item(id, &update).await
    }

    pub async fn list_items_for_user(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<Item>, DatabaseError> {
        let reader = self.read().await;
        let mut rows = reader
            .conn()
            .query(
                &format!(
                    "SELECT {SELECT_COLS} FROM items WHERE user_id = ?1
                     ORDER BY done IS NOT NULL, due IS NULL, due, created_at, id LIMIT ?2"
                ),
                libsql::params![user_id, i64::from(limit)],
            )
            .await?;
        let mut items = Vec::new();
        while let Some(row) = rows.next().await? {
            items.push(row_to_item(&row)?);
        }
        Ok(items)
    }

    /// Items controlled by the shadow entities of one account.
    pub async fn items_for_account(&self, account_id: &str) -> Result<Vec<Item>, DatabaseError> {
        let reader = self.read().await;
        let mut rows = reader
            .conn()
            .query(
                &format!(
                    "SELECT {SELECT_COLS} FROM items
                     WHERE id IN (SELECT item_id FROM shadow_entities WHERE account_id = ?1)
                     ORDER BY id"
                ),
                [account_id],
            )
            .await?;
        let mut items = Vec::new();
        while let Some(row) = rows.next().await? {
            items.push(row_to_item(&row)?);
        }
        Ok(items)
    }

    /// Ordered item ids of one list's last reconciled content.
    pub async fn list_membership(&self, list_id: &str) -> Result<Vec<String>, DatabaseError> {
        let reader = self.read().await;
        read_membership(reader.conn(), list_id).await
    }

    pub async fn set_list_membership(
        &self,
        list_id: &str,
        item_ids: &[String],
    ) -> Result<(), DatabaseError> {
        let txn = self.begin().await?;
        let result = write_membership(txn.conn(), list_id, item_ids).await;
        txn.finish(result).await
    }
}
