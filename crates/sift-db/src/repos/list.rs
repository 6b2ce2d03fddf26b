//! Saved list repository.

use chrono::Utc;
use libsql::Connection;

use sift_core::due::DueOffset;
use sift_core::entities::List;
use sift_core::ids::PREFIX_LIST;

use crate::SiftDb;
use crate::error::DatabaseError;
use crate::helpers::{get_opt_string, parse_datetime, parse_json, to_json};

const SELECT_COLS: &str = "id, account_id, name, query, due_offset, created_at";

fn row_to_list(row: &libsql::Row) -> Result<List, DatabaseError> {
    let due_offset = get_opt_string(row, 4)?
        .map(|rule| rule.parse::<DueOffset>())
        .transpose()
        .map_err(|e| DatabaseError::InvalidState(e.to_string()))?;
    Ok(List {
        id: row.get(0)?,
        account_id: row.get(1)?,
        name: row.get(2)?,
        query: parse_json(&row.get::<String>(3)?)?,
        due_offset,
        created_at: parse_datetime(&row.get::<String>(5)?)?,
    })
}

pub(crate) async fn insert_list(conn: &Connection, list: &List) -> Result<(), DatabaseError> {
    conn.execute(
        &format!("INSERT INTO lists ({SELECT_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
        libsql::params![
            list.id.as_str(),
            list.account_id.as_str(),
            list.name.as_str(),
            to_json(&list.query)?,
            list.due_offset.as_ref().map(DueOffset::as_str),
            list.created_at.to_rfc3339()
        ],
    )
    .await?;
    Ok(())
}

impl SiftDb {
    /// Create a list record without fetching its content.
    ///
    /// Reconciliation uses [`SiftDb::apply_changeset`] instead so the list and
    /// its first membership land together.
    pub async fn create_list(
        &self,
        account_id: &str,
        name: &str,
        query: serde_json::Value,
        due_offset: Option<DueOffset>,
    ) -> Result<List, DatabaseError> {
        let list = List {
            id: self.generate_id(PREFIX_LIST).await?,
            account_id: account_id.to_string(),
            name: name.to_string(),
            query,
            due_offset,
            created_at: Utc::now(),
        };
        let txn = self.begin().await?;
        let result = insert_list(txn.conn(), &list).await;
        txn.finish(result).await?;
        Ok(list)
    }

    pub async fn get_list(&self, id: &str) -> Result<List, DatabaseError> {
        let reader = self.read().await;
        let mut rows = reader
            .conn()
            .query(&format!("SELECT {SELECT_COLS} FROM lists WHERE id = ?1"), [id])
            .await?;
        let row = rows
            .next()
            .await?
            .ok_or_else(|| DatabaseError::not_found("list", id))?;
        row_to_list(&row)
    }

    pub async fn lists_for_account(&self, account_id: &str) -> Result<Vec<List>, DatabaseError> {
        let reader = self.read().await;
        let mut rows = reader
            .conn()
            .query(
                &format!("SELECT {SELECT_COLS} FROM lists WHERE account_id = ?1 ORDER BY created_at, id"),
                [account_id],
            )
            .await?;
        let mut lists = Vec::new();
        while let Some(row) = rows.next().await? {
            lists.push(row_to_list(&row)?);
        }
        Ok(lists)
    }

    /// Delete a list and its membership rows. Items stay tracked through
    /// their shadow entities.
    pub async fn delete_list(&self, id: &str) -> Result<(), DatabaseError> {
        let txn = self.begin().await?;
        let result = txn
            .conn()
            .execute("DELETE FROM lists WHERE id = ?1", [id])
            .await
            .map_err(DatabaseError::from)
            .and_then(|changed| {
                if changed == 0 {
                    Err(DatabaseError::not_found("list", id))
                } else {
                    Ok(())
                }
            });
        txn.finish(result).await
    }
}
