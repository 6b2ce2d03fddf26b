//! Shadow entity repository.
//!
//! One row per tracked remote entity, keyed by `(provider, account_id,
//! native_key)`. Upserts never replace a stored `done_at`.

use libsql::Connection;

use sift_core::entities::ShadowEntity;
use sift_core::enums::Provider;

use crate::SiftDb;
use crate::error::DatabaseError;
use crate::helpers::{get_opt_string, opt_datetime_value, parse_enum, parse_json, parse_optional_datetime, to_json};

const SELECT_COLS: &str = "provider, account_id, native_key, item_id, done_at, memo";

fn row_to_shadow(row: &libsql::Row) -> Result<ShadowEntity, DatabaseError> {
    Ok(ShadowEntity {
        provider: parse_enum(&row.get::<String>(0)?)?,
        account_id: row.get(1)?,
        native_key: row.get(2)?,
        item_id: row.get(3)?,
        done_at: parse_optional_datetime(get_opt_string(row, 4)?.as_deref())?,
        memo: parse_json(&row.get::<String>(5)?)?,
    })
}

pub(crate) async fn find_shadow(
    conn: &Connection,
    provider: Provider,
    account_id: &str,
    native_key: &str,
) -> Result<Option<ShadowEntity>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!(
                "SELECT {SELECT_COLS} FROM shadow_entities
                 WHERE provider = ?1 AND account_id = ?2 AND native_key = ?3"
            ),
            libsql::params![provider.as_str(), account_id, native_key],
        )
        .await?;
    match rows.next().await? {
        Some(row) => Ok(Some(row_to_shadow(&row)?)),
        None => Ok(None),
    }
}

/// Insert or update a shadow row. An existing `done_at` always wins, and the
/// controlled item never changes.
pub(crate) async fn upsert_shadow(
    conn: &Connection,
    shadow: &ShadowEntity,
) -> Result<(), DatabaseError> {
    conn.execute(
        &format!(
            "INSERT INTO shadow_entities ({SELECT_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (provider, account_id, native_key) DO UPDATE SET
                 done_at = COALESCE(shadow_entities.done_at, excluded.done_at),
                 memo = excluded.memo"
        ),
        libsql::params![
            shadow.provider.as_str(),
            shadow.account_id.as_str(),
            shadow.native_key.as_str(),
            shadow.item_id.as_str(),
            opt_datetime_value(shadow.done_at),
            to_json(&shadow.memo)?
        ],
    )
    .await?;
    Ok(())
}

pub(crate) async fn delete_shadow(
    conn: &Connection,
    provider: Provider,
    account_id: &str,
    native_key: &str,
) -> Result<u64, DatabaseError> {
    Ok(conn
        .execute(
            "DELETE FROM shadow_entities WHERE provider = ?1 AND account_id = ?2 AND native_key = ?3",
            libsql::params![provider.as_str(), account_id, native_key],
        )
        .await?)
}

impl SiftDb {
    pub async fn shadows_for_account(
        &self,
        account_id: &str,
    ) -> Result<Vec<ShadowEntity>, DatabaseError> {
        let reader = self.read().await;
        let mut rows = reader
            .conn()
            .query(
                &format!(
                    "SELECT {SELECT_COLS} FROM shadow_entities WHERE account_id = ?1 ORDER BY native_key"
                ),
                [account_id],
            )
            .await?;
        let mut shadows = Vec::new();
        while let Some(row) = rows.next().await? {
            shadows.push(row_to_shadow(&row)?);
        }
        Ok(shadows)
    }

    pub async fn find_shadow(
        &self,
        provider: Provider,
        account_id: &str,
        native_key: &str,
    ) -> Result<Option<ShadowEntity>, DatabaseError> {
        let reader = self.read().await;
        find_shadow(reader.conn(), provider, account_id, native_key).await
    }

    /// The shadow entity controlling an item, if any.
    pub async fn shadow_for_item(&self, item_id: &str) -> Result<Option<ShadowEntity>, DatabaseError> {
        let reader = self.read().await;
        let mut rows = reader
            .conn()
            .query(
                &format!("SELECT {SELECT_COLS} FROM shadow_entities WHERE item_id = ?1"),
                [item_id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_shadow(&row)?)),
            None => Ok(None),
        }
    }
}
