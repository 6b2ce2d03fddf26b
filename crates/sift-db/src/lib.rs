//! # sift-db
//!
//! libSQL persistence for sift.
//!
//! Holds linked accounts, saved lists, the shadow entities that track remote
//! items, the core items they control, and the ordered list membership
//! projection. A whole reconciliation pass is written through
//! [`SiftDb::apply_changeset`] inside a single transaction.

pub mod changeset;
pub mod error;
pub mod helpers;
mod migrations;
pub mod repos;
pub mod updates;

#[cfg(test)]
mod test_support;

use error::DatabaseError;
use libsql::{Builder, Connection, Transaction};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Central database handle for all sift state.
///
/// Wraps a libSQL database and a single shared connection. Every write goes
/// through [`SiftDb::begin`], which holds the exclusive side of an async
/// lock until the transaction commits or rolls back. Reads go through
/// [`SiftDb::read`] and never observe an open transaction.
pub struct SiftDb {
    #[allow(dead_code)]
    db: libsql::Database,
    conn: Connection,
    lock: RwLock<()>,
}

/// Shared access to the connection while no transaction is open.
pub struct ReadConn<'a> {
    _guard: RwLockReadGuard<'a, ()>,
    conn: &'a Connection,
}

impl ReadConn<'_> {
    #[must_use]
    pub const fn conn(&self) -> &Connection {
        self.conn
    }
}

/// An open write transaction together with the lock guarding it.
pub(crate) struct WriteTxn<'a> {
    _guard: RwLockWriteGuard<'a, ()>,
    tx: Transaction,
}

impl WriteTxn<'_> {
    pub(crate) fn conn(&self) -> &Connection {
        &self.tx
    }

    /// Commit on success, roll back on failure, and pass the result through.
    pub(crate) async fn finish<T>(
        self,
        result: Result<T, DatabaseError>,
    ) -> Result<T, DatabaseError> {
        match result {
            Ok(value) => {
                self.tx.commit().await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self.tx.rollback().await {
                    tracing::error!(%rollback, "rollback failed");
                }
                Err(e)
            }
        }
    }
}

impl SiftDb {
    /// Open a local database at the given path, or `":memory:"`.
    ///
    /// Runs migrations automatically on first open.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or
    /// migrations fail.
    pub async fn open_local(path: &str) -> Result<Self, DatabaseError> {
        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;

        // Enable foreign keys (must be per-connection in SQLite)
        conn.execute("PRAGMA foreign_keys = ON", ())
            .await
            .map_err(|e| DatabaseError::Migration(format!("PRAGMA foreign_keys: {e}")))?;

        let sift_db = Self {
            db,
            conn,
            lock: RwLock::new(()),
        };
        sift_db.run_migrations().await?;
        Ok(sift_db)
    }

    /// Wait for any open transaction to finish, then borrow the connection
    /// for direct queries.
    pub async fn read(&self) -> ReadConn<'_> {
        ReadConn {
            _guard: self.lock.read().await,
            conn: &self.conn,
        }
    }

    /// Generate a prefixed ID via libSQL. Returns e.g., `"itm-a3f8b2c1"`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails or returns no rows.
    pub async fn generate_id(&self, prefix: &str) -> Result<String, DatabaseError> {
        let reader = self.read().await;
        generate_id(reader.conn(), prefix).await
    }

    /// Take the exclusive lock and open a transaction.
    pub(crate) async fn begin(&self) -> Result<WriteTxn<'_>, DatabaseError> {
        let guard = self.lock.write().await;
        let tx = self.conn.transaction().await?;
        Ok(WriteTxn { _guard: guard, tx })
    }
}

/// Generate a prefixed ID on any connection, including an open transaction.
///
/// Uses `randomblob(4)` in SQL to produce 8-char hex, then prepends the prefix.
pub(crate) async fn generate_id(conn: &Connection, prefix: &str) -> Result<String, DatabaseError> {
    let mut rows = conn
        .query(
            &format!("SELECT '{prefix}-' || lower(hex(randomblob(4)))"),
            (),
        )
        .await?;
    let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
    Ok(row.get::<String>(0)?)
}
