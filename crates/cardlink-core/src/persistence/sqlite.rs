//! SQLite-backed row store for running without a spreadsheet.

use super::{PersistenceGateway, RowPosition};
use crate::config::SheetConfig;
use crate::error::{CardlinkError, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Registration rows in a local SQLite table.
///
/// The row id doubles as the [`RowPosition`]. Uses WAL mode so an operator
/// can inspect the file while the server runs.
pub struct SqliteRowStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRowStore {
    /// Open (or create) the store at `db_path`.
    pub fn open_at(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| CardlinkError::Io {
                    message: format!("Failed to create database directory: {}", parent.display()),
                    path: Some(parent.to_path_buf()),
                    source: Some(e),
                })?;
            }
        }

        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::ensure_schema(&conn)?;
        info!("Opened SQLite row store at {}", db_path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::ensure_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn ensure_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS registrations (
                position   INTEGER PRIMARY KEY AUTOINCREMENT,
                reg_no     TEXT NOT NULL,
                name       TEXT NOT NULL,
                rfid_uid   TEXT NOT NULL DEFAULT '',
                date_added TEXT NOT NULL DEFAULT ''
            );",
        )?;
        Ok(())
    }

    fn column_name(column: u32) -> Result<&'static str> {
        match column {
            SheetConfig::REG_NO_COLUMN => Ok("reg_no"),
            SheetConfig::NAME_COLUMN => Ok("name"),
            SheetConfig::RFID_UID_COLUMN => Ok("rfid_uid"),
            SheetConfig::DATE_ADDED_COLUMN => Ok("date_added"),
            other => Err(CardlinkError::write_failed(format!(
                "column {} is outside the registration layout",
                other
            ))),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CardlinkError::unavailable("SQLite connection lock poisoned"))
    }
}

#[async_trait]
impl PersistenceGateway for SqliteRowStore {
    async fn append(&self, cells: &[String]) -> Result<RowPosition> {
        let cell = |i: usize| cells.get(i).map(String::as_str).unwrap_or("");
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO registrations (reg_no, name, rfid_uid, date_added) VALUES (?1, ?2, ?3, ?4)",
            params![cell(0), cell(1), cell(2), cell(3)],
        )?;
        let rowid = conn.last_insert_rowid();
        let position = u32::try_from(rowid)
            .map(RowPosition)
            .map_err(|_| CardlinkError::write_failed(format!("row id {} out of range", rowid)))?;
        debug!(row = position.row(), "Appended row to SQLite store");
        Ok(position)
    }

    async fn update(&self, position: RowPosition, column: u32, value: &str) -> Result<()> {
        let column = Self::column_name(column)?;
        let conn = self.lock()?;
        let changed = conn.execute(
            &format!("UPDATE registrations SET {} = ?1 WHERE position = ?2", column),
            params![value, position.row()],
        )?;
        if changed == 0 {
            return Err(CardlinkError::write_failed(format!("row {} not found", position)));
        }
        Ok(())
    }

    async fn read(&self, position: RowPosition, column: u32) -> Result<String> {
        let column = Self::column_name(column)?;
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {} FROM registrations WHERE position = ?1", column),
            params![position.row()],
            |row| row.get::<_, String>(0),
        )
        .optional()?
        .ok_or_else(|| CardlinkError::write_failed(format!("row {} not found", position)))
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (SqliteRowStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteRowStore::open_at(&temp_dir.path().join("rows.db")).unwrap();
        (store, temp_dir)
    }

    fn cells(reg_no: &str, name: &str) -> Vec<String> {
        vec![reg_no.into(), name.into(), String::new(), "2026-01-01 00:00:00".into()]
    }

    #[tokio::test]
    async fn test_append_returns_increasing_positions() {
        let (store, _dir) = create_test_store();
        let first = store.append(&cells("R1", "Alice")).await.unwrap();
        let second = store.append(&cells("R2", "Bob")).await.unwrap();
        assert!(second > first);
    }

    #[tokio::test]
    async fn test_update_and_read_uid() {
        let (store, _dir) = create_test_store();
        let pos = store.append(&cells("R1", "Alice")).await.unwrap();

        assert_eq!(store.read(pos, SheetConfig::RFID_UID_COLUMN).await.unwrap(), "");
        store
            .update(pos, SheetConfig::RFID_UID_COLUMN, "UID123")
            .await
            .unwrap();
        assert_eq!(
            store.read(pos, SheetConfig::RFID_UID_COLUMN).await.unwrap(),
            "UID123"
        );
        assert_eq!(store.read(pos, SheetConfig::NAME_COLUMN).await.unwrap(), "Alice");
    }

    #[tokio::test]
    async fn test_missing_row_is_write_failure() {
        let store = SqliteRowStore::open_in_memory().unwrap();
        let err = store
            .update(RowPosition(42), SheetConfig::RFID_UID_COLUMN, "UID")
            .await
            .unwrap_err();
        assert!(matches!(err, CardlinkError::PersistenceWriteFailed { .. }));

        let err = store.read(RowPosition(42), SheetConfig::NAME_COLUMN).await.unwrap_err();
        assert!(matches!(err, CardlinkError::PersistenceWriteFailed { .. }));
    }

    #[tokio::test]
    async fn test_unknown_column_rejected() {
        let store = SqliteRowStore::open_in_memory().unwrap();
        let pos = store.append(&cells("R1", "Alice")).await.unwrap();
        assert!(store.update(pos, 9, "x").await.is_err());
    }

    #[tokio::test]
    async fn test_rows_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("rows.db");
        let pos = {
            let store = SqliteRowStore::open_at(&path).unwrap();
            store.append(&cells("R1", "Alice")).await.unwrap()
        };

        let reopened = SqliteRowStore::open_at(&path).unwrap();
        assert_eq!(reopened.read(pos, SheetConfig::REG_NO_COLUMN).await.unwrap(), "R1");
    }
}
