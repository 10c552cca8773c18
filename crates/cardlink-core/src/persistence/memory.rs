//! In-process row store.
//!
//! Useful for development runs without a spreadsheet and for tests, which can
//! switch individual operations into a failing mode.

use super::{PersistenceGateway, RowPosition};
use crate::config::SheetConfig;
use crate::error::{CardlinkError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::debug;

/// Rows held in memory, laid out like the sheet (row 1 is the header).
#[derive(Debug)]
pub struct MemoryRowStore {
    rows: Mutex<Vec<Vec<String>>>,
    fail_appends: AtomicBool,
    fail_updates: AtomicBool,
    fail_reads: AtomicBool,
    update_calls: AtomicUsize,
}

impl Default for MemoryRowStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRowStore {
    /// Create a store containing only the header row.
    pub fn new() -> Self {
        let header = vec![
            "Register Number".to_string(),
            "Name".to_string(),
            "RFID UID".to_string(),
            "Date Added".to_string(),
        ];
        Self {
            rows: Mutex::new(vec![header]),
            fail_appends: AtomicBool::new(false),
            fail_updates: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            update_calls: AtomicUsize::new(0),
        }
    }

    /// Make subsequent appends fail.
    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent cell updates fail.
    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent cell reads fail.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Number of update calls seen, failed ones included.
    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    /// Copy of a whole row, if present.
    pub fn row(&self, position: RowPosition) -> Option<Vec<String>> {
        let rows = self.rows.lock().ok()?;
        Self::index(position).and_then(|i| rows.get(i).cloned())
    }

    /// Number of rows including the header.
    pub fn row_count(&self) -> usize {
        self.rows.lock().map(|rows| rows.len()).unwrap_or(0)
    }

    fn index(position: RowPosition) -> Option<usize> {
        (position.row() as usize).checked_sub(1)
    }

    fn column_index(column: u32) -> Result<usize> {
        if (1..=SheetConfig::COLUMN_COUNT).contains(&column) {
            Ok(column as usize - 1)
        } else {
            Err(CardlinkError::write_failed(format!(
                "column {} is outside the registration layout",
                column
            )))
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<Vec<String>>>> {
        self.rows
            .lock()
            .map_err(|_| CardlinkError::unavailable("memory row store lock poisoned"))
    }
}

#[async_trait]
impl PersistenceGateway for MemoryRowStore {
    async fn append(&self, cells: &[String]) -> Result<RowPosition> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(CardlinkError::write_failed("append rejected by memory store"));
        }

        let mut rows = self.lock()?;
        let mut row = cells.to_vec();
        row.resize(SheetConfig::COLUMN_COUNT as usize, String::new());
        rows.push(row);
        let position = RowPosition(rows.len() as u32);
        debug!(row = position.row(), "Appended row to memory store");
        Ok(position)
    }

    async fn update(&self, position: RowPosition, column: u32, value: &str) -> Result<()> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(CardlinkError::write_failed("update rejected by memory store"));
        }

        let col = Self::column_index(column)?;
        let mut rows = self.lock()?;
        let row = Self::index(position)
            .and_then(|i| rows.get_mut(i))
            .ok_or_else(|| CardlinkError::write_failed(format!("row {} not found", position)))?;
        row[col] = value.to_string();
        Ok(())
    }

    async fn read(&self, position: RowPosition, column: u32) -> Result<String> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(CardlinkError::unavailable("read rejected by memory store"));
        }

        let col = Self::column_index(column)?;
        let rows = self.lock()?;
        Self::index(position)
            .and_then(|i| rows.get(i))
            .map(|row| row[col].clone())
            .ok_or_else(|| CardlinkError::write_failed(format!("row {} not found", position)))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(reg_no: &str, name: &str) -> Vec<String> {
        vec![reg_no.into(), name.into(), String::new(), "2026-01-01 00:00:00".into()]
    }

    #[tokio::test]
    async fn test_append_starts_below_header() {
        let store = MemoryRowStore::new();
        let first = store.append(&cells("R1", "Alice")).await.unwrap();
        let second = store.append(&cells("R2", "Bob")).await.unwrap();

        assert_eq!(first, RowPosition(2));
        assert_eq!(second, RowPosition(3));
        assert_eq!(store.row_count(), 3);
    }

    #[tokio::test]
    async fn test_update_then_read_cell() {
        let store = MemoryRowStore::new();
        let pos = store.append(&cells("R1", "Alice")).await.unwrap();

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
    async fn test_update_missing_row_fails() {
        let store = MemoryRowStore::new();
        let err = store
            .update(RowPosition(9), SheetConfig::RFID_UID_COLUMN, "UID")
            .await
            .unwrap_err();
        assert!(matches!(err, CardlinkError::PersistenceWriteFailed { .. }));
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let store = MemoryRowStore::new();
        store.fail_appends(true);
        assert!(store.append(&cells("R1", "Alice")).await.is_err());
        assert_eq!(store.row_count(), 1);

        store.fail_appends(false);
        let pos = store.append(&cells("R1", "Alice")).await.unwrap();
        store.fail_updates(true);
        assert!(store.update(pos, 3, "UID").await.is_err());
        assert_eq!(store.update_calls(), 1);
        assert_eq!(store.row(pos).unwrap()[2], "");
    }
}
