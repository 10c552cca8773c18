//! Row store trait.

use super::RowPosition;
use crate::error::Result;
use async_trait::async_trait;

/// Fallible access to the external registrations table.
///
/// Columns are 1-based, matching spreadsheet numbering. No implementation
/// retries on its own; callers decide whether to re-attempt.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Append a row and return where it landed.
    async fn append(&self, cells: &[String]) -> Result<RowPosition>;

    /// Overwrite a single cell.
    async fn update(&self, position: RowPosition, column: u32, value: &str) -> Result<()>;

    /// Read a single cell back. Blank cells read as an empty string.
    async fn read(&self, position: RowPosition, column: u32) -> Result<String>;

    /// Short backend label for logs.
    fn backend_name(&self) -> &'static str;
}
