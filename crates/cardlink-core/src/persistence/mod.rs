//! Row store abstraction for registration records.
//!
//! The registrations table is a flat sheet with one row per registration:
//! `[reg_no, name, rfid_uid, date_added]`. Backends hand out an opaque
//! [`RowPosition`] on append which later updates target directly.

mod memory;
mod sheets;
mod sqlite;
mod traits;

pub use memory::MemoryRowStore;
pub use sheets::{parse_updated_range, SheetsRowStore};
pub use sqlite::SqliteRowStore;
pub use traits::PersistenceGateway;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle to a record's location in the row store (a 1-based row index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowPosition(pub u32);

impl RowPosition {
    pub fn row(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for RowPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registration record as written on submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationRow {
    pub reg_no: String,
    pub name: String,
    pub rfid_uid: String,
    pub date_added: String,
}

impl RegistrationRow {
    /// A freshly submitted registration: the UID cell starts blank.
    pub fn pending(reg_no: &str, name: &str, date_added: impl Into<String>) -> Self {
        Self {
            reg_no: reg_no.to_string(),
            name: name.to_string(),
            rfid_uid: String::new(),
            date_added: date_added.into(),
        }
    }

    /// Cells in sheet column order.
    pub fn into_cells(self) -> Vec<String> {
        vec![self.reg_no, self.name, self.rfid_uid, self.date_added]
    }
}
