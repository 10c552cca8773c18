//! Centralized configuration for Cardlink.
//!
//! Defaults live here as associated constants; the server binary overrides
//! the tunable ones from the command line.

use std::time::Duration;

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "Cardlink";
    pub const USER_AGENT: &'static str = "Cardlink/0.1";
}

/// Linking protocol configuration.
pub struct LinkingConfig;

impl LinkingConfig {
    /// How long a registration waits for a card before it times out.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
    /// Background sweep interval. Zero disables the sweep; expiry stays lazy.
    pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::ZERO;
    /// Format of the "date added" cell written on registration.
    pub const DATE_FORMAT: &'static str = "%Y-%m-%d %H:%M:%S";
}

/// Row layout of the registrations sheet (1-based columns).
pub struct SheetConfig;

impl SheetConfig {
    pub const REG_NO_COLUMN: u32 = 1;
    pub const NAME_COLUMN: u32 = 2;
    pub const RFID_UID_COLUMN: u32 = 3;
    pub const DATE_ADDED_COLUMN: u32 = 4;
    pub const COLUMN_COUNT: u32 = 4;

    pub const DEFAULT_WORKSHEET: &'static str = "Students";
    pub const SHEETS_API_BASE: &'static str = "https://sheets.googleapis.com/v4/spreadsheets";
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
    pub const ACCESS_TOKEN_ENV: &'static str = "CARDLINK_SHEETS_TOKEN";
}

/// HTTP surface configuration.
pub struct ServerConfig;

impl ServerConfig {
    pub const DEFAULT_HOST: &'static str = "0.0.0.0";
    pub const DEFAULT_PORT: u16 = 5000;
    pub const SESSION_COOKIE: &'static str = "cardlink_session";
    pub const DEFAULT_SQLITE_FILE: &'static str = "cardlink.db";
}

/// Convert a 1-based column number to its spreadsheet letter (1 -> A).
pub fn column_letter(column: u32) -> Option<char> {
    if (1..=26).contains(&column) {
        char::from_u32('A' as u32 + column - 1)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letter(SheetConfig::REG_NO_COLUMN), Some('A'));
        assert_eq!(column_letter(SheetConfig::RFID_UID_COLUMN), Some('C'));
        assert_eq!(column_letter(SheetConfig::DATE_ADDED_COLUMN), Some('D'));
        assert_eq!(column_letter(0), None);
        assert_eq!(column_letter(27), None);
    }

    #[test]
    fn test_timeouts_are_reasonable() {
        assert_eq!(LinkingConfig::DEFAULT_TIMEOUT, Duration::from_secs(300));
        assert!(SheetConfig::REQUEST_TIMEOUT > Duration::ZERO);
    }
}
