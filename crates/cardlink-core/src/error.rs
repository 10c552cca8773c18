//! Error types for Cardlink.
//!
//! Every failure the linking flows can report maps to one variant here. The
//! server layer turns these into JSON bodies and status codes.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the Cardlink library.
#[derive(Debug, Error)]
pub enum CardlinkError {
    // Input errors
    #[error("{message}")]
    InvalidInput { message: String },

    // Row store errors
    #[error("Could not connect to database: {message}")]
    PersistenceUnavailable { message: String },

    #[error("Failed to update database. Error: {message}")]
    PersistenceWriteFailed { message: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // Linking protocol errors
    #[error("No active linking session found.")]
    NoActiveSession,

    #[error("Session expired or invalid.")]
    SessionExpired,

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias for Cardlink operations.
pub type Result<T> = std::result::Result<T, CardlinkError>;

/// Coarse error classification used by callers that map errors to responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    PersistenceUnavailable,
    PersistenceWriteFailed,
    NoActiveSession,
    SessionExpired,
    Internal,
}

impl From<std::io::Error> for CardlinkError {
    fn from(err: std::io::Error) -> Self {
        CardlinkError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for CardlinkError {
    fn from(err: serde_json::Error) -> Self {
        CardlinkError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for CardlinkError {
    fn from(err: rusqlite::Error) -> Self {
        CardlinkError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for CardlinkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            CardlinkError::PersistenceUnavailable {
                message: err.to_string(),
            }
        } else {
            CardlinkError::PersistenceWriteFailed {
                message: err.to_string(),
            }
        }
    }
}

impl CardlinkError {
    /// Create an invalid-input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        CardlinkError::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a row store write error.
    pub fn write_failed(message: impl Into<String>) -> Self {
        CardlinkError::PersistenceWriteFailed {
            message: message.into(),
        }
    }

    /// Create a row store connectivity error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        CardlinkError::PersistenceUnavailable {
            message: message.into(),
        }
    }

    /// Classify this error.
    ///
    /// Local database failures and undecodable row store replies count as
    /// write failures: from the caller's point of view the row store rejected
    /// the operation.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CardlinkError::InvalidInput { .. } => ErrorKind::InvalidInput,
            CardlinkError::PersistenceUnavailable { .. } => ErrorKind::PersistenceUnavailable,
            CardlinkError::PersistenceWriteFailed { .. }
            | CardlinkError::Database { .. }
            | CardlinkError::Json { .. } => ErrorKind::PersistenceWriteFailed,
            CardlinkError::NoActiveSession => ErrorKind::NoActiveSession,
            CardlinkError::SessionExpired => ErrorKind::SessionExpired,
            CardlinkError::Io { .. } | CardlinkError::Config { .. } => ErrorKind::Internal,
        }
    }

    /// Whether the caller may reasonably re-attempt the same request.
    ///
    /// Nothing retries automatically; this only informs the response.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::PersistenceUnavailable | ErrorKind::PersistenceWriteFailed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            CardlinkError::NoActiveSession.to_string(),
            "No active linking session found."
        );
        assert_eq!(
            CardlinkError::write_failed("quota exceeded").to_string(),
            "Failed to update database. Error: quota exceeded"
        );
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            CardlinkError::invalid_input("missing").kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            CardlinkError::from(rusqlite::Error::InvalidQuery).kind(),
            ErrorKind::PersistenceWriteFailed
        );
        assert_eq!(CardlinkError::SessionExpired.kind(), ErrorKind::SessionExpired);

        let bad_json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(
            CardlinkError::from(bad_json).kind(),
            ErrorKind::PersistenceWriteFailed
        );
    }

    #[test]
    fn test_retryable_errors() {
        assert!(CardlinkError::unavailable("offline").is_retryable());
        assert!(CardlinkError::write_failed("rejected").is_retryable());
        assert!(!CardlinkError::NoActiveSession.is_retryable());
        assert!(!CardlinkError::invalid_input("blank").is_retryable());
    }
}
