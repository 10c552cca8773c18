//! Result types returned by the linking flows.

use crate::error::Result;
use crate::persistence::RowPosition;
use serde::{Deserialize, Serialize};

/// Acknowledgement of an accepted registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAck {
    pub reg_no: String,
    pub name: String,
    pub position: RowPosition,
}

impl PendingAck {
    pub fn message(&self) -> String {
        format!("Student {} registered. Waiting for RFID scan...", self.name)
    }
}

/// A card successfully written to a registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedCard {
    pub reg_no: String,
    /// Name as read back from the row store.
    pub name: String,
    pub rfid_uid: String,
}

impl LinkedCard {
    pub fn message(&self) -> String {
        format!("Card linked to {}", self.name)
    }
}

/// Outcome of one scan: linked, or the reason it was not.
pub type LinkOutcome = Result<LinkedCard>;

/// What a polling browser learns about its registration.
///
/// An unknown or already reported registration is not a status; the poll
/// fails with [`CardlinkError::SessionExpired`](crate::CardlinkError::SessionExpired).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Waiting,
    Linked,
    Timeout,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::Waiting => "waiting",
            LinkStatus::Linked => "linked",
            LinkStatus::Timeout => "timeout",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            LinkStatus::Waiting => "Still waiting for RFID scan...",
            LinkStatus::Linked => "Card linked successfully!",
            LinkStatus::Timeout => "Linking session timed out.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&LinkStatus::Timeout).unwrap(), "\"timeout\"");
        assert_eq!(LinkStatus::Linked.as_str(), "linked");
    }

    #[test]
    fn test_messages() {
        let ack = PendingAck {
            reg_no: "R1".into(),
            name: "Alice".into(),
            position: RowPosition(2),
        };
        assert_eq!(ack.message(), "Student Alice registered. Waiting for RFID scan...");

        let card = LinkedCard {
            reg_no: "R1".into(),
            name: "Alice".into(),
            rfid_uid: "UID123".into(),
        };
        assert_eq!(card.message(), "Card linked to Alice");
    }
}
