//! Entities.

use super::value_object::{MessageId, Timestamp, UserId};

/// What the gateway remembers about a message it relayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub id: MessageId,
    pub sender: UserId,
    pub receiver: UserId,
    pub timestamp: Timestamp,
}

impl LedgerEntry {
    pub fn new(id: MessageId, sender: UserId, receiver: UserId, timestamp: Timestamp) -> Self {
        Self {
            id,
            sender,
            receiver,
            timestamp,
        }
    }

    /// Only the original sender may delete a message.
    pub fn is_deletable_by(&self, user: &UserId) -> bool {
        &self.sender == user
    }
}
