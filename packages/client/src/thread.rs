//! Message Thread State Machine.
//!
//! One ordered log per conversation (current user, partner). Messages are kept
//! in ascending timestamp order; equal timestamps keep arrival order.

use carelink_shared::protocol::DeliveryStatus;
use tracing::{debug, warn};

use crate::domain::{Message, OutgoingDraft};

/// Delivery status of `message` given the peer's read watermark.
///
/// Explicit statuses win over the id-shape guess (optimistic id → `Sent`,
/// server id → `Delivered`). Anything that reached the gateway is upgraded
/// to `Read` once the watermark is strictly after the message timestamp.
pub fn status_of(message: &Message, peer_read_at: Option<i64>) -> DeliveryStatus {
    let base = message.status.unwrap_or(if message.is_temporary() {
        DeliveryStatus::Sent
    } else {
        DeliveryStatus::Delivered
    });

    match peer_read_at {
        Some(read_at) if base >= DeliveryStatus::Sent && read_at > message.timestamp => {
            DeliveryStatus::Read
        }
        _ => base,
    }
}

#[derive(Debug, Clone)]
pub struct MessageThread {
    current_user_id: String,
    partner_id: String,
    messages: Vec<Message>,
}

impl MessageThread {
    pub fn new(current_user_id: impl Into<String>, partner_id: impl Into<String>) -> Self {
        Self {
            current_user_id: current_user_id.into(),
            partner_id: partner_id.into(),
            messages: Vec::new(),
        }
    }

    pub fn partner_id(&self) -> &str {
        &self.partner_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, message_id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == message_id)
    }

    /// Most recent message; the last one wins among equal timestamps.
    pub fn latest(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Optimistically insert an outbound message under a fresh temporary id.
    pub fn append(&mut self, draft: OutgoingDraft, timestamp: i64) -> Message {
        let message = Message {
            id: Message::temporary_id(),
            sender_id: self.current_user_id.clone(),
            receiver_id: self.partner_id.clone(),
            content: draft.content,
            file_url: draft.file_url,
            file_type: draft.file_type,
            timestamp,
            status: None,
        };
        self.insert_sorted(message.clone());
        message
    }

    /// Insert a message delivered by the channel.
    ///
    /// Returns `false` when the message is already present or does not belong
    /// to this conversation.
    pub fn receive(&mut self, message: Message) -> bool {
        if !message.is_between(&self.current_user_id, &self.partner_id) {
            warn!(
                "Message '{}' ({} -> {}) does not belong to conversation with '{}'",
                message.id, message.sender_id, message.receiver_id, self.partner_id
            );
            return false;
        }
        if self.get(&message.id).is_some() {
            debug!("Duplicate message '{}' ignored", message.id);
            return false;
        }
        self.insert_sorted(message);
        true
    }

    /// Replace an optimistic message with the server-confirmed one.
    ///
    /// Returns `false` if `temp_id` was not found; the confirmed message is
    /// still inserted unless already present.
    pub fn confirm(&mut self, temp_id: &str, confirmed: Message) -> bool {
        let replaced = self.remove(temp_id).is_some();
        if !replaced {
            debug!("No optimistic message '{}' to confirm", temp_id);
        }
        self.receive(confirmed);
        replaced
    }

    pub fn delete(&mut self, message_id: &str) -> Option<Message> {
        self.remove(message_id)
    }

    pub fn set_status(&mut self, message_id: &str, status: Option<DeliveryStatus>) -> bool {
        match self.messages.iter_mut().find(|m| m.id == message_id) {
            Some(message) => {
                message.status = status;
                true
            }
            None => false,
        }
    }

    /// Own messages still waiting to reach the gateway.
    pub fn pending(&self) -> Vec<Message> {
        self.messages
            .iter()
            .filter(|m| m.status == Some(DeliveryStatus::Pending))
            .cloned()
            .collect()
    }

    /// Mark own messages sent strictly before `read_at` as read.
    pub fn apply_read_receipt(&mut self, read_at: i64) -> usize {
        let mut updated = 0;
        for message in self
            .messages
            .iter_mut()
            .filter(|m| m.sender_id == self.current_user_id && m.timestamp < read_at)
        {
            if status_of(message, None) != DeliveryStatus::Pending
                && message.status != Some(DeliveryStatus::Read)
            {
                message.status = Some(DeliveryStatus::Read);
                updated += 1;
            }
        }
        updated
    }

    fn remove(&mut self, message_id: &str) -> Option<Message> {
        let index = self.messages.iter().position(|m| m.id == message_id)?;
        Some(self.messages.remove(index))
    }

    fn insert_sorted(&mut self, message: Message) {
        let index = self
            .messages
            .partition_point(|m| m.timestamp <= message.timestamp);
        self.messages.insert(index, message);
    }
}
