//! Chat messages held by the client.

use carelink_shared::protocol::{DeliveryStatus, MessagePayload, OutgoingMessage};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix of client-generated optimistic ids.
pub const TEMP_ID_PREFIX: &str = "temp_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    /// Unix milliseconds
    pub timestamp: i64,
    /// Explicit status when known; otherwise derived from the id shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DeliveryStatus>,
}

/// Body of a message the current user is about to send.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingDraft {
    pub content: Option<String>,
    pub file_url: Option<String>,
    pub file_type: Option<String>,
}

impl OutgoingDraft {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn file(file_url: impl Into<String>, file_type: impl Into<String>) -> Self {
        Self {
            content: None,
            file_url: Some(file_url.into()),
            file_type: Some(file_type.into()),
        }
    }
}

impl Message {
    /// New optimistic id, e.g. `temp_3f2a...`.
    pub fn temporary_id() -> String {
        format!("{TEMP_ID_PREFIX}{}", Uuid::new_v4().simple())
    }

    pub fn is_temporary(&self) -> bool {
        self.id.starts_with(TEMP_ID_PREFIX)
    }

    /// Whether the message was exchanged between `a` and `b`, in either direction.
    pub fn is_between(&self, a: &str, b: &str) -> bool {
        (self.sender_id == a && self.receiver_id == b)
            || (self.sender_id == b && self.receiver_id == a)
    }

    pub fn involves(&self, user_id: &str) -> bool {
        self.sender_id == user_id || self.receiver_id == user_id
    }

    /// The other side of the conversation from `user_id`'s point of view.
    pub fn peer_of(&self, user_id: &str) -> &str {
        if self.sender_id == user_id {
            &self.receiver_id
        } else {
            &self.sender_id
        }
    }

    /// Text used for previews and the CLI; attachments get a short label.
    pub fn display_text(&self) -> String {
        match (&self.content, &self.file_type) {
            (Some(content), _) if !content.is_empty() => content.clone(),
            (_, Some(file_type)) if file_type.starts_with("image/") => "[image]".to_string(),
            _ if self.file_url.is_some() => "[file]".to_string(),
            _ => String::new(),
        }
    }

    pub fn to_outgoing(&self) -> OutgoingMessage {
        OutgoingMessage {
            client_id: self.id.clone(),
            to: self.receiver_id.clone(),
            content: self.content.clone(),
            file_url: self.file_url.clone(),
            file_type: self.file_type.clone(),
            timestamp: self.timestamp,
        }
    }
}

impl From<MessagePayload> for Message {
    fn from(payload: MessagePayload) -> Self {
        Self {
            id: payload.id,
            sender_id: payload.sender_id,
            receiver_id: payload.receiver_id,
            content: payload.content,
            file_url: payload.file_url,
            file_type: payload.file_type,
            timestamp: payload.timestamp,
            status: payload.status,
        }
    }
}
