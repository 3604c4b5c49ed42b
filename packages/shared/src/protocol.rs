//! Realtime channel wire protocol.
//!
//! Every frame is a JSON text message of the form
//! `{"event": "<name>", "data": <payload>}`.

use serde::{Deserialize, Serialize};

/// Delivery status of an outbound message.
///
/// Ordered so that a later stage compares greater than an earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// Queued locally, not yet handed to the gateway
    Pending,
    /// Accepted by the gateway
    Sent,
    /// Pushed to at least one of the recipient's sessions
    Delivered,
    /// Read by the recipient
    Read,
}

/// A chat message as it travels over the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub id: String,
    /// Missing sender ids decode to an empty string and are rejected by the handler.
    #[serde(default, alias = "from")]
    pub sender_id: String,
    #[serde(default, alias = "to")]
    pub receiver_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    /// Unix milliseconds
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DeliveryStatus>,
}

/// Outbound message submitted by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    /// Optimistic id assigned by the client
    pub client_id: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadMarker {
    pub peer: String,
    pub read_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRequest {
    pub id: String,
    pub peer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredAck {
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageAck {
    pub client_id: String,
    pub message: MessagePayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    #[serde(default, alias = "senderId")]
    pub from: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedNotice {
    pub id: String,
    pub by: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorNotice {
    pub message: String,
}

/// Events sent from a client session to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    Register(String),
    SendMessage(OutgoingMessage),
    MarkRead(ReadMarker),
    DeleteMessage(DeleteRequest),
}

/// Events relayed from the gateway to a client session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    Registered(RegisteredAck),
    ReceiveMessage(MessagePayload),
    MessageAck(MessageAck),
    MessageRead(ReadReceipt),
    MessageDeleted(DeletedNotice),
    Error(ErrorNotice),
}

impl ClientEvent {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

impl ServerEvent {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Wire name of the event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Registered(_) => "registered",
            ServerEvent::ReceiveMessage(_) => "receive_message",
            ServerEvent::MessageAck(_) => "message_ack",
            ServerEvent::MessageRead(_) => "message_read",
            ServerEvent::MessageDeleted(_) => "message_deleted",
            ServerEvent::Error(_) => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_event_carries_plain_user_id() {
        // テスト項目: register イベントのペイロードがユーザー ID 文字列になる
        // given (前提条件):
        let event = ClientEvent::Register("alice".to_string());

        // when (操作):
        let json = event.to_json().unwrap();

        // then (期待する結果):
        assert_eq!(json, r#"{"event":"register","data":"alice"}"#);
    }

    #[test]
    fn test_receive_message_accepts_from_alias() {
        // テスト項目: receive_message の送信者は from / senderId のどちらでも受け付ける
        // given (前提条件):
        let with_from = r#"{"event":"receive_message","data":{"id":"m1","from":"alice","receiverId":"bob","content":"Hi","timestamp":1000}}"#;
        let with_sender_id = r#"{"event":"receive_message","data":{"id":"m1","senderId":"alice","receiverId":"bob","content":"Hi","timestamp":1000}}"#;

        // when (操作):
        let a = ServerEvent::from_json(with_from).unwrap();
        let b = ServerEvent::from_json(with_sender_id).unwrap();

        // then (期待する結果):
        assert_eq!(a, b);
        match a {
            ServerEvent::ReceiveMessage(message) => {
                assert_eq!(message.sender_id, "alice");
                assert_eq!(message.content.as_deref(), Some("Hi"));
                assert_eq!(message.status, None);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_receive_message_without_sender_decodes_to_empty() {
        // テスト項目: senderId が欠けた receive_message は空の送信者としてデコードされる
        // given (前提条件):
        let text = r#"{"event":"receive_message","data":{"id":"m1","receiverId":"bob","timestamp":1000}}"#;

        // when (操作):
        let event = ServerEvent::from_json(text).unwrap();

        // then (期待する結果):
        match event {
            ServerEvent::ReceiveMessage(message) => assert!(message.sender_id.is_empty()),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_message_read_accepts_sender_id_alias() {
        // テスト項目: message_read は senderId エイリアスを受け付ける
        // given (前提条件):
        let text = r#"{"event":"message_read","data":{"senderId":"alice"}}"#;

        // when (操作):
        let event = ServerEvent::from_json(text).unwrap();

        // then (期待する結果):
        assert_eq!(
            event,
            ServerEvent::MessageRead(ReadReceipt {
                from: "alice".to_string(),
                read_at: None,
            })
        );
        assert_eq!(event.name(), "message_read");
    }

    #[test]
    fn test_delivery_status_ordering() {
        // テスト項目: 配送ステータスは段階順に比較できる
        // given (前提条件):
        let statuses = [
            DeliveryStatus::Read,
            DeliveryStatus::Pending,
            DeliveryStatus::Delivered,
            DeliveryStatus::Sent,
        ];

        // when (操作):
        let max = statuses.iter().max().copied();
        let min = statuses.iter().min().copied();

        // then (期待する結果):
        assert_eq!(max, Some(DeliveryStatus::Read));
        assert_eq!(min, Some(DeliveryStatus::Pending));
    }

    #[test]
    fn test_unknown_event_is_rejected() {
        // テスト項目: 未知のイベント名はデコードエラーになる
        // given (前提条件):
        let text = r#"{"event":"typing","data":{"from":"alice"}}"#;

        // when (操作):
        let result = ServerEvent::from_json(text);

        // then (期待する結果):
        assert!(result.is_err());
    }
}
