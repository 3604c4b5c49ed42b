//! UseCase: relay a chat message
//!
//! ### What is tested
//! - the server assigns its own id and timestamp
//! - the receiver gets `receive_message`, every sender session gets `message_ack`
//! - the ack status is `delivered` only if a receiver session was reached
//! - empty messages and invalid recipients are rejected before anything is pushed

use std::sync::Arc;

use carelink_shared::{
    protocol::{DeliveryStatus, MessageAck, MessagePayload, OutgoingMessage, ServerEvent},
    time::Clock,
};

use crate::domain::{LedgerEntry, MessageId, MessageLedger, MessagePusher, Timestamp, UserId};

use super::error::RelayError;

pub struct RelayMessageUseCase {
    message_pusher: Arc<dyn MessagePusher>,
    ledger: Arc<dyn MessageLedger>,
    clock: Arc<dyn Clock>,
}

impl RelayMessageUseCase {
    pub fn new(
        message_pusher: Arc<dyn MessagePusher>,
        ledger: Arc<dyn MessageLedger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            message_pusher,
            ledger,
            clock,
        }
    }

    /// Relay `outgoing` from `sender` to its recipient.
    ///
    /// # Returns
    ///
    /// * `Ok(MessageAck)` - the ack that was pushed to the sender's sessions
    /// * `Err(RelayError)` - nothing was relayed
    pub async fn execute(
        &self,
        sender: &UserId,
        outgoing: OutgoingMessage,
    ) -> Result<MessageAck, RelayError> {
        let receiver =
            UserId::try_from(outgoing.to.clone()).map_err(RelayError::InvalidRecipient)?;

        let has_content = outgoing
            .content
            .as_deref()
            .is_some_and(|content| !content.trim().is_empty());
        if !has_content && outgoing.file_url.is_none() {
            return Err(RelayError::EmptyMessage);
        }

        let id = MessageId::generate();
        let timestamp = Timestamp::new(self.clock.now_millis());

        let mut payload = MessagePayload {
            id: id.as_str().to_string(),
            sender_id: sender.as_str().to_string(),
            receiver_id: receiver.as_str().to_string(),
            content: outgoing.content,
            file_url: outgoing.file_url,
            file_type: outgoing.file_type,
            timestamp: timestamp.value(),
            status: None,
        };

        let receive_json = ServerEvent::ReceiveMessage(payload.clone())
            .to_json()
            .map_err(|e| RelayError::Encode(e.to_string()))?;

        self.ledger
            .record(LedgerEntry::new(
                id,
                sender.clone(),
                receiver.clone(),
                timestamp,
            ))
            .await;

        let reached = self
            .message_pusher
            .push_to_user(&receiver, &receive_json)
            .await;

        payload.status = Some(if reached > 0 {
            DeliveryStatus::Delivered
        } else {
            DeliveryStatus::Sent
        });
        let ack = MessageAck {
            client_id: outgoing.client_id,
            message: payload,
        };
        let ack_json = ServerEvent::MessageAck(ack.clone())
            .to_json()
            .map_err(|e| RelayError::Encode(e.to_string()))?;
        self.message_pusher.push_to_user(sender, &ack_json).await;

        tracing::debug!(
            "Relayed '{}' from '{}' to '{}' ({} session(s))",
            ack.message.id,
            sender,
            receiver,
            reached
        );

        Ok(ack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::message_pusher::MockMessagePusher,
        infrastructure::repository::InMemoryMessageLedger,
    };
    use carelink_shared::time::FixedClock;
    use mockall::predicate::{always, eq};

    fn user(id: &str) -> UserId {
        UserId::new(id.to_string()).unwrap()
    }

    fn outgoing(to: &str, content: Option<&str>) -> OutgoingMessage {
        OutgoingMessage {
            client_id: "temp_123".to_string(),
            to: to.to_string(),
            content: content.map(str::to_string),
            file_url: None,
            file_type: None,
            timestamp: 500,
        }
    }

    #[tokio::test]
    async fn test_relay_to_online_receiver_is_delivered() {
        // テスト項目: 受信者がオンラインなら ack は delivered になる
        // given (前提条件):
        let mut pusher = MockMessagePusher::new();
        pusher
            .expect_push_to_user()
            .with(eq(user("bob")), always())
            .times(1)
            .returning(|_, _| 2);
        pusher
            .expect_push_to_user()
            .with(eq(user("alice")), always())
            .times(1)
            .returning(|_, _| 1);
        let ledger = Arc::new(InMemoryMessageLedger::new(10));
        let usecase = RelayMessageUseCase::new(
            Arc::new(pusher),
            ledger.clone(),
            Arc::new(FixedClock::new(42_000)),
        );

        // when (操作):
        let ack = usecase
            .execute(&user("alice"), outgoing("bob", Some("Hi")))
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(ack.client_id, "temp_123");
        assert!(ack.message.id.starts_with(MessageId::PREFIX));
        assert_eq!(ack.message.timestamp, 42_000);
        assert_eq!(ack.message.status, Some(DeliveryStatus::Delivered));
        assert_eq!(ledger.count().await, 1);
    }

    #[tokio::test]
    async fn test_relay_to_offline_receiver_is_sent() {
        // テスト項目: 受信者がオフラインなら ack は sent になる
        // given (前提条件):
        let mut pusher = MockMessagePusher::new();
        pusher
            .expect_push_to_user()
            .with(eq(user("bob")), always())
            .returning(|_, _| 0);
        pusher
            .expect_push_to_user()
            .with(eq(user("alice")), always())
            .returning(|_, _| 1);
        let usecase = RelayMessageUseCase::new(
            Arc::new(pusher),
            Arc::new(InMemoryMessageLedger::new(10)),
            Arc::new(FixedClock::new(1)),
        );

        // when (操作):
        let ack = usecase
            .execute(&user("alice"), outgoing("bob", Some("Hi")))
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(ack.message.status, Some(DeliveryStatus::Sent));
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected() {
        // テスト項目: 本文も添付もないメッセージは何も送信されずエラーになる
        // given (前提条件):
        let mut pusher = MockMessagePusher::new();
        pusher.expect_push_to_user().never();
        let usecase = RelayMessageUseCase::new(
            Arc::new(pusher),
            Arc::new(InMemoryMessageLedger::new(10)),
            Arc::new(FixedClock::new(1)),
        );

        // when (操作):
        let result = usecase
            .execute(&user("alice"), outgoing("bob", Some("   ")))
            .await;

        // then (期待する結果):
        assert_eq!(result, Err(RelayError::EmptyMessage));
    }

    #[tokio::test]
    async fn test_invalid_recipient_is_rejected() {
        // テスト項目: 宛先が空のメッセージはエラーになる
        // given (前提条件):
        let mut pusher = MockMessagePusher::new();
        pusher.expect_push_to_user().never();
        let usecase = RelayMessageUseCase::new(
            Arc::new(pusher),
            Arc::new(InMemoryMessageLedger::new(10)),
            Arc::new(FixedClock::new(1)),
        );

        // when (操作):
        let result = usecase
            .execute(&user("alice"), outgoing("", Some("Hi")))
            .await;

        // then (期待する結果):
        assert!(matches!(result, Err(RelayError::InvalidRecipient(_))));
    }
}
