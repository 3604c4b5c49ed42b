//! UseCase: authoritative message deletion
//!
//! Only the original sender may delete. Both parties' sessions are told.

use std::sync::Arc;

use carelink_shared::protocol::{DeleteRequest, DeletedNotice, ServerEvent};

use crate::domain::{MessageId, MessageLedger, MessagePusher, UserId};

use super::error::DeleteError;

pub struct DeleteMessageUseCase {
    message_pusher: Arc<dyn MessagePusher>,
    ledger: Arc<dyn MessageLedger>,
}

impl DeleteMessageUseCase {
    pub fn new(message_pusher: Arc<dyn MessagePusher>, ledger: Arc<dyn MessageLedger>) -> Self {
        Self {
            message_pusher,
            ledger,
        }
    }

    pub async fn execute(
        &self,
        requester: &UserId,
        request: DeleteRequest,
    ) -> Result<DeletedNotice, DeleteError> {
        let id = MessageId::from_wire(request.id);
        let entry = self
            .ledger
            .find(&id)
            .await
            .ok_or_else(|| DeleteError::NotFound(id.as_str().to_string()))?;

        if !entry.is_deletable_by(requester) {
            return Err(DeleteError::NotOwner {
                message_id: id.into_string(),
                requester: requester.as_str().to_string(),
            });
        }

        let entry = self
            .ledger
            .remove(&id)
            .await
            .map_err(|_| DeleteError::NotFound(id.as_str().to_string()))?;

        let notice = DeletedNotice {
            id: entry.id.into_string(),
            by: requester.as_str().to_string(),
        };
        let json = ServerEvent::MessageDeleted(notice.clone())
            .to_json()
            .map_err(|e| DeleteError::Encode(e.to_string()))?;

        self.message_pusher.push_to_user(&entry.receiver, &json).await;
        self.message_pusher.push_to_user(requester, &json).await;

        Ok(notice)
    }
}
