//! UseCase: how many sessions a user has open

use std::sync::Arc;

use crate::domain::{MessagePusher, UserId, ValueObjectError};

pub struct GetPresenceUseCase {
    message_pusher: Arc<dyn MessagePusher>,
}

impl GetPresenceUseCase {
    pub fn new(message_pusher: Arc<dyn MessagePusher>) -> Self {
        Self { message_pusher }
    }

    pub async fn execute(&self, raw_user_id: String) -> Result<(UserId, usize), ValueObjectError> {
        let user_id = UserId::try_from(raw_user_id)?;
        let sessions = self.message_pusher.session_count(&user_id).await;
        Ok((user_id, sessions))
    }
}
