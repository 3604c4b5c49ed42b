//! UseCase: register a session under a user id

use std::sync::Arc;

use crate::domain::{MessagePusher, PusherChannel, SessionId, UserId};

use super::error::RegisterError;

pub struct RegisterSessionUseCase {
    message_pusher: Arc<dyn MessagePusher>,
}

impl RegisterSessionUseCase {
    pub fn new(message_pusher: Arc<dyn MessagePusher>) -> Self {
        Self { message_pusher }
    }

    /// Register `session_id` under `raw_user_id`.
    ///
    /// # Returns
    ///
    /// * `Ok((UserId, usize))` - the validated id and how many sessions the user now has
    /// * `Err(RegisterError)` - the id was rejected
    pub async fn execute(
        &self,
        raw_user_id: String,
        session_id: SessionId,
        sender: PusherChannel,
    ) -> Result<(UserId, usize), RegisterError> {
        let user_id = UserId::try_from(raw_user_id)?;
        self.message_pusher
            .register_session(user_id.clone(), session_id, sender)
            .await;
        let sessions = self.message_pusher.session_count(&user_id).await;
        Ok((user_id, sessions))
    }
}
