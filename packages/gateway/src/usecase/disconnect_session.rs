//! UseCase: session teardown

use std::sync::Arc;

use crate::domain::{MessagePusher, SessionId, UserId};

pub struct DisconnectSessionUseCase {
    message_pusher: Arc<dyn MessagePusher>,
}

impl DisconnectSessionUseCase {
    pub fn new(message_pusher: Arc<dyn MessagePusher>) -> Self {
        Self { message_pusher }
    }

    /// Unregister a session.
    ///
    /// Returns the user it belonged to and that user's remaining session count,
    /// or `None` if the session never registered.
    pub async fn execute(&self, session_id: &SessionId) -> Option<(UserId, usize)> {
        let user_id = self.message_pusher.unregister_session(session_id).await?;
        let remaining = self.message_pusher.session_count(&user_id).await;
        Some((user_id, remaining))
    }
}
