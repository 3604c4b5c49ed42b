//! UseCase: relay a read receipt to the peer whose messages were read

use std::sync::Arc;

use carelink_shared::protocol::{ReadMarker, ReadReceipt, ServerEvent};

use crate::domain::{MessagePusher, UserId};

use super::error::RelayError;

pub struct RelayReadUseCase {
    message_pusher: Arc<dyn MessagePusher>,
}

impl RelayReadUseCase {
    pub fn new(message_pusher: Arc<dyn MessagePusher>) -> Self {
        Self { message_pusher }
    }

    /// `reader` has read `marker.peer`'s messages up to `marker.read_at`.
    ///
    /// Returns the number of peer sessions reached.
    pub async fn execute(&self, reader: &UserId, marker: ReadMarker) -> Result<usize, RelayError> {
        let peer = UserId::try_from(marker.peer).map_err(RelayError::InvalidRecipient)?;
        let json = ServerEvent::MessageRead(ReadReceipt {
            from: reader.as_str().to_string(),
            read_at: Some(marker.read_at),
        })
        .to_json()
        .map_err(|e| RelayError::Encode(e.to_string()))?;

        Ok(self.message_pusher.push_to_user(&peer, &json).await)
    }
}
