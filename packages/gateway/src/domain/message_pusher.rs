//! MessagePusher trait
//!
//! Delivers serialized events to the sessions registered under a user id.
//! The concrete transport lives in the infrastructure layer.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{
    error::MessagePushError,
    value_object::{SessionId, UserId},
};

/// Outbound channel of one session
pub type PusherChannel = mpsc::UnboundedSender<String>;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagePusher: Send + Sync {
    /// Associate a session with a user id
    async fn register_session(&self, user_id: UserId, session_id: SessionId, sender: PusherChannel);

    /// Forget a session, returning the user it was registered under
    async fn unregister_session(&self, session_id: &SessionId) -> Option<UserId>;

    /// Push to one specific session
    async fn push_to_session(
        &self,
        session_id: &SessionId,
        content: &str,
    ) -> Result<(), MessagePushError>;

    /// Push to every session of a user; returns how many sessions were reached
    async fn push_to_user(&self, user_id: &UserId, content: &str) -> usize;

    /// Number of sessions currently registered under a user
    async fn session_count(&self, user_id: &UserId) -> usize;
}
