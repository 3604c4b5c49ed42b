//! WebSocket-backed MessagePusher.
//!
//! The UI layer owns the sockets; each socket's writer task drains an
//! `UnboundedSender<String>` registered here. This type only tracks which
//! session belongs to which user and fans events out.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{MessagePushError, MessagePusher, PusherChannel, SessionId, UserId};

struct SessionEntry {
    user_id: UserId,
    sender: PusherChannel,
}

#[derive(Default)]
struct Registry {
    sessions: HashMap<SessionId, SessionEntry>,
    by_user: HashMap<UserId, HashSet<SessionId>>,
}

/// MessagePusher over per-session WebSocket channels
///
/// ```ignore
/// let pusher = WebSocketMessagePusher::new();
/// pusher.register_session(user_id.clone(), SessionId::generate(), tx).await;
/// pusher.push_to_user(&user_id, r#"{"event":"registered","data":{"userId":"alice"}}"#).await;
/// ```
#[derive(Default)]
pub struct WebSocketMessagePusher {
    registry: Mutex<Registry>,
}

impl WebSocketMessagePusher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessagePusher for WebSocketMessagePusher {
    async fn register_session(&self, user_id: UserId, session_id: SessionId, sender: PusherChannel) {
        let mut registry = self.registry.lock().await;
        registry
            .by_user
            .entry(user_id.clone())
            .or_default()
            .insert(session_id.clone());
        registry.sessions.insert(
            session_id.clone(),
            SessionEntry {
                user_id: user_id.clone(),
                sender,
            },
        );
        tracing::debug!("Session '{}' registered under '{}'", session_id, user_id);
    }

    async fn unregister_session(&self, session_id: &SessionId) -> Option<UserId> {
        let mut registry = self.registry.lock().await;
        let entry = registry.sessions.remove(session_id)?;

        if let Some(sessions) = registry.by_user.get_mut(&entry.user_id) {
            sessions.remove(session_id);
            if sessions.is_empty() {
                registry.by_user.remove(&entry.user_id);
            }
        }
        tracing::debug!(
            "Session '{}' unregistered from '{}'",
            session_id,
            entry.user_id
        );
        Some(entry.user_id)
    }

    async fn push_to_session(
        &self,
        session_id: &SessionId,
        content: &str,
    ) -> Result<(), MessagePushError> {
        let registry = self.registry.lock().await;
        let entry = registry
            .sessions
            .get(session_id)
            .ok_or_else(|| MessagePushError::SessionNotFound(session_id.to_string()))?;

        entry
            .sender
            .send(content.to_string())
            .map_err(|e| MessagePushError::PushFailed(e.to_string()))
    }

    async fn push_to_user(&self, user_id: &UserId, content: &str) -> usize {
        let registry = self.registry.lock().await;
        let Some(session_ids) = registry.by_user.get(user_id) else {
            tracing::debug!("No sessions registered under '{}'", user_id);
            return 0;
        };

        let mut reached = 0;
        for session_id in session_ids {
            let Some(entry) = registry.sessions.get(session_id) else {
                continue;
            };
            // a closed session is tolerated; its socket task will unregister it
            match entry.sender.send(content.to_string()) {
                Ok(()) => reached += 1,
                Err(e) => tracing::warn!(
                    "Failed to push to session '{}' of '{}': {}",
                    session_id,
                    user_id,
                    e
                ),
            }
        }
        reached
    }

    async fn session_count(&self, user_id: &UserId) -> usize {
        let registry = self.registry.lock().await;
        registry.by_user.get(user_id).map_or(0, HashSet::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn user(id: &str) -> UserId {
        UserId::new(id.to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_push_to_user_reaches_every_session() {
        // テスト項目: 同じユーザーの全セッションにメッセージが届く
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        pusher
            .register_session(user("alice"), SessionId::generate(), tx1)
            .await;
        pusher
            .register_session(user("alice"), SessionId::generate(), tx2)
            .await;

        // when (操作):
        let reached = pusher.push_to_user(&user("alice"), "Hello").await;

        // then (期待する結果):
        assert_eq!(reached, 2);
        assert_eq!(rx1.recv().await, Some("Hello".to_string()));
        assert_eq!(rx2.recv().await, Some("Hello".to_string()));
    }

    #[tokio::test]
    async fn test_push_to_unknown_user_reaches_nobody() {
        // テスト項目: 未登録ユーザーへの送信は 0 セッション
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();

        // when (操作):
        let reached = pusher.push_to_user(&user("ghost"), "Hello").await;

        // then (期待する結果):
        assert_eq!(reached, 0);
    }

    #[tokio::test]
    async fn test_closed_session_is_skipped() {
        // テスト項目: 受信側が閉じたセッションは到達数に含まれない
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();
        let (tx1, rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        pusher
            .register_session(user("bob"), SessionId::generate(), tx1)
            .await;
        pusher
            .register_session(user("bob"), SessionId::generate(), tx2)
            .await;
        drop(rx1);

        // when (操作):
        let reached = pusher.push_to_user(&user("bob"), "Hi").await;

        // then (期待する結果):
        assert_eq!(reached, 1);
        assert_eq!(rx2.recv().await, Some("Hi".to_string()));
    }

    #[tokio::test]
    async fn test_unregister_session_cleans_user_index() {
        // テスト項目: 最後のセッションを解除するとユーザーの索引も消える
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();
        let session = SessionId::generate();
        let (tx, _rx) = mpsc::unbounded_channel();
        pusher
            .register_session(user("carol"), session.clone(), tx)
            .await;

        // when (操作):
        let removed = pusher.unregister_session(&session).await;

        // then (期待する結果):
        assert_eq!(removed, Some(user("carol")));
        assert_eq!(pusher.session_count(&user("carol")).await, 0);
        assert_eq!(pusher.unregister_session(&session).await, None);
    }

    #[tokio::test]
    async fn test_push_to_session_not_found() {
        // テスト項目: 存在しないセッションへの送信はエラーを返す
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();

        // when (操作):
        let result = pusher
            .push_to_session(&SessionId::generate(), "Hello")
            .await;

        // then (期待する結果):
        assert!(matches!(result, Err(MessagePushError::SessionNotFound(_))));
    }
}
