//! Notification Badge Propagation.
//!
//! Badges never own counts: they watch the one shared [`UnreadStore`] and
//! re-render when it changes.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

use crate::domain::Message;
use crate::unread::{UnreadState, UnreadStore};

const BADGE_OVERFLOW: u64 = 99;

/// Text for a badge, or `None` when no badge should be shown.
pub fn badge_label(count: u64) -> Option<String> {
    match count {
        0 => None,
        n if n > BADGE_OVERFLOW => Some(format!("{BADGE_OVERFLOW}+")),
        n => Some(n.to_string()),
    }
}

/// Total unread across all senders.
#[derive(Debug, Clone)]
pub struct TotalBadge {
    rx: watch::Receiver<UnreadState>,
}

impl TotalBadge {
    pub fn new(store: &UnreadStore) -> Self {
        Self {
            rx: store.subscribe(),
        }
    }

    pub fn current(&self) -> u64 {
        self.rx.borrow().values().map(|c| u64::from(*c)).sum()
    }

    pub fn label(&self) -> Option<String> {
        badge_label(self.current())
    }

    /// Counts behind the total, keyed by sender.
    pub fn per_sender(&self) -> UnreadState {
        self.rx.borrow().clone()
    }

    /// Wait for the next change; `None` once the store is gone.
    pub async fn changed(&mut self) -> Option<u64> {
        self.rx.changed().await.ok()?;
        Some(self.current())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityItem {
    pub message_id: String,
    pub sender_id: String,
    pub preview: String,
    pub timestamp: i64,
}

/// Per-sender notification dropdown: recent inbound activity plus counts
/// read from the shared unread store.
///
/// Fed by the chat service with messages it has already accepted and counted,
/// so the activity list and the unread counts never disagree.
pub struct NotificationCenter {
    current_user_id: String,
    unread: Arc<UnreadStore>,
    capacity: usize,
    recent: Mutex<VecDeque<ActivityItem>>,
}

impl NotificationCenter {
    pub fn new(current_user_id: impl Into<String>, unread: Arc<UnreadStore>, capacity: usize) -> Self {
        Self {
            current_user_id: current_user_id.into(),
            unread,
            capacity,
            recent: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Record an inbound message from another user. Returns whether it was recorded.
    pub fn record(&self, message: &Message) -> bool {
        if message.sender_id.is_empty() || message.sender_id == self.current_user_id {
            return false;
        }

        let mut recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
        if recent.iter().any(|item| item.message_id == message.id) {
            return false;
        }
        recent.push_front(ActivityItem {
            message_id: message.id.clone(),
            sender_id: message.sender_id.clone(),
            preview: message.display_text(),
            timestamp: message.timestamp,
        });
        recent.truncate(self.capacity);
        true
    }

    /// Newest first. Senders with nothing unread are left out.
    pub fn recent(&self) -> Vec<ActivityItem> {
        let recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
        recent
            .iter()
            .filter(|item| self.unread.has_unread(&item.sender_id))
            .cloned()
            .collect()
    }

    pub fn unread_for(&self, sender_id: &str) -> u32 {
        self.unread.count(sender_id)
    }

    pub fn total(&self) -> u64 {
        self.unread.total()
    }

    /// Clear a sender's activity and unread count.
    pub fn dismiss(&self, sender_id: &str) {
        let mut recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
        recent.retain(|item| item.sender_id != sender_id);
        drop(recent);
        self.unread.reset(Some(sender_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inbound(id: &str, from: &str, content: &str, timestamp: i64) -> Message {
        Message {
            id: id.to_string(),
            sender_id: from.to_string(),
            receiver_id: "me".to_string(),
            content: Some(content.to_string()),
            file_url: None,
            file_type: None,
            timestamp,
            status: None,
        }
    }

    #[test]
    fn test_badge_label() {
        // テスト項目: 0 は非表示、99 を超えると 99+ になる
        // given (前提条件):
        // when (操作):
        // then (期待する結果):
        assert_eq!(badge_label(0), None);
        assert_eq!(badge_label(7).as_deref(), Some("7"));
        assert_eq!(badge_label(99).as_deref(), Some("99"));
        assert_eq!(badge_label(100).as_deref(), Some("99+"));
    }

    #[test]
    fn test_badges_agree_with_store() {
        // テスト項目: 合計バッジと通知センターが同一ストアの値を反映する
        // given (前提条件):
        let store = Arc::new(UnreadStore::new());
        let total = TotalBadge::new(&store);
        let center = NotificationCenter::new("me", Arc::clone(&store), 10);

        // when (操作):
        store.increment("alice");
        store.increment("alice");
        store.increment("bob");

        // then (期待する結果):
        assert_eq!(total.current(), 3);
        assert_eq!(center.unread_for("alice"), 2);
        assert_eq!(center.total(), total.current());
    }

    #[tokio::test]
    async fn test_total_badge_wakes_on_change() {
        // テスト項目: ストアの更新で合計バッジが再計算される
        // given (前提条件):
        let store = UnreadStore::new();
        let mut total = TotalBadge::new(&store);

        // when (操作):
        store.increment("alice");
        let value = total.changed().await;

        // then (期待する結果):
        assert_eq!(value, Some(1));
        assert_eq!(total.label().as_deref(), Some("1"));
    }

    #[test]
    fn test_notification_center_records_inbound_from_others_only() {
        // テスト項目: 他ユーザーからの受信メッセージのみ通知として記録され、容量を超えると古いものから消える
        // given (前提条件):
        let store = Arc::new(UnreadStore::new());
        store.increment("alice");
        store.increment("bob");
        let center = NotificationCenter::new("me", store, 2);

        // when (操作):
        assert!(center.record(&inbound("m1", "alice", "one", 1)));
        assert!(!center.record(&inbound("m2", "me", "echo", 2)));
        assert!(center.record(&inbound("m3", "bob", "two", 3)));
        assert!(center.record(&inbound("m4", "alice", "three", 4)));

        // then (期待する結果):
        let previews: Vec<String> = center.recent().into_iter().map(|i| i.preview).collect();
        assert_eq!(previews, vec!["three", "two"]);
    }

    #[test]
    fn test_same_message_is_recorded_once() {
        // テスト項目: 同じ ID のメッセージは一度だけ記録される
        // given (前提条件):
        let store = Arc::new(UnreadStore::new());
        store.increment("alice");
        let center = NotificationCenter::new("me", store, 10);

        // when (操作):
        let first = center.record(&inbound("m1", "alice", "hi", 1));
        let second = center.record(&inbound("m1", "alice", "hi", 1));

        // then (期待する結果):
        assert!(first);
        assert!(!second);
        assert_eq!(center.recent().len(), 1);
    }

    #[test]
    fn test_activity_hidden_once_sender_is_read() {
        // テスト項目: 未読が無くなった送信者の通知は表示されない
        // given (前提条件):
        let store = Arc::new(UnreadStore::new());
        store.increment("alice");
        store.increment("bob");
        let center = NotificationCenter::new("me", Arc::clone(&store), 10);
        center.record(&inbound("m1", "alice", "hi", 1));
        center.record(&inbound("m2", "bob", "yo", 2));

        // when (操作):
        store.mark_read("alice");

        // then (期待する結果):
        let senders: Vec<String> = center.recent().into_iter().map(|i| i.sender_id).collect();
        assert_eq!(senders, vec!["bob"]);
    }

    #[test]
    fn test_dismiss_clears_activity_and_unread() {
        // テスト項目: dismiss は対象送信者の通知と未読数を消す
        // given (前提条件):
        let store = Arc::new(UnreadStore::new());
        store.increment("alice");
        store.increment("bob");
        let center = NotificationCenter::new("me", Arc::clone(&store), 10);
        center.record(&inbound("m1", "alice", "hi", 1));
        center.record(&inbound("m2", "bob", "yo", 2));

        // when (操作):
        center.dismiss("alice");

        // then (期待する結果):
        assert_eq!(center.recent().len(), 1);
        assert_eq!(store.count("alice"), 0);
        assert_eq!(store.count("bob"), 1);
    }
}
