//! In-memory MessageLedger.
//!
//! Bounded: once `capacity` entries are held, the oldest is evicted. An evicted
//! message can no longer be deleted through the gateway.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{LedgerEntry, MessageId, MessageLedger, RepositoryError};

#[derive(Default)]
struct LedgerState {
    entries: HashMap<MessageId, LedgerEntry>,
    order: VecDeque<MessageId>,
}

pub struct InMemoryMessageLedger {
    capacity: usize,
    state: Mutex<LedgerState>,
}

impl InMemoryMessageLedger {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(LedgerState::default()),
        }
    }
}

#[async_trait]
impl MessageLedger for InMemoryMessageLedger {
    async fn record(&self, entry: LedgerEntry) {
        let mut state = self.state.lock().await;
        let id = entry.id.clone();
        if state.entries.insert(id.clone(), entry).is_none() {
            state.order.push_back(id);
        }

        while state.entries.len() > self.capacity {
            let Some(oldest) = state.order.pop_front() else {
                break;
            };
            state.entries.remove(&oldest);
            tracing::debug!("Ledger evicted message '{}'", oldest.as_str());
        }
    }

    async fn find(&self, id: &MessageId) -> Option<LedgerEntry> {
        let state = self.state.lock().await;
        state.entries.get(id).cloned()
    }

    async fn remove(&self, id: &MessageId) -> Result<LedgerEntry, RepositoryError> {
        let mut state = self.state.lock().await;
        let entry = state
            .entries
            .remove(id)
            .ok_or_else(|| RepositoryError::MessageNotFound(id.as_str().to_string()))?;
        state.order.retain(|queued| queued != id);
        Ok(entry)
    }

    async fn count(&self) -> usize {
        let state = self.state.lock().await;
        state.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Timestamp, UserId};

    fn entry(id: &str, sender: &str, receiver: &str) -> LedgerEntry {
        LedgerEntry::new(
            MessageId::from_wire(id),
            UserId::new(sender.to_string()).unwrap(),
            UserId::new(receiver.to_string()).unwrap(),
            Timestamp::new(1000),
        )
    }

    #[tokio::test]
    async fn test_record_and_find() {
        // テスト項目: 記録したメッセージを ID で取得できる
        // given (前提条件):
        let ledger = InMemoryMessageLedger::new(10);

        // when (操作):
        ledger.record(entry("msg_1", "alice", "bob")).await;

        // then (期待する結果):
        let found = ledger.find(&MessageId::from_wire("msg_1")).await.unwrap();
        assert_eq!(found.sender.as_str(), "alice");
        assert_eq!(ledger.count().await, 1);
    }

    #[tokio::test]
    async fn test_oldest_entry_is_evicted_at_capacity() {
        // テスト項目: 容量を超えると最も古いエントリが追い出される
        // given (前提条件):
        let ledger = InMemoryMessageLedger::new(2);
        ledger.record(entry("msg_1", "alice", "bob")).await;
        ledger.record(entry("msg_2", "alice", "bob")).await;

        // when (操作):
        ledger.record(entry("msg_3", "alice", "bob")).await;

        // then (期待する結果):
        assert_eq!(ledger.count().await, 2);
        assert!(ledger.find(&MessageId::from_wire("msg_1")).await.is_none());
        assert!(ledger.find(&MessageId::from_wire("msg_3")).await.is_some());
    }

    #[tokio::test]
    async fn test_remove_unknown_message() {
        // テスト項目: 存在しないメッセージの削除はエラーになる
        // given (前提条件):
        let ledger = InMemoryMessageLedger::new(2);

        // when (操作):
        let result = ledger.remove(&MessageId::from_wire("msg_404")).await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(RepositoryError::MessageNotFound("msg_404".to_string()))
        );
    }
}
