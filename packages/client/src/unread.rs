//! Unread Accounting Store.
//!
//! A single shared mapping of sender id to unread count. A key is present
//! only while its count is positive, so "has unread" is a key lookup.
//! Every effective mutation wakes all subscribers; no-op mutations do not.

use std::collections::BTreeMap;

use tokio::sync::watch;
use tracing::debug;

/// sender id → unread count (always > 0)
pub type UnreadState = BTreeMap<String, u32>;

#[derive(Debug)]
pub struct UnreadStore {
    state: watch::Sender<UnreadState>,
}

impl Default for UnreadStore {
    fn default() -> Self {
        Self::new()
    }
}

impl UnreadStore {
    pub fn new() -> Self {
        let (state, _) = watch::channel(UnreadState::new());
        Self { state }
    }

    pub fn increment(&self, sender_id: &str) {
        self.state.send_modify(|state| {
            let count = state.entry(sender_id.to_string()).or_insert(0);
            *count = count.saturating_add(1);
        });
        debug!("Unread count for '{}' incremented", sender_id);
    }

    /// Drop one sender's entry, or the whole map when `sender_id` is `None`.
    pub fn reset(&self, sender_id: Option<&str>) {
        self.state.send_if_modified(|state| match sender_id {
            Some(id) => state.remove(id).is_some(),
            None => {
                let changed = !state.is_empty();
                state.clear();
                changed
            }
        });
    }

    /// Decrement by one, removing the entry when it reaches zero.
    pub fn mark_read(&self, sender_id: &str) {
        self.state.send_if_modified(|state| {
            let Some(count) = state.get_mut(sender_id) else {
                return false;
            };
            if *count > 1 {
                *count -= 1;
            } else {
                state.remove(sender_id);
            }
            true
        });
    }

    /// Merge a server-computed snapshot. Senders absent from `counts` keep
    /// whatever live increments they already have.
    pub fn initialize<I, K>(&self, counts: I)
    where
        I: IntoIterator<Item = (K, u32)>,
        K: Into<String>,
    {
        let counts: Vec<(String, u32)> = counts.into_iter().map(|(k, v)| (k.into(), v)).collect();
        self.state.send_if_modified(|state| {
            let mut changed = false;
            for (sender_id, count) in counts {
                if count > 0 {
                    changed |= state.insert(sender_id, count) != Some(count);
                } else {
                    changed |= state.remove(&sender_id).is_some();
                }
            }
            changed
        });
    }

    /// Sum of all counts, recomputed on each call.
    pub fn total(&self) -> u64 {
        self.state.borrow().values().map(|count| u64::from(*count)).sum()
    }

    pub fn count(&self, sender_id: &str) -> u32 {
        self.state.borrow().get(sender_id).copied().unwrap_or(0)
    }

    pub fn has_unread(&self, sender_id: &str) -> bool {
        self.state.borrow().contains_key(sender_id)
    }

    pub fn snapshot(&self) -> UnreadState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<UnreadState> {
        self.state.subscribe()
    }
}
