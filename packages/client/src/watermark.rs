//! Persisted read watermarks.
//!
//! Two maps keyed by peer id, both stored as ISO-8601 strings:
//! - `lastReadTimestamps`: how far the current user has read each peer
//! - `peerReadTimestamps`: how far each peer has read the current user,
//!   learned from read receipts and used for delivery status
//!
//! Unreadable data is logged and treated as empty.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use carelink_shared::time::{millis_to_rfc3339, rfc3339_to_millis};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::ClientError;

const OWN_READ_KEY: &str = "lastReadTimestamps";
const PEER_READ_KEY: &str = "peerReadTimestamps";

/// Key-value persistence for watermark maps.
pub trait WatermarkStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, ClientError>;
    fn set(&self, key: &str, value: Value) -> Result<(), ClientError>;
}

/// One JSON object per file, one top-level entry per key.
#[derive(Debug)]
pub struct JsonFileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn read_document(&self) -> Result<Map<String, Value>, ClientError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(ClientError::Storage(format!("{}: {e}", self.path.display()))),
        };
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str(&raw)? {
            Value::Object(map) => Ok(map),
            _ => Err(ClientError::Storage(format!(
                "{}: expected a JSON object",
                self.path.display()
            ))),
        }
    }
}

impl WatermarkStorage for JsonFileStorage {
    fn get(&self, key: &str) -> Result<Option<Value>, ClientError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read_document()?.remove(key))
    }

    fn set(&self, key: &str, value: Value) -> Result<(), ClientError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        // A corrupt document is replaced rather than blocking every later write.
        let mut document = self.read_document().unwrap_or_default();
        document.insert(key.to_string(), value);
        let raw = serde_json::to_string_pretty(&Value::Object(document))?;
        fs::write(&self.path, raw)
            .map_err(|e| ClientError::Storage(format!("{}: {e}", self.path.display())))
    }
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WatermarkStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<Value>, ClientError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), ClientError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Watermarks {
    own_read: HashMap<String, i64>,
    peer_read: HashMap<String, i64>,
}

pub struct WatermarkStore {
    storage: Box<dyn WatermarkStorage>,
    state: Mutex<Watermarks>,
}

impl WatermarkStore {
    /// Load both maps from `storage`.
    pub fn load(storage: impl WatermarkStorage + 'static) -> Self {
        let state = Watermarks {
            own_read: load_map(&storage, OWN_READ_KEY),
            peer_read: load_map(&storage, PEER_READ_KEY),
        };
        Self {
            storage: Box::new(storage),
            state: Mutex::new(state),
        }
    }

    pub fn in_memory() -> Self {
        Self::load(MemoryStorage::new())
    }

    /// How far the current user has read `peer`.
    pub fn own_read(&self, peer_id: &str) -> Option<i64> {
        self.lock().own_read.get(peer_id).copied()
    }

    /// How far `peer` has read the current user.
    pub fn peer_read(&self, peer_id: &str) -> Option<i64> {
        self.lock().peer_read.get(peer_id).copied()
    }

    /// Advance the current user's watermark for `peer`. Never moves backwards.
    ///
    /// Returns whether the watermark moved. The in-memory value is kept even
    /// if persisting fails.
    pub fn record_own_read(&self, peer_id: &str, read_at: i64) -> Result<bool, ClientError> {
        self.advance(OWN_READ_KEY, peer_id, read_at, |w| &mut w.own_read)
    }

    pub fn record_peer_read(&self, peer_id: &str, read_at: i64) -> Result<bool, ClientError> {
        self.advance(PEER_READ_KEY, peer_id, read_at, |w| &mut w.peer_read)
    }

    fn advance(
        &self,
        key: &str,
        peer_id: &str,
        read_at: i64,
        select: impl Fn(&mut Watermarks) -> &mut HashMap<String, i64>,
    ) -> Result<bool, ClientError> {
        let mut state = self.lock();
        let map = select(&mut *state);
        if map.get(peer_id).is_some_and(|current| *current >= read_at) {
            return Ok(false);
        }
        map.insert(peer_id.to_string(), read_at);
        debug!("{} for '{}' advanced to {}", key, peer_id, read_at);

        let encoded: Map<String, Value> = map
            .iter()
            .filter_map(|(peer, at)| Some((peer.clone(), Value::String(millis_to_rfc3339(*at)?))))
            .collect();
        self.storage.set(key, Value::Object(encoded))?;
        Ok(true)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Watermarks> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn load_map(storage: &dyn WatermarkStorage, key: &str) -> HashMap<String, i64> {
    let value = match storage.get(key) {
        Ok(Some(value)) => value,
        Ok(None) => return HashMap::new(),
        Err(e) => {
            warn!("Failed to read {}: {}; starting empty", key, e);
            return HashMap::new();
        }
    };
    let Value::Object(entries) = value else {
        warn!("{} is not an object; starting empty", key);
        return HashMap::new();
    };

    entries
        .into_iter()
        .filter_map(|(peer, raw)| {
            let parsed = raw.as_str().and_then(rfc3339_to_millis);
            if parsed.is_none() {
                warn!("Ignoring unreadable {} entry for '{}': {}", key, peer, raw);
            }
            parsed.map(|at| (peer, at))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watermark_only_moves_forward() {
        // テスト項目: ウォーターマークは過去方向には戻らない
        // given (前提条件):
        let store = WatermarkStore::in_memory();
        store.record_own_read("bob", 2_000).unwrap();

        // when (操作):
        let moved = store.record_own_read("bob", 1_000).unwrap();

        // then (期待する結果):
        assert!(!moved);
        assert_eq!(store.own_read("bob"), Some(2_000));
    }

    #[test]
    fn test_own_and_peer_watermarks_are_independent() {
        // テスト項目: 自分の既読位置と相手の既読位置は別々に管理される
        // given (前提条件):
        let store = WatermarkStore::in_memory();

        // when (操作):
        store.record_peer_read("bob", 5_000).unwrap();

        // then (期待する結果):
        assert_eq!(store.peer_read("bob"), Some(5_000));
        assert_eq!(store.own_read("bob"), None);
    }

    #[test]
    fn test_file_storage_persists_iso_strings() {
        // テスト項目: ファイルに ISO-8601 文字列で保存され、再読み込みできる
        // given (前提条件):
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watermarks.json");
        let store = WatermarkStore::load(JsonFileStorage::new(&path));

        // when (操作):
        store.record_own_read("bob", 1_700_000_000_000).unwrap();
        let reloaded = WatermarkStore::load(JsonFileStorage::new(&path));

        // then (期待する結果):
        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            raw["lastReadTimestamps"]["bob"],
            Value::String("2023-11-14T22:13:20.000Z".to_string())
        );
        assert_eq!(reloaded.own_read("bob"), Some(1_700_000_000_000));
    }

    #[test]
    fn test_corrupt_file_is_treated_as_empty() {
        // テスト項目: 壊れたファイルは空として扱われ、書き込みで上書きされる
        // given (前提条件):
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watermarks.json");
        fs::write(&path, "{not json").unwrap();

        // when (操作):
        let store = WatermarkStore::load(JsonFileStorage::new(&path));

        // then (期待する結果):
        assert_eq!(store.own_read("bob"), None);
        assert!(store.record_own_read("bob", 1_000).unwrap());
        let reloaded = WatermarkStore::load(JsonFileStorage::new(&path));
        assert_eq!(reloaded.own_read("bob"), Some(1_000));
    }

    #[test]
    fn test_unparsable_entries_are_skipped() {
        // テスト項目: 解釈できないエントリのみ読み飛ばされる
        // given (前提条件):
        let storage = MemoryStorage::new();
        storage
            .set(
                OWN_READ_KEY,
                serde_json::json!({"bob": "2024-01-01T00:00:00.000Z", "carol": "yesterday", "dave": 42}),
            )
            .unwrap();

        // when (操作):
        let store = WatermarkStore::load(storage);

        // then (期待する結果):
        assert_eq!(store.own_read("bob"), Some(1_704_067_200_000));
        assert_eq!(store.own_read("carol"), None);
        assert_eq!(store.own_read("dave"), None);
    }
}
