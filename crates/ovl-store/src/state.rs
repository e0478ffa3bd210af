use std::sync::RwLock;

use ovl_types::{StateKey, StateSnapshot, StateValue};

/// In-memory authoritative state map.
///
/// Held exclusively by the server process behind an `RwLock`: reads
/// (snapshots, gets) take the read half, mutations take the write half.
/// Values are cloned on read. Because every mutation is a whole-value
/// replacement, writers never need to read first and per-key order is
/// whatever order the lock grants, which is the last-writer-wins contract.
pub struct SharedStateStore {
    entries: RwLock<StateSnapshot>,
}

impl SharedStateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(StateSnapshot::new()),
        }
    }

    /// Create a store seeded from a loaded snapshot.
    pub fn from_snapshot(snapshot: StateSnapshot) -> Self {
        Self {
            entries: RwLock::new(snapshot),
        }
    }

    /// Read one key's value, if present.
    pub fn get(&self, key: &StateKey) -> Option<StateValue> {
        self.entries.read().expect("lock poisoned").get(key).cloned()
    }

    /// Replace one key's value. Always succeeds; returns the previous value
    /// if the key already existed.
    pub fn set(&self, key: StateKey, value: StateValue) -> Option<StateValue> {
        self.entries
            .write()
            .expect("lock poisoned")
            .insert(key, value)
    }

    /// Full copy of the current mapping: the `init` payload for a newly
    /// connected client, and the unit of persistence.
    pub fn snapshot(&self) -> StateSnapshot {
        self.entries.read().expect("lock poisoned").clone()
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.read().expect("lock poisoned").is_empty()
    }

    /// Remove all keys.
    pub fn clear(&self) {
        self.entries.write().expect("lock poisoned").clear();
    }
}

impl Default for SharedStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SharedStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedStateStore")
            .field("key_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // -----------------------------------------------------------------------
    // Core operations
    // -----------------------------------------------------------------------

    #[test]
    fn set_and_get() {
        let store = SharedStateStore::new();
        let key = StateKey::from("score.home");
        assert!(store.get(&key).is_none());

        let previous = store.set(key.clone(), json!(10));
        assert!(previous.is_none());
        assert_eq!(store.get(&key), Some(json!(10)));
    }

    #[test]
    fn set_is_a_full_overwrite() {
        let store = SharedStateStore::new();
        let key = StateKey::from("teams");
        store.set(key.clone(), json!([{"name": "Home", "players": [1, 2]}]));

        let previous = store.set(key.clone(), json!([]));
        assert_eq!(previous, Some(json!([{"name": "Home", "players": [1, 2]}])));
        assert_eq!(store.get(&key), Some(json!([])));
    }

    #[test]
    fn set_accepts_any_json_shape() {
        let store = SharedStateStore::new();
        store.set("null".into(), json!(null));
        store.set("nested".into(), json!({"a": {"b": [1, "two", 3.0]}}));
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(&"null".into()), Some(json!(null)));
    }

    // -----------------------------------------------------------------------
    // Snapshot semantics
    // -----------------------------------------------------------------------

    #[test]
    fn snapshot_is_a_detached_copy() {
        let store = SharedStateStore::new();
        store.set("k".into(), json!(1));

        let snap = store.snapshot();
        store.set("k".into(), json!(2));

        assert_eq!(snap.get("k"), Some(&json!(1)));
        assert_eq!(store.get(&"k".into()), Some(json!(2)));
    }

    #[test]
    fn from_snapshot_restores_state() {
        let store = SharedStateStore::new();
        store.set("a".into(), json!(1));
        store.set("b".into(), json!("two"));

        let restored = SharedStateStore::from_snapshot(store.snapshot());
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.get(&"b".into()), Some(json!("two")));
    }

    // -----------------------------------------------------------------------
    // Utility surface
    // -----------------------------------------------------------------------

    #[test]
    fn len_is_empty_clear() {
        let store = SharedStateStore::new();
        assert!(store.is_empty());

        store.set("a".into(), json!(1));
        assert_eq!(store.len(), 1);
        assert!(!store.is_empty());

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn debug_reports_key_count() {
        let store = SharedStateStore::new();
        store.set("a".into(), json!(1));
        let debug = format!("{store:?}");
        assert!(debug.contains("SharedStateStore"));
        assert!(debug.contains("key_count"));
    }

    // -----------------------------------------------------------------------
    // Concurrency: interleaved same-key writers, last one wins
    // -----------------------------------------------------------------------

    #[test]
    fn concurrent_writers_leave_one_winner() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(SharedStateStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    store.set("contested".into(), json!(i));
                })
            })
            .collect();
        for h in handles {
            h.join().expect("thread should not panic");
        }

        let value = store.get(&"contested".into()).expect("key present");
        let winner = value.as_i64().expect("integer value");
        assert!((0..8).contains(&winner));
        assert_eq!(store.len(), 1);
    }
}
