use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of one entry in the shared state store.
///
/// Keys are arbitrary non-interpreted strings chosen by controllers
/// (e.g. `"match.score"`, `"teams"`). The store holds at most one value per
/// key; there is no hierarchy, no versioning, and no per-key ownership.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateKey(String);

impl StateKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<&str> for StateKey {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for StateKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for StateKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A value held under a [`StateKey`].
///
/// Values are schema-less JSON: the core replicates them without
/// interpretation, and a full-value overwrite is the only mutation.
pub type StateValue = serde_json::Value;

/// The full key→value mapping.
///
/// A `BTreeMap` keeps snapshot serialization deterministic, which in turn
/// keeps the persisted flat file stable across saves of unchanged state.
pub type StateSnapshot = BTreeMap<StateKey, StateValue>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_roundtrips_through_serde_as_plain_string() {
        let key = StateKey::from("match.score");
        let encoded = serde_json::to_string(&key).unwrap();
        assert_eq!(encoded, "\"match.score\"");
        let decoded: StateKey = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, key);
    }

    #[test]
    fn key_display_and_accessors() {
        let key = StateKey::new("teams");
        assert_eq!(key.to_string(), "teams");
        assert_eq!(key.as_str(), "teams");
        assert_eq!(key.clone().into_string(), "teams");
    }

    #[test]
    fn snapshot_lookup_by_str() {
        let mut snap = StateSnapshot::new();
        snap.insert(StateKey::from("score.home"), json!(10));
        // Borrow<str> allows &str lookups without allocating a key.
        assert_eq!(snap.get("score.home"), Some(&json!(10)));
        assert_eq!(snap.get("score.away"), None);
    }

    #[test]
    fn snapshot_serializes_in_key_order() {
        let mut snap = StateSnapshot::new();
        snap.insert(StateKey::from("b"), json!(2));
        snap.insert(StateKey::from("a"), json!(1));
        let encoded = serde_json::to_string(&snap).unwrap();
        assert_eq!(encoded, r#"{"a":1,"b":2}"#);
    }
}
