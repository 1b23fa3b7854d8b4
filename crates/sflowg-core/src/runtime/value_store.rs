//! Value Store (C12): a flat, key-normalized execution-scoped map with
//! nested expansion, per spec §3/§8 properties 3-4.

use std::collections::HashMap;

use serde_json::Value;

/// Execution-scoped, key-normalized map supporting nested expansion.
#[derive(Debug, Clone, Default)]
pub struct ValueStore {
    entries: HashMap<String, Value>,
}

/// Normalizes a dotted key: dots and hyphens become underscores (spec §9
/// Open Questions: only the underscore form is kept after normalization).
pub fn normalize(key: &str) -> String {
    key.chars()
        .map(|c| if c == '.' || c == '-' { '_' } else { c })
        .collect()
}

impl ValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store pre-populated from a flat properties map, applying the
    /// same nested-expansion rules as [`ValueStore::set_nested`].
    pub fn from_properties(properties: HashMap<String, Value>) -> Self {
        let mut store = ValueStore::new();
        for (key, value) in properties {
            store.set_nested(&key, value);
        }
        store
    }

    /// Plain lookup and insertion normalize keys.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(&normalize(key))
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.entries.insert(normalize(key), value);
    }

    /// Stores the composite `value` under `prefix`, and recursively stores
    /// each descendant at its dotted path: object fields under
    /// `prefix.field`, array elements under `prefix.index`. Idempotent on
    /// re-store (spec §8 property 4).
    pub fn set_nested(&mut self, prefix: &str, value: Value) {
        self.set(prefix, value.clone());
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    let child_prefix = format!("{prefix}.{key}");
                    self.set_nested(&child_prefix, child);
                }
            }
            Value::Array(items) => {
                for (index, child) in items.into_iter().enumerate() {
                    let child_prefix = format!("{prefix}.{index}");
                    self.set_nested(&child_prefix, child);
                }
            }
            _ => {}
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(&normalize(key))
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(&normalize(key))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalization_is_idempotent() {
        let k = "request.path-variables.id";
        assert_eq!(normalize(k), normalize(&normalize(k)));
    }

    #[test]
    fn get_after_normalized_set() {
        let mut store = ValueStore::new();
        store.set("request.path-variables.id", json!("42"));
        assert_eq!(store.get("request_path_variables_id"), Some(&json!("42")));
    }

    #[test]
    fn set_nested_completeness_object() {
        let mut store = ValueStore::new();
        let body = json!({ "user": { "id": 7, "tags": ["a", "b"] } });
        store.set_nested("request.body", body.clone());

        assert_eq!(store.get("request.body"), Some(&body));
        assert_eq!(store.get("request.body.user"), Some(&json!({ "id": 7, "tags": ["a", "b"] })));
        assert_eq!(store.get("request.body.user.id"), Some(&json!(7)));
        assert_eq!(store.get("request.body.user.tags"), Some(&json!(["a", "b"])));
        assert_eq!(store.get("request.body.user.tags.0"), Some(&json!("a")));
        assert_eq!(store.get("request.body.user.tags.1"), Some(&json!("b")));
    }

    #[test]
    fn set_nested_is_idempotent() {
        let mut store = ValueStore::new();
        let body = json!({ "a": 1 });
        store.set_nested("p", body.clone());
        store.set_nested("p", body.clone());
        assert_eq!(store.get("p"), Some(&body));
        assert_eq!(store.get("p.a"), Some(&json!(1)));
    }
}
