use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Key of the node-level selection display flag.
pub const SELECTED_FLAG: &str = "isSelected";

/// Values cached on a tree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CustomValue {
    Flag(bool),
    Number(f64),
    Text(String),
    Trace(Vec<f64>),
    Json(Value),
}

impl CustomValue {
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            CustomValue::Flag(flag) => Some(*flag),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CustomValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CustomValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_trace(&self) -> Option<&[f64]> {
        match self {
            CustomValue::Trace(trace) => Some(trace),
            _ => None,
        }
    }
}

impl From<bool> for CustomValue {
    fn from(value: bool) -> Self {
        CustomValue::Flag(value)
    }
}

impl From<f64> for CustomValue {
    fn from(value: f64) -> Self {
        CustomValue::Number(value)
    }
}

impl From<&str> for CustomValue {
    fn from(value: &str) -> Self {
        CustomValue::Text(value.to_string())
    }
}

impl From<String> for CustomValue {
    fn from(value: String) -> Self {
        CustomValue::Text(value)
    }
}

impl From<Vec<f64>> for CustomValue {
    fn from(value: Vec<f64>) -> Self {
        CustomValue::Trace(value)
    }
}

impl From<Value> for CustomValue {
    fn from(value: Value) -> Self {
        CustomValue::Json(value)
    }
}

/// Open-schema annotation map owned by exactly one tree node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomStore {
    entries: BTreeMap<String, CustomValue>,
}

impl CustomStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value, returning the one it replaced.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<CustomValue>) -> Option<CustomValue> {
        self.entries.insert(key.into(), value.into())
    }

    /// `None` means the key was never stored; a stored `Flag(false)` is `Some`.
    pub fn get(&self, key: &str) -> Option<&CustomValue> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<CustomValue> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_is_distinct_from_falsy() {
        let mut store = CustomStore::new();
        assert_eq!(store.get("flag"), None);
        store.put("flag", false);
        assert_eq!(store.get("flag"), Some(&CustomValue::Flag(false)));
        assert!(store.contains("flag"));
        store.put("zero", 0.0);
        assert_eq!(store.get("zero").and_then(CustomValue::as_number), Some(0.0));
    }

    #[test]
    fn put_returns_previous_value() {
        let mut store = CustomStore::new();
        assert_eq!(store.put("mean", vec![1.0, 2.0]), None);
        let previous = store.put("mean", vec![3.0]);
        assert_eq!(previous, Some(CustomValue::Trace(vec![1.0, 2.0])));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn default_stores_are_independent() {
        let mut a = CustomStore::default();
        let b = CustomStore::default();
        a.put("note", "only on a");
        assert!(b.is_empty());
        assert_eq!(a.keys().collect::<Vec<_>>(), vec!["note"]);
    }
}
