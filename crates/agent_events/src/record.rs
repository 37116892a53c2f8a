use serde::Serialize;
use serde_json::{Map, Value};

use crate::extract;

/// One decoded JSON object from agent output, kept verbatim (key order preserved).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DecodedRecord(Map<String, Value>);

impl DecodedRecord {
    pub fn new(data: Map<String, Value>) -> Self {
        Self(data)
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn has(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn get_non_empty_str(&self, key: &str) -> Option<&str> {
        self.get_str(key).filter(|value| !value.is_empty())
    }

    /// Walks nested objects, e.g. `["part", "state", "status"]`.
    pub fn get_path(&self, path: &[&str]) -> Option<&Value> {
        extract::lookup(&self.0, path)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for DecodedRecord {
    fn from(data: Map<String, Value>) -> Self {
        Self(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> DecodedRecord {
        match value {
            Value::Object(map) => DecodedRecord::new(map),
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn accessors_distinguish_missing_and_empty() {
        let record = record(json!({"type": "text", "sessionID": "", "part": {"state": {"status": "done"}}}));
        assert!(record.has("sessionID"));
        assert_eq!(record.get_str("sessionID"), Some(""));
        assert_eq!(record.get_non_empty_str("sessionID"), None);
        assert_eq!(
            record.get_path(&["part", "state", "status"]),
            Some(&json!("done"))
        );
        assert_eq!(record.get_path(&["part", "missing"]), None);
        assert_eq!(record.get_path(&[]), None);
    }

    #[test]
    fn serializes_in_source_key_order() {
        let record = record(json!({"z": 1, "a": 2}));
        assert_eq!(serde_json::to_string(&record).unwrap(), r#"{"z":1,"a":2}"#);
    }
}
