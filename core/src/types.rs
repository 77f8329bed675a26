//! Domain types for the datasource API.
//!
//! # Design
//! The client does not own the datasource schema. Only `id` is typed, since
//! the store looks entities up by it; every other field is kept in `fields`
//! and written back exactly as it was decoded.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Backend-issued datasource identifier.
pub type DatasourceId = i64;

/// A datasource record as returned by the backend.
///
/// `id` must be a JSON integer, as the backend issues it. A record whose `id`
/// is missing, a string, or a float fails to decode, and so does any list
/// that contains one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datasource {
    pub id: DatasourceId,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Datasource {
    pub fn new(id: DatasourceId) -> Self {
        Self {
            id,
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Look up a pass-through field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_fields_pass_through() {
        let raw = json!({
            "id": 7,
            "name": "weather",
            "url": "https://example.com/feed",
            "frequency": 3600,
            "nested": {"a": [1, 2]}
        });
        let ds: Datasource = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(ds.id, 7);
        assert_eq!(ds.get("name"), Some(&json!("weather")));
        assert_eq!(serde_json::to_value(&ds).unwrap(), raw);
    }

    #[test]
    fn missing_id_is_rejected() {
        let result: Result<Datasource, _> = serde_json::from_value(json!({"name": "x"}));
        assert!(result.is_err());
    }

    #[test]
    fn non_integer_id_is_rejected() {
        let result: Result<Datasource, _> = serde_json::from_value(json!({"id": "7"}));
        assert!(result.is_err());
        let result: Result<Vec<Datasource>, _> =
            serde_json::from_value(json!([{"id": 1}, {"id": 2.5}]));
        assert!(result.is_err());
    }
}
