//! Records and patches: ordered column-to-value maps.

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::{DataError, DataResult};
use crate::value::Value;

/// An ordered mapping from column name to value.
///
/// Records are what callers hand to `insert`; the same type doubles as the
/// patch for `update`, where an absent key (or a null value) leaves the
/// stored column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: IndexMap<String, Value>,
}

/// Fields to change in an update. Absent and null fields keep their stored value.
pub type Patch = Record;

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, builder style.
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(column.into(), value.into());
        self
    }

    /// Set a field in place.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(column.into(), value.into())
    }

    /// Get a field.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }

    /// Remove a field.
    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.fields.shift_remove(column)
    }

    /// Check whether a field is present.
    pub fn contains(&self, column: &str) -> bool {
        self.fields.contains_key(column)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Build a record from any serializable struct or map.
    ///
    /// The value must serialize to a JSON object. Fields with `None` become
    /// nulls, which `insert` omits and `update` treats as "keep".
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> DataResult<Self> {
        let json = serde_json::to_value(value).map_err(|e| DataError::encode(e.to_string()))?;
        match json {
            serde_json::Value::Object(map) => Ok(map
                .into_iter()
                .map(|(k, v)| (k, Value::from_json(v)))
                .collect()),
            other => Err(DataError::encode(format!(
                "expected an object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Render as a JSON object.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Item {
        description: String,
        quantity: i64,
        rate: f64,
        tax: Option<f64>,
    }

    #[test]
    fn test_builder_preserves_order() {
        let record = Record::new().set("b", 2).set("a", 1);
        let keys: Vec<&str> = record.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_from_serialize() {
        let item = Item {
            description: "Consulta".into(),
            quantity: 2,
            rate: 100.0,
            tax: None,
        };
        let record = Record::from_serialize(&item).unwrap();
        assert_eq!(record.get("description"), Some(&Value::Text("Consulta".into())));
        assert_eq!(record.get("quantity"), Some(&Value::Int(2)));
        assert_eq!(record.get("tax"), Some(&Value::Null));
        assert_eq!(record.len(), 4);
    }

    #[test]
    fn test_from_serialize_rejects_scalars() {
        assert!(Record::from_serialize(&42).is_err());
        assert!(Record::from_serialize(&json!({"a": 1})).is_ok());
    }

    #[test]
    fn test_to_json() {
        let record = Record::new().set("a", 1).set("b", "x");
        assert_eq!(record.to_json(), json!({"a": 1, "b": "x"}));
    }
}
