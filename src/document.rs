use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The whole application state at an instant.
///
/// A document is a JSON object. Its top-level keys are either context fields
/// (e.g. `"profile"`) or named collections of records (e.g. `"violations"`).
/// The store has no opinion about record shapes: unknown keys survive every
/// round trip, and a missing collection reads back as empty.
///
/// Serialized as the bare object, so the persisted file and an export of the
/// full document are the same JSON.
///
/// # Examples
///
/// ```
/// use safekeep::Document;
/// use serde_json::json;
///
/// let doc = Document::new()
///     .with("profile", json!({"school": "North"}))
///     .with("violations", json!([{"id": 1, "teacherId": "t1"}]));
///
/// assert_eq!(doc.collection("violations").len(), 1);
/// assert!(doc.collection("students").is_empty());
/// assert_eq!(doc.get("profile").unwrap()["school"], "North");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    /// Create an empty document. This is also what a fresh install reads.
    pub fn new() -> Self {
        Document(Map::new())
    }

    /// Wrap a JSON value, returning `None` unless it is an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Document(map)),
            _ => None,
        }
    }

    /// Look up a top-level field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The records of a named collection.
    ///
    /// Returns an empty slice when the key is missing or is not an array, so
    /// readers can default gracefully across schema additions.
    pub fn collection(&self, key: &str) -> &[Value] {
        self.0
            .get(key)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Set a top-level field, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// Set a top-level field, builder style.
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.insert(key, value);
        self
    }

    /// Iterate over top-level keys and values in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Pretty-printed JSON, the format used on disk and for exports.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.0)
    }
}

impl From<Map<String, Value>> for Document {
    fn from(map: Map<String, Value>) -> Self {
        Document(map)
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Document(iter.into_iter().collect())
    }
}
