//! Read-only projections of the current document for outbound files.

use crate::document::Document;
use crate::validate::Upload;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Media type of every export.
pub const EXPORT_MEDIA_TYPE: &str = "application/json";

/// Which slice of the document to export.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExportScope {
    /// The whole document, unchanged.
    Full,
    /// Records belonging to one owner across every owner-scoped collection.
    ByOwner(String),
    /// A single named collection, plus the context fields.
    ByEntityType(String),
}

/// Describes which top-level fields of a document are context and which
/// collections carry an owner key.
///
/// Deserializable, so hosts can keep it in their own config files:
///
/// ```
/// use safekeep::ExportSchema;
///
/// let schema: ExportSchema = serde_json::from_str(r#"{
///     "context_fields": ["profile"],
///     "owner_scoped": {"violations": "teacherId", "students": "teacherId"}
/// }"#).unwrap();
/// assert_eq!(schema.owner_field("violations"), Some("teacherId"));
/// assert_eq!(schema.owner_field("profile"), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSchema {
    /// Fields kept verbatim by every scoped export.
    pub context_fields: Vec<String>,
    /// Collection name to the record field holding its owner key.
    pub owner_scoped: BTreeMap<String, String>,
}

impl Default for ExportSchema {
    fn default() -> Self {
        ExportSchema {
            context_fields: vec!["profile".to_string()],
            owner_scoped: BTreeMap::new(),
        }
    }
}

impl ExportSchema {
    /// A schema with no context fields and no owner-scoped collections.
    pub fn empty() -> Self {
        ExportSchema {
            context_fields: Vec::new(),
            owner_scoped: BTreeMap::new(),
        }
    }

    pub fn with_context_field(mut self, field: impl Into<String>) -> Self {
        self.context_fields.push(field.into());
        self
    }

    pub fn with_owner_scoped(
        mut self,
        collection: impl Into<String>,
        owner_field: impl Into<String>,
    ) -> Self {
        self.owner_scoped.insert(collection.into(), owner_field.into());
        self
    }

    pub fn is_context(&self, field: &str) -> bool {
        self.context_fields.iter().any(|f| f == field)
    }

    /// The owner-key field of `collection`, if it is owner-scoped.
    pub fn owner_field(&self, collection: &str) -> Option<&str> {
        self.owner_scoped.get(collection).map(String::as_str)
    }
}

/// Projects documents through an [`ExportSchema`].
#[derive(Debug, Clone, Default)]
pub struct ExportFilter {
    schema: ExportSchema,
}

impl ExportFilter {
    pub fn new(schema: ExportSchema) -> Self {
        ExportFilter { schema }
    }

    pub fn schema(&self) -> &ExportSchema {
        &self.schema
    }

    /// Derive the slice of `doc` selected by `scope`.
    ///
    /// Pure and deterministic. Every key of `doc` appears in the result;
    /// collections outside the scope are present but empty (`[]` or `{}`,
    /// matching their original kind; other values become `null`).
    ///
    /// - `Full` returns `doc` unchanged.
    /// - `ByEntityType(t)` keeps the context fields and collection `t`.
    /// - `ByOwner(k)` keeps the context fields, filters each owner-scoped
    ///   collection to the records whose owner field equals `k`, and empties
    ///   everything else.
    ///
    /// # Examples
    ///
    /// ```
    /// use safekeep::{Document, ExportFilter, ExportSchema, ExportScope};
    /// use serde_json::json;
    ///
    /// let doc = Document::new()
    ///     .with("profile", json!({"school": "North"}))
    ///     .with("violations", json!([{"teacherId": "a"}, {"teacherId": "b"}]))
    ///     .with("notes", json!(["x"]));
    /// let filter = ExportFilter::new(ExportSchema::default().with_owner_scoped("violations", "teacherId"));
    ///
    /// let only_a = filter.project(&doc, &ExportScope::ByOwner("a".into()));
    /// assert_eq!(only_a.collection("violations"), &[json!({"teacherId": "a"})]);
    /// assert!(only_a.collection("notes").is_empty());
    /// assert_eq!(only_a.get("profile"), doc.get("profile"));
    /// ```
    pub fn project(&self, doc: &Document, scope: &ExportScope) -> Document {
        match scope {
            ExportScope::Full => doc.clone(),
            ExportScope::ByEntityType(type_key) => doc
                .iter()
                .map(|(key, value)| {
                    let kept = key == type_key.as_str() || self.schema.is_context(key);
                    let value = if kept { value.clone() } else { emptied(value) };
                    (key.to_string(), value)
                })
                .collect(),
            ExportScope::ByOwner(owner) => doc
                .iter()
                .map(|(key, value)| {
                    let value = if self.schema.is_context(key) {
                        value.clone()
                    } else if let Some(field) = self.schema.owner_field(key) {
                        owned_subset(value, field, owner)
                    } else {
                        emptied(value)
                    };
                    (key.to_string(), value)
                })
                .collect(),
        }
    }
}

fn emptied(value: &Value) -> Value {
    match value {
        Value::Array(_) => Value::Array(Vec::new()),
        Value::Object(_) => Value::Object(Map::new()),
        _ => Value::Null,
    }
}

/// Keep the records of an array- or map-shaped collection owned by `owner`.
fn owned_subset(collection: &Value, field: &str, owner: &str) -> Value {
    match collection {
        Value::Array(records) => Value::Array(
            records
                .iter()
                .filter(|r| is_owned_by(r, field, owner))
                .cloned()
                .collect(),
        ),
        Value::Object(records) => Value::Object(
            records
                .iter()
                .filter(|(_, r)| is_owned_by(r, field, owner))
                .map(|(k, r)| (k.clone(), r.clone()))
                .collect(),
        ),
        other => emptied(other),
    }
}

// Owner keys are compared as text so numeric ids match their string form.
fn is_owned_by(record: &Value, field: &str, owner: &str) -> bool {
    match record.get(field) {
        Some(Value::String(key)) => key == owner,
        Some(Value::Number(key)) => key.to_string() == owner,
        _ => false,
    }
}

/// A serialized export ready to be written out by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub file_name: String,
    pub media_type: &'static str,
    /// Pretty-printed UTF-8 JSON.
    pub contents: String,
}

impl ExportFile {
    /// Re-wrap this export as an import upload.
    pub fn to_upload(&self) -> Upload {
        Upload::new(self.file_name.clone(), self.contents.clone()).with_media_type(self.media_type)
    }
}

/// Build the conventional export file name.
///
/// ```
/// use chrono::NaiveDate;
/// use safekeep::{export_file_name, ExportScope};
///
/// let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
/// assert_eq!(export_file_name("backup", &ExportScope::Full, date), "backup-2024-03-09.json");
/// assert_eq!(
///     export_file_name("backup", &ExportScope::ByEntityType("violations".into()), date),
///     "backup-violations-2024-03-09.json"
/// );
/// assert_eq!(
///     export_file_name("backup", &ExportScope::ByOwner("Ms Smith".into()), date),
///     "backup-owner-Ms_Smith-2024-03-09.json"
/// );
/// ```
pub fn export_file_name(prefix: &str, scope: &ExportScope, date: NaiveDate) -> String {
    let date = date.format("%Y-%m-%d");
    match scope {
        ExportScope::Full => format!("{prefix}-{date}.json"),
        ExportScope::ByEntityType(type_key) => {
            format!("{prefix}-{}-{date}.json", file_safe(type_key))
        }
        ExportScope::ByOwner(owner) => format!("{prefix}-owner-{}-{date}.json", file_safe(owner)),
    }
}

fn file_safe(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
