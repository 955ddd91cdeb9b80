//! Shape-level validation of untrusted import payloads.
//!
//! Validation is deliberately shallow: the payload must parse and its top
//! level must be an object. Nested collections are not inspected, so files
//! written by older or newer versions of the host still import.

use crate::document::Document;
use crate::error::ValidationError;
use serde_json::Value;

const JSON_MEDIA_TYPE: &str = "application/json";
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// A file handed over for import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub file_name: String,
    /// Declared media type, when the host knows one.
    pub media_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Upload {
            file_name: file_name.into(),
            media_type: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }
}

/// Reject uploads that are not declared as JSON.
///
/// Accepts when the declared media type is `application/json` (parameters
/// ignored) or the file name ends in `.json`. Content is not sniffed.
///
/// # Examples
///
/// ```
/// use safekeep::{check_file_kind, Upload};
///
/// assert!(check_file_kind(&Upload::new("backup-2024-01-01.json", "{}")).is_ok());
/// assert!(check_file_kind(&Upload::new("notes.txt", "{}")).is_err());
/// assert!(check_file_kind(
///     &Upload::new("download", "{}").with_media_type("application/json; charset=utf-8")
/// ).is_ok());
/// ```
pub fn check_file_kind(upload: &Upload) -> Result<(), ValidationError> {
    let declared_json = upload.media_type.as_deref().is_some_and(|mt| {
        mt.split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .eq_ignore_ascii_case(JSON_MEDIA_TYPE)
    });
    let named_json = upload.file_name.to_ascii_lowercase().ends_with(".json");

    if declared_json || named_json {
        Ok(())
    } else {
        Err(ValidationError::WrongFileKind {
            file_name: upload.file_name.clone(),
        })
    }
}

/// Parse `raw` into a candidate document.
///
/// Pure: touches no state. A leading UTF-8 byte-order mark is ignored.
///
/// # Errors
///
/// - [`ValidationError::MalformedSyntax`] if `raw` is not JSON.
/// - [`ValidationError::WrongShape`] if the top level is not an object.
///
/// # Examples
///
/// ```
/// use safekeep::{validate, ValidationError};
///
/// let doc = validate(br#"{"students": [], "extra": 1}"#).unwrap();
/// assert_eq!(doc.len(), 2);
///
/// assert!(matches!(validate(b"[1, 2]"), Err(ValidationError::WrongShape { found: "array" })));
/// assert!(matches!(validate(b"{\"a\":"), Err(ValidationError::MalformedSyntax(_))));
/// ```
pub fn validate(raw: &[u8]) -> Result<Document, ValidationError> {
    let raw = raw.strip_prefix(UTF8_BOM).unwrap_or(raw);
    let value: Value = serde_json::from_slice(raw).map_err(ValidationError::MalformedSyntax)?;
    let found = shape_name(&value);
    Document::from_value(value).ok_or(ValidationError::WrongShape { found })
}

fn shape_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
