//! Untyped preset documents.
//!
//! Presets are written in RON map syntax with quoted keys. Most JSON reads
//! the same way, `null` included, but string escapes follow RON: a Unicode
//! escape is `\u{e9}`, not `\u00e9`. `//` and `/* */` comments and trailing
//! commas are allowed. Documents are parsed into a [`serde_json::Value`] tree
//! so migrations can rewrite them without knowing every key.

use serde_json::{Map, Value};

use crate::error::ConfigError;

/// Parse preset text into an untyped object tree.
pub fn parse_document(text: &str) -> Result<Value, ConfigError> {
    let value: Value = ron::from_str(text).map_err(ConfigError::Parse)?;
    if !value.is_object() {
        return Err(ConfigError::schema("preset document must be a map"));
    }
    Ok(value)
}

/// Read the `version` key. Documents without one are version 1.
pub fn document_version(doc: &Map<String, Value>) -> Result<i64, ConfigError> {
    match doc.get("version") {
        None | Some(Value::Null) => Ok(1),
        Some(Value::Number(n)) => match (n.as_i64(), n.as_u64()) {
            (Some(v), _) => Ok(v),
            (None, Some(v)) => Ok(i64::try_from(v).unwrap_or(i64::MAX)),
            (None, None) => Err(ConfigError::schema(format!("version must be an integer, found {n}"))),
        },
        Some(other) => Err(ConfigError::schema(format!(
            "version must be an integer, found {other}"
        ))),
    }
}
