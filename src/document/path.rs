//! Field locators and nested-field access over JSON document trees
//!
//! A [`FieldPath`] is an ordered list of object keys. The same traversal code
//! serves every configurable location (desired mode, no-wait flag, status
//! block, nudge annotation), so differently shaped resources can be attached
//! without code changes.

use std::fmt;

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Ordered sequence of field names locating a value inside a document
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Parse a dot-delimited locator such as `spec.disasterRecovery.mode`.
    /// An empty (or whitespace-only) string yields an empty path.
    pub fn parse(dotted: &str) -> Self {
        let trimmed = dotted.trim();
        if trimmed.is_empty() {
            return Self::default();
        }
        Self::new(trimmed.split('.'))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Path extended by one more key
    pub fn child(&self, key: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(key.into());
        Self(segments)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "map",
    }
}

fn accessor_error(path: &FieldPath, depth: usize, found: &Value) -> Error {
    let prefix = path.segments()[..depth].join(".");
    Error::DocumentError(format!(
        "{path} accessor error: value at '{prefix}' is of the type {}, expected map",
        type_name(found)
    ))
}

/// Look up the value at `path`.
///
/// Missing keys and `null` intermediates resolve to `Ok(None)`; descending
/// into a scalar or array is a type error.
pub fn nested<'a>(doc: &'a Value, path: &FieldPath) -> Result<Option<&'a Value>> {
    if path.is_empty() {
        return Ok(None);
    }
    let mut current = doc;
    for (depth, segment) in path.segments().iter().enumerate() {
        match current {
            Value::Object(map) => match map.get(segment) {
                Some(next) => current = next,
                None => return Ok(None),
            },
            Value::Null => return Ok(None),
            other => return Err(accessor_error(path, depth, other)),
        }
    }
    Ok(Some(current))
}

/// String value at `path`; `None` when absent or null
pub fn nested_string(doc: &Value, path: &FieldPath) -> Result<Option<String>> {
    match nested(doc, path)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(Error::DocumentError(format!(
            "{path} accessor error: {other} is of the type {}, expected string",
            type_name(other)
        ))),
    }
}

/// Boolean value at `path`; `None` when absent or null
pub fn nested_bool(doc: &Value, path: &FieldPath) -> Result<Option<bool>> {
    match nested(doc, path)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => Err(Error::DocumentError(format!(
            "{path} accessor error: {other} is of the type {}, expected bool",
            type_name(other)
        ))),
    }
}

fn as_object_mut<'a>(
    value: &'a mut Value,
    path: &FieldPath,
    depth: usize,
) -> Result<&'a mut Map<String, Value>> {
    if value.is_null() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => Ok(map),
        other => Err(accessor_error(path, depth, other)),
    }
}

/// Set `value` at `path`, creating intermediate objects as needed
pub fn set_nested(doc: &mut Value, path: &FieldPath, value: Value) -> Result<()> {
    let Some((last, parents)) = path.segments().split_last() else {
        return Err(Error::DocumentError(
            "cannot set a value at an empty field path".to_string(),
        ));
    };

    let mut current = doc;
    for (depth, segment) in parents.iter().enumerate() {
        let map = as_object_mut(current, path, depth)?;
        current = map
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    as_object_mut(current, path, parents.len())?.insert(last.clone(), value);
    Ok(())
}

/// Parse a boolean the way configuration strings are usually written
/// (`true`/`false`, `t`/`f`, `1`/`0`, any letter case).
pub fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" => Ok(true),
        "0" | "f" | "false" => Ok(false),
        _ => Err(Error::DocumentError(format!(
            "invalid boolean value '{raw}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_dotted_path() {
        let path = FieldPath::parse("spec.disasterRecovery.mode");
        assert_eq!(path.segments(), ["spec", "disasterRecovery", "mode"]);
        assert_eq!(path.to_string(), "spec.disasterRecovery.mode");
        assert!(FieldPath::parse("").is_empty());
        assert!(FieldPath::parse("   ").is_empty());
    }

    #[test]
    fn test_nested_lookup() {
        let doc = json!({"data": {"mode": "active", "noWait": true, "count": 3}});
        assert_eq!(
            nested_string(&doc, &FieldPath::parse("data.mode")).unwrap(),
            Some("active".to_string())
        );
        assert_eq!(
            nested_bool(&doc, &FieldPath::parse("data.noWait")).unwrap(),
            Some(true)
        );
        assert_eq!(
            nested_string(&doc, &FieldPath::parse("data.missing")).unwrap(),
            None
        );
        assert_eq!(
            nested_string(&doc, &FieldPath::parse("status.mode")).unwrap(),
            None
        );
        assert_eq!(nested(&doc, &FieldPath::default()).unwrap(), None);
    }

    #[test]
    fn test_nested_type_mismatch() {
        let doc = json!({"data": {"mode": 7, "flat": "x"}});
        let err = nested_string(&doc, &FieldPath::parse("data.mode")).unwrap_err();
        assert!(err.to_string().contains("expected string"));

        let err = nested_string(&doc, &FieldPath::parse("data.flat.deeper")).unwrap_err();
        assert!(matches!(err, Error::DocumentError(_)));
        assert!(err.to_string().contains("expected map"));
    }

    #[test]
    fn test_null_intermediate_is_absent() {
        let doc = json!({"status": null});
        assert_eq!(
            nested_string(&doc, &FieldPath::parse("status.mode")).unwrap(),
            None
        );
    }

    #[test]
    fn test_set_creates_intermediates() {
        let mut doc = json!({"metadata": {"name": "dr"}});
        set_nested(
            &mut doc,
            &FieldPath::parse("status.disasterRecoveryStatus.mode"),
            json!("standby"),
        )
        .unwrap();
        assert_eq!(
            doc,
            json!({
                "metadata": {"name": "dr"},
                "status": {"disasterRecoveryStatus": {"mode": "standby"}}
            })
        );
    }

    #[test]
    fn test_set_on_null_document_and_null_intermediate() {
        let mut doc = Value::Null;
        set_nested(&mut doc, &FieldPath::parse("a.b"), json!(1)).unwrap();
        assert_eq!(doc, json!({"a": {"b": 1}}));

        let mut doc = json!({"status": null});
        set_nested(&mut doc, &FieldPath::parse("status.status"), json!("done")).unwrap();
        assert_eq!(doc, json!({"status": {"status": "done"}}));
    }

    #[test]
    fn test_set_through_scalar_fails() {
        let mut doc = json!({"spec": "flat"});
        let err = set_nested(&mut doc, &FieldPath::parse("spec.mode"), json!("active"))
            .unwrap_err();
        assert!(err.to_string().contains("expected map"));
        assert!(set_nested(&mut doc, &FieldPath::default(), json!(1)).is_err());
    }

    #[test]
    fn test_child_path() {
        let annotations = FieldPath::parse("metadata.annotations");
        assert_eq!(
            annotations.child("switchoverRetry").to_string(),
            "metadata.annotations.switchoverRetry"
        );
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true").unwrap());
        assert!(parse_bool("TRUE").unwrap());
        assert!(parse_bool("1").unwrap());
        assert!(!parse_bool("false").unwrap());
        assert!(!parse_bool("F").unwrap());
        assert!(parse_bool("").is_err());
        assert!(parse_bool("yes please").is_err());
    }
}
