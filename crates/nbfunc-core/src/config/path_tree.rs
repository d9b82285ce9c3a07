//! Dotted key-path addressing into nested configuration mappings.
//!
//! `spec.build.commands` addresses `{"spec": {"build": {"commands": ..}}}`.
//! A backslash before a dot keeps the dot inside the segment, so
//! `metadata.labels.nuclio\.io/tag` addresses the label `nuclio.io/tag`.

use std::fmt;

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// A parsed key path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPath(Vec<String>);

impl KeyPath {
    /// Split a dotted path, honoring `\.` escapes.
    pub fn parse(path: &str) -> Self {
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut chars = path.chars().peekable();

        while let Some(ch) = chars.next() {
            match ch {
                '\\' if chars.peek() == Some(&'.') => {
                    current.push('.');
                    chars.next();
                }
                '.' => segments.push(std::mem::take(&mut current)),
                other => current.push(other),
            }
        }
        segments.push(current);

        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let escaped: Vec<String> = self.0.iter().map(|s| s.replace('.', "\\.")).collect();
        f.write_str(&escaped.join("."))
    }
}

impl From<&str> for KeyPath {
    fn from(path: &str) -> Self {
        KeyPath::parse(path)
    }
}

impl From<&String> for KeyPath {
    fn from(path: &String) -> Self {
        KeyPath::parse(path)
    }
}

impl From<&[&str]> for KeyPath {
    fn from(segments: &[&str]) -> Self {
        Self(segments.iter().map(|s| s.to_string()).collect())
    }
}

impl From<Vec<String>> for KeyPath {
    fn from(segments: Vec<String>) -> Self {
        Self(segments)
    }
}

/// Look up the value at `path`; `None` if any segment is missing.
pub fn get_in<'a>(doc: &'a Value, path: impl Into<KeyPath>) -> Option<&'a Value> {
    let path = path.into();
    path.segments()
        .iter()
        .try_fold(doc, |node, key| node.as_object()?.get(key))
}

/// Set (or append to) the value at `path`, creating intermediate mappings.
///
/// With `append`, a list `value` is concatenated onto the list at `path` and
/// any other value is pushed as one element; a missing list starts empty.
pub fn update_in(
    doc: &mut Value,
    path: impl Into<KeyPath>,
    value: Value,
    append: bool,
) -> Result<()> {
    let path = path.into();
    let Some((last, parents)) = path.segments().split_last() else {
        return Err(conflict(&path, "empty path"));
    };

    let mut node = doc;
    for key in parents {
        let map = as_mapping(node, &path, key)?;
        node = map
            .entry(key.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    let map = as_mapping(node, &path, last)?;

    if !append {
        map.insert(last.clone(), value);
        return Ok(());
    }

    let slot = map.entry(last.clone()).or_insert(Value::Null);
    if slot.is_null() {
        *slot = Value::Array(Vec::new());
    }
    let Value::Array(items) = slot else {
        return Err(conflict(&path, "cannot append to a non-list value"));
    };
    match value {
        Value::Array(values) => items.extend(values),
        single => items.push(single),
    }
    Ok(())
}

fn as_mapping<'a>(
    node: &'a mut Value,
    path: &KeyPath,
    key: &str,
) -> Result<&'a mut Map<String, Value>> {
    if node.is_null() {
        *node = Value::Object(Map::new());
    }
    node.as_object_mut()
        .ok_or_else(|| conflict(path, &format!("parent of {key:?} is not a mapping")))
}

fn conflict(path: &KeyPath, reason: &str) -> Error {
    Error::PathConflict {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_split_plain() {
        assert_eq!(KeyPath::parse("a.b.c").segments(), ["a", "b", "c"]);
        assert_eq!(KeyPath::parse("single").segments(), ["single"]);
    }

    #[test]
    fn test_split_escaped() {
        assert_eq!(KeyPath::parse(r"a.b\.c.d").segments(), ["a", "b.c", "d"]);
        assert_eq!(
            KeyPath::parse(r"metadata.labels.tags\.env\.prod").segments(),
            ["metadata", "labels", "tags.env.prod"]
        );
        // A backslash not followed by a dot is kept.
        assert_eq!(KeyPath::parse(r"a\b.c").segments(), [r"a\b", "c"]);
    }

    #[test]
    fn test_display_round_trips_escapes() {
        let path = KeyPath::parse(r"a.b\.c.d");
        assert_eq!(path.to_string(), r"a.b\.c.d");
        assert_eq!(KeyPath::parse(&path.to_string()), path);
    }

    #[test]
    fn test_update_in() {
        let mut obj = json!({});
        update_in(&mut obj, "a.b.c", json!(2), false).unwrap();
        assert_eq!(obj["a"]["b"]["c"], json!(2));
        update_in(&mut obj, "a.b.c", json!(3), false).unwrap();
        assert_eq!(obj["a"]["b"]["c"], json!(3));

        update_in(&mut obj, "a.b.d", json!(3), true).unwrap();
        assert_eq!(obj["a"]["b"]["d"], json!([3]));
        update_in(&mut obj, "a.b.d", json!(4), true).unwrap();
        assert_eq!(obj["a"]["b"]["d"], json!([3, 4]));
    }

    #[test]
    fn test_append_list_concatenates() {
        let mut obj = json!({"xs": [0]});
        update_in(&mut obj, "xs", json!([1, 2]), true).unwrap();
        assert_eq!(obj["xs"], json!([0, 1, 2]));
    }

    #[test]
    fn test_escaped_path_is_distinct() {
        let mut escaped = json!({});
        update_in(&mut escaped, r"a.b\.c.d", json!(1), false).unwrap();
        assert_eq!(escaped, json!({"a": {"b.c": {"d": 1}}}));

        let mut plain = json!({});
        update_in(&mut plain, "a.b.c.d", json!(1), false).unwrap();
        assert_eq!(plain, json!({"a": {"b": {"c": {"d": 1}}}}));
        assert_ne!(escaped, plain);
    }

    #[test]
    fn test_get_missing_is_none() {
        let obj = json!({"a": {"b": 1}});
        assert_eq!(get_in(&obj, "a.b"), Some(&json!(1)));
        assert_eq!(get_in(&obj, "a.c"), None);
        assert_eq!(get_in(&obj, "a.b.c"), None);
        assert_eq!(get_in(&obj, &["a", "b"][..]), Some(&json!(1)));
    }

    #[test]
    fn test_null_parent_becomes_mapping() {
        let mut obj = json!({"spec": {"triggers": null}});
        update_in(&mut obj, "spec.triggers.http", json!({"kind": "http"}), false).unwrap();
        assert_eq!(obj["spec"]["triggers"]["http"]["kind"], json!("http"));
    }

    #[test]
    fn test_descend_into_scalar_fails() {
        let mut obj = json!({"spec": {"runtime": "python"}});
        let err = update_in(&mut obj, "spec.runtime.version", json!(3), false).unwrap_err();
        assert!(matches!(err, Error::PathConflict { .. }));
        let err = update_in(&mut obj, "spec.runtime", json!("x"), true).unwrap_err();
        assert!(matches!(err, Error::PathConflict { .. }));
    }
}
