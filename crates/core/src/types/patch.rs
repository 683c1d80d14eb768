//! JSON-Patch (RFC 6902) operations and an applier.
//!
//! The wire form of a PATCH body is a JSON array of operations in
//! insertion order. The applier is used by clients that want to preview
//! the result of a flush, and by the diff round-trip tests.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// The six RFC 6902 operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Remove,
    Replace,
    Move,
    Copy,
    Test,
}

/// One patch operation: `{ op, path, value?, from? }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    /// Operation kind.
    pub op: PatchOp,
    /// JSON Pointer (RFC 6901) to the target location.
    pub path: String,
    /// Operand for `add`, `replace`, and `test`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Source location for `move` and `copy`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

impl PatchOperation {
    /// An `add` operation.
    #[must_use]
    pub fn add(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: PatchOp::Add,
            path: path.into(),
            value: Some(value),
            from: None,
        }
    }

    /// A `remove` operation.
    #[must_use]
    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            op: PatchOp::Remove,
            path: path.into(),
            value: None,
            from: None,
        }
    }

    /// A `replace` operation.
    #[must_use]
    pub fn replace(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: PatchOp::Replace,
            path: path.into(),
            value: Some(value),
            from: None,
        }
    }

    /// A `move` operation.
    #[must_use]
    pub fn mov(from: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            op: PatchOp::Move,
            path: path.into(),
            value: None,
            from: Some(from.into()),
        }
    }
}

/// Errors from applying a patch to a document.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PatchError {
    /// A pointer referenced a location that does not exist.
    #[error("Path not found: {0}")]
    PathNotFound(String),

    /// A pointer segment was not valid for the value it targets.
    #[error("Invalid pointer {pointer} at segment {segment}")]
    InvalidPointer { pointer: String, segment: String },

    /// A `test` operation did not match.
    #[error("Test failed at {0}")]
    TestFailed(String),

    /// `add`/`replace`/`test` without a value, or `move`/`copy` without `from`.
    #[error("Operation {op:?} at {path} is missing its operand")]
    MissingOperand { op: PatchOp, path: String },
}

/// Escape one pointer segment per RFC 6901 (`~` → `~0`, `/` → `~1`).
#[must_use]
pub fn escape_pointer_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

fn unescape_pointer_segment(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

fn split_pointer(pointer: &str) -> Result<Vec<String>, PatchError> {
    if pointer.is_empty() {
        return Ok(Vec::new());
    }
    let Some(rest) = pointer.strip_prefix('/') else {
        return Err(PatchError::InvalidPointer {
            pointer: pointer.to_string(),
            segment: pointer.to_string(),
        });
    };
    Ok(rest.split('/').map(unescape_pointer_segment).collect())
}

fn parse_index(segment: &str, len: usize, allow_end: bool) -> Option<usize> {
    if segment == "-" {
        return allow_end.then_some(len);
    }
    // RFC 6901 forbids leading zeros in array indices
    if segment.len() > 1 && segment.starts_with('0') {
        return None;
    }
    let index: usize = segment.parse().ok()?;
    let max = if allow_end { len } else { len.checked_sub(1)? };
    (index <= max).then_some(index)
}

fn get_pointer<'a>(doc: &'a Value, pointer: &str) -> Result<&'a Value, PatchError> {
    let mut current = doc;
    for segment in split_pointer(pointer)? {
        current = match current {
            Value::Object(map) => map
                .get(&segment)
                .ok_or_else(|| PatchError::PathNotFound(pointer.to_string()))?,
            Value::Array(items) => {
                let index = parse_index(&segment, items.len(), false)
                    .ok_or_else(|| PatchError::PathNotFound(pointer.to_string()))?;
                items
                    .get(index)
                    .ok_or_else(|| PatchError::PathNotFound(pointer.to_string()))?
            }
            _ => return Err(PatchError::PathNotFound(pointer.to_string())),
        };
    }
    Ok(current)
}

enum Parent<'a> {
    Root,
    Object(&'a mut serde_json::Map<String, Value>, String),
    Array(&'a mut Vec<Value>, String),
}

fn locate_parent<'a>(doc: &'a mut Value, pointer: &str) -> Result<Parent<'a>, PatchError> {
    let mut segments = split_pointer(pointer)?;
    let Some(last) = segments.pop() else {
        return Ok(Parent::Root);
    };

    let mut current = doc;
    for segment in segments {
        current = match current {
            Value::Object(map) => map
                .get_mut(&segment)
                .ok_or_else(|| PatchError::PathNotFound(pointer.to_string()))?,
            Value::Array(items) => {
                let index = parse_index(&segment, items.len(), false)
                    .ok_or_else(|| PatchError::PathNotFound(pointer.to_string()))?;
                items
                    .get_mut(index)
                    .ok_or_else(|| PatchError::PathNotFound(pointer.to_string()))?
            }
            _ => return Err(PatchError::PathNotFound(pointer.to_string())),
        };
    }

    match current {
        Value::Object(map) => Ok(Parent::Object(map, last)),
        Value::Array(items) => Ok(Parent::Array(items, last)),
        _ => Err(PatchError::PathNotFound(pointer.to_string())),
    }
}

fn add_at(doc: &mut Value, pointer: &str, value: Value) -> Result<(), PatchError> {
    match locate_parent(doc, pointer)? {
        Parent::Root => {
            *doc = value;
            Ok(())
        }
        Parent::Object(map, key) => {
            map.insert(key, value);
            Ok(())
        }
        Parent::Array(items, segment) => {
            let index = parse_index(&segment, items.len(), true)
                .ok_or_else(|| PatchError::PathNotFound(pointer.to_string()))?;
            items.insert(index, value);
            Ok(())
        }
    }
}

fn remove_at(doc: &mut Value, pointer: &str) -> Result<Value, PatchError> {
    match locate_parent(doc, pointer)? {
        Parent::Root => Ok(std::mem::take(doc)),
        Parent::Object(map, key) => map
            .remove(&key)
            .ok_or_else(|| PatchError::PathNotFound(pointer.to_string())),
        Parent::Array(items, segment) => {
            let index = parse_index(&segment, items.len(), false)
                .ok_or_else(|| PatchError::PathNotFound(pointer.to_string()))?;
            Ok(items.remove(index))
        }
    }
}

fn replace_at(doc: &mut Value, pointer: &str, value: Value) -> Result<(), PatchError> {
    match locate_parent(doc, pointer)? {
        Parent::Root => {
            *doc = value;
            Ok(())
        }
        Parent::Object(map, key) => {
            let slot = map
                .get_mut(&key)
                .ok_or_else(|| PatchError::PathNotFound(pointer.to_string()))?;
            *slot = value;
            Ok(())
        }
        Parent::Array(items, segment) => {
            let index = parse_index(&segment, items.len(), false)
                .ok_or_else(|| PatchError::PathNotFound(pointer.to_string()))?;
            let slot = items
                .get_mut(index)
                .ok_or_else(|| PatchError::PathNotFound(pointer.to_string()))?;
            *slot = value;
            Ok(())
        }
    }
}

/// Apply a sequence of operations to `doc`, in order.
///
/// The document is modified in place. On error the document is left in
/// the state produced by the operations that succeeded before the failing
/// one; callers that need atomicity should apply to a clone.
///
/// # Errors
///
/// Returns the first [`PatchError`] encountered.
pub fn apply_patch(doc: &mut Value, operations: &[PatchOperation]) -> Result<(), PatchError> {
    for operation in operations {
        let path = operation.path.as_str();
        match operation.op {
            PatchOp::Add => {
                let value = operation.value.clone().ok_or(PatchError::MissingOperand {
                    op: PatchOp::Add,
                    path: path.to_string(),
                })?;
                add_at(doc, path, value)?;
            }
            PatchOp::Remove => {
                remove_at(doc, path)?;
            }
            PatchOp::Replace => {
                let value = operation.value.clone().ok_or(PatchError::MissingOperand {
                    op: PatchOp::Replace,
                    path: path.to_string(),
                })?;
                replace_at(doc, path, value)?;
            }
            PatchOp::Move => {
                let from = operation.from.as_deref().ok_or(PatchError::MissingOperand {
                    op: PatchOp::Move,
                    path: path.to_string(),
                })?;
                let value = remove_at(doc, from)?;
                add_at(doc, path, value)?;
            }
            PatchOp::Copy => {
                let from = operation.from.as_deref().ok_or(PatchError::MissingOperand {
                    op: PatchOp::Copy,
                    path: path.to_string(),
                })?;
                let value = get_pointer(doc, from)?.clone();
                add_at(doc, path, value)?;
            }
            PatchOp::Test => {
                let expected = operation.value.as_ref().ok_or(PatchError::MissingOperand {
                    op: PatchOp::Test,
                    path: path.to_string(),
                })?;
                let actual = get_pointer(doc, path)?;
                if actual != expected {
                    return Err(PatchError::TestFailed(path.to_string()));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operation_wire_format() {
        let op = PatchOperation::replace("/metadata/dc.title", json!("New title"));
        let wire = serde_json::to_value(&op).expect("serialize");
        assert_eq!(
            wire,
            json!({ "op": "replace", "path": "/metadata/dc.title", "value": "New title" })
        );
    }

    #[test]
    fn test_add_to_object_and_array() {
        let mut doc = json!({ "tags": ["a", "c"] });
        apply_patch(
            &mut doc,
            &[
                PatchOperation::add("/name", json!("x")),
                PatchOperation::add("/tags/1", json!("b")),
                PatchOperation::add("/tags/-", json!("d")),
            ],
        )
        .expect("apply");
        assert_eq!(doc, json!({ "tags": ["a", "b", "c", "d"], "name": "x" }));
    }

    #[test]
    fn test_remove_and_replace() {
        let mut doc = json!({ "a": 1, "b": [1, 2, 3] });
        apply_patch(
            &mut doc,
            &[
                PatchOperation::remove("/b/1"),
                PatchOperation::replace("/a", json!(2)),
            ],
        )
        .expect("apply");
        assert_eq!(doc, json!({ "a": 2, "b": [1, 3] }));
    }

    #[test]
    fn test_move_and_copy() {
        let mut doc = json!({ "a": { "x": 1 }, "b": {} });
        apply_patch(
            &mut doc,
            &[
                PatchOperation::mov("/a/x", "/b/x"),
                PatchOperation {
                    op: PatchOp::Copy,
                    path: "/b/y".to_string(),
                    value: None,
                    from: Some("/b/x".to_string()),
                },
            ],
        )
        .expect("apply");
        assert_eq!(doc, json!({ "a": {}, "b": { "x": 1, "y": 1 } }));
    }

    #[test]
    fn test_test_operation() {
        let mut doc = json!({ "a": 1 });
        let ok = apply_patch(
            &mut doc,
            &[PatchOperation {
                op: PatchOp::Test,
                path: "/a".to_string(),
                value: Some(json!(1)),
                from: None,
            }],
        );
        assert_eq!(ok, Ok(()));

        let err = apply_patch(
            &mut doc,
            &[PatchOperation {
                op: PatchOp::Test,
                path: "/a".to_string(),
                value: Some(json!(2)),
                from: None,
            }],
        );
        assert_eq!(err, Err(PatchError::TestFailed("/a".to_string())));
    }

    #[test]
    fn test_escaped_pointer_segments() {
        let mut doc = json!({ "metadata": { "dc.title": "old", "a/b": 1, "m~n": 2 } });
        apply_patch(
            &mut doc,
            &[
                PatchOperation::replace("/metadata/dc.title", json!("new")),
                PatchOperation::remove(format!("/metadata/{}", escape_pointer_segment("a/b"))),
                PatchOperation::replace(format!("/metadata/{}", escape_pointer_segment("m~n")), json!(3)),
            ],
        )
        .expect("apply");
        assert_eq!(doc, json!({ "metadata": { "dc.title": "new", "m~n": 3 } }));
    }

    #[test]
    fn test_missing_path_errors() {
        let mut doc = json!({ "a": 1 });
        let err = apply_patch(&mut doc, &[PatchOperation::remove("/b")]);
        assert_eq!(err, Err(PatchError::PathNotFound("/b".to_string())));

        let err = apply_patch(&mut doc, &[PatchOperation::replace("/b", json!(1))]);
        assert_eq!(err, Err(PatchError::PathNotFound("/b".to_string())));
    }

    #[test]
    fn test_leading_zero_index_rejected() {
        let mut doc = json!({ "a": [1, 2, 3] });
        let err = apply_patch(&mut doc, &[PatchOperation::remove("/a/01")]);
        assert_eq!(err, Err(PatchError::PathNotFound("/a/01".to_string())));
    }

    #[test]
    fn test_whole_document_replace() {
        let mut doc = json!({ "a": 1 });
        apply_patch(&mut doc, &[PatchOperation::replace("", json!([1, 2]))]).expect("apply");
        assert_eq!(doc, json!([1, 2]));
    }
}
