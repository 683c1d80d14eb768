//! Structural change analysis between two resource versions.

use serde_json::Value;

use quince_core::{PatchOperation, escape_pointer_segment};

/// Compares two versions of a resource and produces ordered patch
/// operations transforming the first into the second.
///
/// Implementations must be total (never fail), deterministic for
/// identical inputs, and return an empty sequence for structurally equal
/// inputs.
pub trait ChangeAnalyzer {
    /// Compute the operations turning `original` into `updated`.
    fn diff(&self, original: &Value, updated: &Value) -> Vec<PatchOperation>;
}

/// Field-by-field structural comparison.
///
/// Scalars produce `replace`; object members absent on one side produce
/// `add`/`remove`; arrays keep their common prefix and suffix and patch
/// the middle positionally.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultChangeAnalyzer;

impl ChangeAnalyzer for DefaultChangeAnalyzer {
    fn diff(&self, original: &Value, updated: &Value) -> Vec<PatchOperation> {
        diff(original, updated)
    }
}

/// Diff two JSON documents into an ordered patch. See
/// [`DefaultChangeAnalyzer`].
#[must_use]
pub fn diff(original: &Value, updated: &Value) -> Vec<PatchOperation> {
    let mut operations = Vec::new();
    diff_values("", original, updated, &mut operations);
    operations
}

fn diff_values(path: &str, original: &Value, updated: &Value, operations: &mut Vec<PatchOperation>) {
    if original == updated {
        return;
    }

    match (original, updated) {
        (Value::Object(before), Value::Object(after)) => {
            for (key, value) in before {
                let child = format!("{path}/{}", escape_pointer_segment(key));
                match after.get(key) {
                    Some(updated_value) => diff_values(&child, value, updated_value, operations),
                    None => operations.push(PatchOperation::remove(child)),
                }
            }
            for (key, value) in after {
                if !before.contains_key(key) {
                    let child = format!("{path}/{}", escape_pointer_segment(key));
                    operations.push(PatchOperation::add(child, value.clone()));
                }
            }
        }
        (Value::Array(before), Value::Array(after)) => {
            diff_arrays(path, before, after, operations);
        }
        _ => operations.push(PatchOperation::replace(path, updated.clone())),
    }
}

fn diff_arrays(
    path: &str,
    before: &[Value],
    after: &[Value],
    operations: &mut Vec<PatchOperation>,
) {
    let shorter = before.len().min(after.len());

    // Untouched common prefix
    let prefix = before
        .iter()
        .zip(after.iter())
        .take_while(|(a, b)| a == b)
        .count();

    // Untouched common suffix, never overlapping the prefix
    let mut suffix = 0;
    while suffix < shorter - prefix
        && before[before.len() - 1 - suffix] == after[after.len() - 1 - suffix]
    {
        suffix += 1;
    }

    let mid_before = before.len() - prefix - suffix;
    let mid_after = after.len() - prefix - suffix;

    // Positional updates within the overlapping middle
    for offset in 0..mid_before.min(mid_after) {
        let index = prefix + offset;
        diff_values(
            &format!("{path}/{index}"),
            &before[index],
            &after[index],
            operations,
        );
    }

    if mid_before > mid_after {
        // Shrink: repeated removal at the first surplus index
        for _ in 0..(mid_before - mid_after) {
            operations.push(PatchOperation::remove(format!(
                "{path}/{}",
                prefix + mid_after
            )));
        }
    } else {
        // Grow: insert the new elements at their final positions
        for index in (prefix + mid_before)..(prefix + mid_after) {
            operations.push(PatchOperation::add(
                format!("{path}/{index}"),
                after[index].clone(),
            ));
        }
    }
}
