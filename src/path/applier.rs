//! Path applier
//!
//! Descends a document along a [`SchemaPath`] and rewrites every matching
//! value in place. Missing keys, null or empty intermediate nodes and type
//! mismatches end the descent for that branch silently: many rules only apply
//! to some document shapes.

use serde_json::Value;

use super::schema_path::{PathSegment, SchemaPath};
use crate::error::Result;

/// Apply `operation` to every location in `document` addressed by `path`.
///
/// The document is mutated in place. Returns the number of values that were
/// rewritten; zero means nothing matched, which is not an error. If the
/// operation fails the error is returned immediately and the value it was
/// given keeps its original content.
pub fn apply_by_path<F>(
    document: &mut Value,
    path: &SchemaPath,
    mut operation: F,
) -> Result<usize>
where
    F: FnMut(Value) -> Result<Value>,
{
    apply_segments(document, path.segments(), &mut operation)
}

fn apply_segments<F>(
    subtree: &mut Value,
    segments: &[PathSegment],
    operation: &mut F,
) -> Result<usize>
where
    F: FnMut(Value) -> Result<Value>,
{
    let Some((head, rest)) = segments.split_first() else {
        return Ok(0);
    };
    if is_vacant(subtree) {
        return Ok(0);
    }

    match (head, subtree) {
        (PathSegment::Wildcard, Value::Array(items)) => {
            let mut rewritten = 0;
            for item in items.iter_mut() {
                if rest.is_empty() {
                    replace_with(item, operation)?;
                    rewritten += 1;
                } else {
                    rewritten += apply_segments(item, rest, operation)?;
                }
            }
            Ok(rewritten)
        }
        (PathSegment::Key(key), Value::Object(map)) => match map.get_mut(key) {
            Some(child) if rest.is_empty() => {
                replace_with(child, operation)?;
                Ok(1)
            }
            Some(child) => apply_segments(child, rest, operation),
            None => Ok(0),
        },
        _ => Ok(0),
    }
}

fn replace_with<F>(slot: &mut Value, operation: &mut F) -> Result<()>
where
    F: FnMut(Value) -> Result<Value>,
{
    *slot = operation(slot.clone())?;
    Ok(())
}

/// Null and empty containers cannot be descended into.
fn is_vacant(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
