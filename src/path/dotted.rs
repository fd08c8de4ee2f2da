//! Dotted paths used inside conditional operations

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::AnonymizerError;

/// A user-authored `a.b.c` path, relative to the object being matched.
///
/// Numeric segments index into arrays (`items.0.id`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DottedPath {
    raw: String,
    segments: Vec<String>,
}

impl DottedPath {
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Follow the path; `None` if any segment is missing or a non-container is
    /// reached before the end. A present `null` leaf resolves to `Some(Null)`.
    pub fn resolve<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(root, |current, segment| step(current, segment))
    }

    pub fn resolve_mut<'a>(&self, root: &'a mut Value) -> Option<&'a mut Value> {
        let mut current = root;
        for segment in &self.segments {
            current = step_mut(current, segment)?;
        }
        Some(current)
    }
}

fn step<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn step_mut<'a>(value: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    match value {
        Value::Object(map) => map.get_mut(segment),
        Value::Array(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(move |i| items.get_mut(i)),
        _ => None,
    }
}

impl FromStr for DottedPath {
    type Err = AnonymizerError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let segments: Vec<String> = raw.split('.').map(str::to_string).collect();
        if raw.is_empty() || segments.iter().any(|s| s.is_empty()) {
            return Err(AnonymizerError::malformed_condition(format!(
                "invalid dotted path '{}'",
                raw
            )));
        }
        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }
}

impl fmt::Display for DottedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse() {
        let path: DottedPath = "attributes.source_content.id".parse().unwrap();
        assert_eq!(path.segments(), ["attributes", "source_content", "id"]);
        assert_eq!(path.to_string(), "attributes.source_content.id");
    }

    #[test]
    fn test_parse_rejects_empty_segments() {
        assert!("".parse::<DottedPath>().is_err());
        assert!("a..b".parse::<DottedPath>().is_err());
        assert!(".a".parse::<DottedPath>().is_err());
    }

    #[test]
    fn test_resolve() {
        let doc = json!({"next_layer": {"count": 2, "empty": null}});
        let count: DottedPath = "next_layer.count".parse().unwrap();
        let empty: DottedPath = "next_layer.empty".parse().unwrap();
        let missing: DottedPath = "next_layer.nope.deeper".parse().unwrap();
        assert_eq!(count.resolve(&doc), Some(&json!(2)));
        assert_eq!(empty.resolve(&doc), Some(&Value::Null));
        assert_eq!(missing.resolve(&doc), None);
    }

    #[test]
    fn test_resolve_through_null_is_missing() {
        let doc = json!({"attributes": null});
        let path: DottedPath = "attributes.id".parse().unwrap();
        assert_eq!(path.resolve(&doc), None);
    }

    #[test]
    fn test_resolve_array_index() {
        let mut doc = json!({"items": [{"id": "a"}, {"id": "b"}]});
        let path: DottedPath = "items.1.id".parse().unwrap();
        assert_eq!(path.resolve(&doc), Some(&json!("b")));
        *path.resolve_mut(&mut doc).unwrap() = json!("z");
        assert_eq!(doc["items"][1]["id"], json!("z"));
    }
}
