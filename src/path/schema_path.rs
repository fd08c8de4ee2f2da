//! Normalized, schema-derived paths

use std::fmt;

use serde::{Serialize, Serializer};

/// Textual form of the array wildcard segment.
pub const WILDCARD: &str = "[*]";

/// One step of a [`SchemaPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// An object member.
    Key(String),
    /// Every element of the array at this position.
    Wildcard,
}

impl PathSegment {
    pub fn key(name: impl Into<String>) -> Self {
        Self::Key(name.into())
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Wildcard)
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(name) => f.write_str(name),
            Self::Wildcard => f.write_str(WILDCARD),
        }
    }
}

/// A non-empty sequence of path segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaPath {
    segments: Vec<PathSegment>,
}

impl SchemaPath {
    /// Returns `None` for an empty segment list.
    pub fn new(segments: Vec<PathSegment>) -> Option<Self> {
        if segments.is_empty() {
            None
        } else {
            Some(Self { segments })
        }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn has_wildcard(&self) -> bool {
        self.segments.iter().any(PathSegment::is_wildcard)
    }
}

/// Renders as `sessions[*].lat`.
impl fmt::Display for SchemaPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 && !segment.is_wildcard() {
                f.write_str(".")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

impl Serialize for SchemaPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.segments.iter().map(|s| s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_path_rejected() {
        assert!(SchemaPath::new(vec![]).is_none());
    }

    #[test]
    fn test_display() {
        let path = SchemaPath::new(vec![
            PathSegment::key("sessions"),
            PathSegment::Wildcard,
            PathSegment::key("lat"),
        ])
        .unwrap();
        assert_eq!(path.to_string(), "sessions[*].lat");
        assert!(path.has_wildcard());

        let root_array = SchemaPath::new(vec![PathSegment::Wildcard]).unwrap();
        assert_eq!(root_array.to_string(), "[*]");
    }

    #[test]
    fn test_serializes_as_segment_list() {
        let path = SchemaPath::new(vec![PathSegment::key("ids"), PathSegment::Wildcard]).unwrap();
        assert_eq!(
            serde_json::to_value(&path).unwrap(),
            serde_json::json!(["ids", "[*]"])
        );
    }
}
