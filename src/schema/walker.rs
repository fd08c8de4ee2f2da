//! Rule extraction from annotated JSON-Schemas
//!
//! A schema path like `/properties/user/properties/id` is tracked as the
//! document path `user.id`: `properties` under an object-typed node is schema
//! sugar and adds no segment, `items` under an array-typed node becomes the
//! wildcard. Every other object-valued key is kept as a literal segment.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{AnonymizerError, Result};
use crate::path::{PathSegment, SchemaPath};

/// Annotation naming the operation to apply.
pub const OPERATION_KEYWORD: &str = "x-anonymize-operation";
/// Annotation holding the positional operation arguments.
pub const ARGS_KEYWORD: &str = "x-anonymize-args";

const PROPERTIES_KEYWORD: &str = "properties";
const ITEMS_KEYWORD: &str = "items";

/// A schema-derived (path, operation, arguments) triple.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rule {
    pub path: SchemaPath,
    pub operation: String,
    pub args: Vec<Value>,
}

/// Walk `schema` once and return its rules in pre-order.
pub fn extract_rules(schema: &Value) -> Result<Vec<Rule>> {
    let root = schema
        .as_object()
        .ok_or_else(|| AnonymizerError::construction("schema must be a JSON object"))?;

    let mut rules = Vec::new();
    let mut path = Vec::new();
    walk(root, &mut path, &mut rules)?;

    debug!(rules = rules.len(), "Extracted anonymization rules from schema");
    Ok(rules)
}

fn walk(
    node: &Map<String, Value>,
    path: &mut Vec<PathSegment>,
    rules: &mut Vec<Rule>,
) -> Result<()> {
    if let Some(annotation) = node.get(OPERATION_KEYWORD) {
        let (operation, args) = read_annotation(node, annotation, path)?;
        match SchemaPath::new(path.clone()) {
            Some(rule_path) => rules.push(Rule {
                path: rule_path,
                operation,
                args,
            }),
            None => warn!(%operation, "Ignoring anonymization annotation on the schema root"),
        }
    }

    for (key, child) in node {
        let Value::Object(child) = child else {
            continue;
        };

        if key == PROPERTIES_KEYWORD && declares_type(node, "object") {
            walk(child, path, rules)?;
            continue;
        }

        let segment = if key == ITEMS_KEYWORD && declares_type(node, "array") {
            PathSegment::Wildcard
        } else {
            PathSegment::key(key.as_str())
        };
        path.push(segment);
        walk(child, path, rules)?;
        path.pop();
    }

    Ok(())
}

fn read_annotation(
    node: &Map<String, Value>,
    annotation: &Value,
    path: &[PathSegment],
) -> Result<(String, Vec<Value>)> {
    let location = || {
        SchemaPath::new(path.to_vec())
            .map(|p| p.to_string())
            .unwrap_or_else(|| "<root>".to_string())
    };

    let operation = annotation.as_str().ok_or_else(|| {
        AnonymizerError::construction(format!(
            "{} at '{}' must be a string",
            OPERATION_KEYWORD,
            location()
        ))
    })?;

    let args = match node.get(ARGS_KEYWORD) {
        None => Vec::new(),
        Some(Value::Array(args)) => args.clone(),
        Some(_) => {
            return Err(AnonymizerError::construction(format!(
                "{} at '{}' must be an array",
                ARGS_KEYWORD,
                location()
            )))
        }
    };

    Ok((operation.to_string(), args))
}

/// `type` may be a single name or a list of names (`["null", "object"]`).
fn declares_type(node: &Map<String, Value>, name: &str) -> bool {
    match node.get("type") {
        Some(Value::String(declared)) => declared == name,
        Some(Value::Array(declared)) => declared.iter().any(|t| t.as_str() == Some(name)),
        _ => false,
    }
}
