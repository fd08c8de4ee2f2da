//! Operations that run another operation on parts of a string value

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

use super::json_format::to_spaced_json;
use super::primitives::{coerce_to_string, float_value};
use super::{Operation, OperationKind, OperatorRegistry};
use crate::error::{AnonymizerError, Result};

/// Element type a string part is converted to before the nested operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CastType {
    #[default]
    Str,
    Int,
    Float,
    Bool,
}

impl CastType {
    /// Convert `value`; a failed conversion gives null and null stays null.
    pub fn cast(self, value: Value) -> Value {
        match (self, value) {
            (_, Value::Null) => Value::Null,
            (Self::Str, Value::String(s)) => Value::String(s),
            (Self::Str, other) => Value::String(coerce_to_string(&other)),
            (Self::Int, Value::String(s)) => {
                s.trim().parse::<i64>().map(Value::from).unwrap_or(Value::Null)
            }
            (Self::Int, Value::Number(n)) => match n.as_i64() {
                Some(i) => Value::from(i),
                None => n
                    .as_f64()
                    .map(f64::trunc)
                    .filter(|f| *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                    .map(|f| Value::from(f as i64))
                    .unwrap_or(Value::Null),
            },
            (Self::Int, Value::Bool(b)) => Value::from(i64::from(b)),
            (Self::Float, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .map(float_value)
                .unwrap_or(Value::Null),
            (Self::Float, Value::Number(n)) => n.as_f64().map(float_value).unwrap_or(Value::Null),
            (Self::Float, Value::Bool(b)) => float_value(if b { 1.0 } else { 0.0 }),
            (Self::Bool, value) => Value::Bool(is_truthy(&value)),
            (_, _) => Value::Null,
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

impl FromStr for CastType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "str" => Ok(Self::Str),
            "int" => Ok(Self::Int),
            "float" => Ok(Self::Float),
            "bool" => Ok(Self::Bool),
            other => Err(format!(
                "unsupported cast_element_to '{}' (expected str, int, float or bool)",
                other
            )),
        }
    }
}

impl fmt::Display for CastType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Str => "str",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
        })
    }
}

/// Arguments of `split_anonymize_and_join`.
#[derive(Debug, Clone)]
pub struct SplitSpec {
    pub separator: String,
    pub operation: Operation,
    pub cast: CastType,
}

impl SplitSpec {
    pub(crate) fn compile(args: &[Value], registry: &OperatorRegistry) -> Result<Self> {
        let kind = OperationKind::SplitAnonymizeAndJoin;
        let spec = options(kind, args)?;
        let separator = required_str(kind, spec, "separator")?;
        if separator.is_empty() {
            return Err(AnonymizerError::invalid_arguments(
                kind.as_str(),
                "separator must not be empty",
            ));
        }
        let (operation, cast) = nested_call(kind, spec, registry)?;
        Ok(Self {
            separator: separator.to_string(),
            operation,
            cast,
        })
    }
}

/// Arguments of `apply_function_on_field_in_json_string`.
#[derive(Debug, Clone)]
pub struct EmbeddedFieldSpec {
    pub target_field: String,
    pub operation: Operation,
    pub cast: CastType,
}

impl EmbeddedFieldSpec {
    pub(crate) fn compile(args: &[Value], registry: &OperatorRegistry) -> Result<Self> {
        let kind = OperationKind::ApplyFunctionOnFieldInJsonString;
        let spec = options(kind, args)?;
        let target_field = required_str(kind, spec, "target_field")?.to_string();
        let (operation, cast) = nested_call(kind, spec, registry)?;
        Ok(Self {
            target_field,
            operation,
            cast,
        })
    }
}

/// The single keyword-style argument object both compound operations take.
fn options(kind: OperationKind, args: &[Value]) -> Result<&Map<String, Value>> {
    args.first().and_then(Value::as_object).ok_or_else(|| {
        AnonymizerError::invalid_arguments(kind.as_str(), "expected an object as first argument")
    })
}

fn required_str<'a>(
    kind: OperationKind,
    spec: &'a Map<String, Value>,
    key: &str,
) -> Result<&'a str> {
    spec.get(key).and_then(Value::as_str).ok_or_else(|| {
        AnonymizerError::invalid_arguments(kind.as_str(), format!("'{}' must be a string", key))
    })
}

/// Compile `function` / `function_args` / `cast_element_to`.
fn nested_call(
    kind: OperationKind,
    spec: &Map<String, Value>,
    registry: &OperatorRegistry,
) -> Result<(Operation, CastType)> {
    let function = required_str(kind, spec, "function")?;
    let function_args = match spec.get("function_args") {
        None | Some(Value::Null) => &[][..],
        Some(Value::Array(items)) => items.as_slice(),
        Some(_) => {
            return Err(AnonymizerError::invalid_arguments(
                kind.as_str(),
                "'function_args' must be an array",
            ))
        }
    };
    let cast = match spec.get("cast_element_to") {
        None => CastType::default(),
        Some(Value::String(name)) => name
            .parse()
            .map_err(|message| AnonymizerError::invalid_arguments(kind.as_str(), message))?,
        Some(_) => {
            return Err(AnonymizerError::invalid_arguments(
                kind.as_str(),
                "'cast_element_to' must be a string",
            ))
        }
    };
    let operation = registry.compile(function, function_args)?;
    Ok((operation, cast))
}

/// Split on the separator, trim and cast every part, run the nested operation
/// and join the results back with the same separator.
pub fn split_anonymize_and_join(
    value: Value,
    spec: &SplitSpec,
    registry: &OperatorRegistry,
) -> Result<Value> {
    let text = match value {
        Value::Null => return Ok(Value::Null),
        Value::String(text) => text,
        other => {
            return Err(AnonymizerError::invalid_value(
                OperationKind::SplitAnonymizeAndJoin.as_str(),
                &other,
            ))
        }
    };

    let parts = text
        .split(spec.separator.as_str())
        .map(|element| -> Result<String> {
            let element = spec.cast.cast(Value::String(element.trim().to_string()));
            let result = registry.apply(&spec.operation, element)?;
            Ok(coerce_to_string(&result))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Value::String(parts.join(&spec.separator)))
}

/// Run the nested operation on one top-level field of a JSON object held in
/// a string. The object is re-serialized even if the field is absent.
pub fn apply_function_on_field_in_json_string(
    value: Value,
    spec: &EmbeddedFieldSpec,
    registry: &OperatorRegistry,
) -> Result<Value> {
    let kind = OperationKind::ApplyFunctionOnFieldInJsonString;
    let text = match value {
        Value::Null => return Ok(Value::Null),
        Value::String(text) => text,
        other => return Err(AnonymizerError::invalid_value(kind.as_str(), &other)),
    };

    let mut embedded: Value = serde_json::from_str(&text)?;
    let Some(object) = embedded.as_object_mut() else {
        return Err(AnonymizerError::invalid_value(kind.as_str(), &embedded));
    };
    if let Some(slot) = object.get_mut(&spec.target_field) {
        let current = spec.cast.cast(slot.clone());
        *slot = registry.apply(&spec.operation, current)?;
    }

    Ok(Value::String(to_spaced_json(&embedded)?))
}

/// JSON text of any value; `null` becomes the string `"null"`.
pub fn serialize_to_json_string(value: &Value) -> Result<Value> {
    Ok(Value::String(to_spaced_json(value)?))
}
