//! Conditional operation evaluator
//!
//! A conditional rule sits on an object and carries one or more specs. Each
//! spec combines field predicates with `and`/`or` and, when they hold, runs a
//! nested operation on a target field of the same object:
//!
//! ```json
//! {
//!     "function": "put_to_null",
//!     "target_field": "attributes.name",
//!     "conditional_fields": ["type", "attributes.member_count"],
//!     "conditional_field_values_when_null": [null, 0],
//!     "conditional_values": ["random_group", 100],
//!     "conditional_operators": ["!=", "<"],
//!     "conditional_boolean_function": "or"
//! }
//! ```
//!
//! A scalar in place of a list is a one-element list. All four lists must
//! have the same length.

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};
use tracing::trace;

use super::compare::{compare_values, contains, values_equal};
use super::{Operation, OperatorRegistry};
use crate::error::{describe_value, AnonymizerError, Result};
use crate::path::DottedPath;

// ============================================================================
// Operators
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Lt,
    Le,
    Eq,
    Ne,
    Gt,
    Ge,
    In,
    NotIn,
}

impl ComparisonOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::In => "in",
            Self::NotIn => "not in",
        }
    }

    /// `left <op> right`; for `in` the left side is the needle.
    pub fn evaluate(&self, left: &Value, right: &Value) -> Result<bool> {
        let incomparable = || AnonymizerError::IncomparableValues {
            operator: self.as_str().to_string(),
            left: describe_value(left),
            right: describe_value(right),
        };

        match self {
            Self::Eq => Ok(values_equal(left, right)),
            Self::Ne => Ok(!values_equal(left, right)),
            Self::In => contains(right, left).ok_or_else(incomparable),
            Self::NotIn => contains(right, left).map(|found| !found).ok_or_else(incomparable),
            Self::Lt | Self::Le | Self::Gt | Self::Ge => {
                let ordering = compare_values(left, right).ok_or_else(incomparable)?;
                Ok(match self {
                    Self::Lt => ordering.is_lt(),
                    Self::Le => ordering.is_le(),
                    Self::Gt => ordering.is_gt(),
                    _ => ordering.is_ge(),
                })
            }
        }
    }
}

impl FromStr for ComparisonOperator {
    type Err = AnonymizerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "<" => Ok(Self::Lt),
            "<=" => Ok(Self::Le),
            "==" | "=" => Ok(Self::Eq),
            "!=" => Ok(Self::Ne),
            ">" => Ok(Self::Gt),
            ">=" => Ok(Self::Ge),
            "in" => Ok(Self::In),
            "not in" => Ok(Self::NotIn),
            other => Err(AnonymizerError::malformed_condition(format!(
                "unknown conditional operator '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the results of several conditions are folded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Combinator {
    #[default]
    And,
    Or,
}

impl Combinator {
    fn combine(self, acc: bool, next: bool) -> bool {
        match self {
            Self::And => acc && next,
            Self::Or => acc || next,
        }
    }
}

impl FromStr for Combinator {
    type Err = AnonymizerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "and" => Ok(Self::And),
            "or" => Ok(Self::Or),
            other => Err(AnonymizerError::malformed_condition(format!(
                "conditional_boolean_function must be 'and' or 'or', got '{}'",
                other
            ))),
        }
    }
}

// ============================================================================
// Specs
// ============================================================================

/// One predicate: the value at `field`, or `null_substitute` when that value
/// is missing or null, compared against `value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: DottedPath,
    pub operator: ComparisonOperator,
    pub value: Value,
    pub null_substitute: Value,
}

impl Condition {
    pub fn evaluate(&self, object: &Value) -> Result<bool> {
        let actual = self
            .field
            .resolve(object)
            .filter(|v| !v.is_null())
            .unwrap_or(&self.null_substitute);
        self.operator.evaluate(actual, &self.value)
    }
}

#[derive(Debug, Clone)]
pub struct ConditionalSpec {
    pub operation: Operation,
    pub target_field: DottedPath,
    pub conditions: Vec<Condition>,
    pub combinator: Combinator,
}

impl ConditionalSpec {
    /// Compile the specs of a `conditional_operation` rule: the first
    /// positional argument is one spec object or a list of them.
    pub(crate) fn compile_all(args: &[Value], registry: &OperatorRegistry) -> Result<Vec<Self>> {
        match args.first() {
            Some(Value::Object(spec)) => Ok(vec![Self::compile(spec, registry)?]),
            Some(Value::Array(specs)) if !specs.is_empty() => specs
                .iter()
                .map(|spec| match spec {
                    Value::Object(spec) => Self::compile(spec, registry),
                    other => Err(AnonymizerError::malformed_condition(format!(
                        "expected a spec object, got {}",
                        describe_value(other)
                    ))),
                })
                .collect(),
            Some(other) => Err(AnonymizerError::malformed_condition(format!(
                "expected a spec object or a non-empty list of them, got {}",
                describe_value(other)
            ))),
            None => Err(AnonymizerError::malformed_condition(
                "missing conditional arguments",
            )),
        }
    }

    pub fn compile(spec: &Map<String, Value>, registry: &OperatorRegistry) -> Result<Self> {
        let function = required(spec, "function")?.as_str().ok_or_else(|| {
            AnonymizerError::malformed_condition("'function' must be a string")
        })?;
        let function_args = match spec.get("function_args") {
            None | Some(Value::Null) => &[][..],
            Some(Value::Array(items)) => items.as_slice(),
            Some(_) => {
                return Err(AnonymizerError::malformed_condition(
                    "'function_args' must be an array",
                ))
            }
        };
        let target_field: DottedPath = required(spec, "target_field")?
            .as_str()
            .ok_or_else(|| AnonymizerError::malformed_condition("'target_field' must be a string"))?
            .parse()?;

        let fields = as_list(spec, "conditional_fields")?;
        let null_substitutes = as_list(spec, "conditional_field_values_when_null")?;
        let values = as_list(spec, "conditional_values")?;
        let operators = as_list(spec, "conditional_operators")?;

        let len = fields.len();
        if null_substitutes.len() != len || values.len() != len || operators.len() != len {
            return Err(AnonymizerError::malformed_condition(format!(
                "conditional argument lists differ in length: \
                 fields={}, values={}, operators={}, values_when_null={}",
                len,
                values.len(),
                operators.len(),
                null_substitutes.len()
            )));
        }
        if len == 0 {
            return Err(AnonymizerError::malformed_condition(
                "at least one condition is required",
            ));
        }

        let conditions = fields
            .into_iter()
            .zip(operators)
            .zip(values)
            .zip(null_substitutes)
            .map(|(((field, operator), value), null_substitute)| -> Result<Condition> {
                Ok(Condition {
                    field: list_str(&field, "conditional_fields")?.parse()?,
                    operator: list_str(&operator, "conditional_operators")?.parse()?,
                    value,
                    null_substitute,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let combinator = match spec.get("conditional_boolean_function") {
            None | Some(Value::Null) => Combinator::default(),
            Some(Value::String(name)) => name.parse()?,
            Some(_) => {
                return Err(AnonymizerError::malformed_condition(
                    "'conditional_boolean_function' must be a string",
                ))
            }
        };

        let operation = registry.compile(function, function_args)?;

        Ok(Self {
            operation,
            target_field,
            conditions,
            combinator,
        })
    }

    /// Evaluate the conditions against `object` and, if they hold, rewrite
    /// the target field. A target path that does not exist skips the spec.
    pub fn apply(&self, object: &mut Value, registry: &OperatorRegistry) -> Result<()> {
        if self.target_field.resolve(object).is_none() {
            trace!(target_field = %self.target_field, "Conditional target missing, skipping");
            return Ok(());
        }

        let mut holds = true;
        for (index, condition) in self.conditions.iter().enumerate() {
            let result = condition.evaluate(object)?;
            holds = if index == 0 {
                result
            } else {
                self.combinator.combine(holds, result)
            };
        }
        if !holds {
            trace!(target_field = %self.target_field, "Conditions not met");
            return Ok(());
        }

        let Some(target) = self.target_field.resolve_mut(object) else {
            return Ok(());
        };
        let rewritten = match &*target {
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| registry.apply(&self.operation, item.clone()))
                    .collect::<Result<_>>()?,
            ),
            other => registry.apply(&self.operation, other.clone())?,
        };
        *target = rewritten;
        Ok(())
    }
}

fn required<'a>(spec: &'a Map<String, Value>, key: &str) -> Result<&'a Value> {
    spec.get(key)
        .ok_or_else(|| AnonymizerError::malformed_condition(format!("missing '{}'", key)))
}

fn as_list(spec: &Map<String, Value>, key: &str) -> Result<Vec<Value>> {
    match required(spec, key)? {
        Value::Array(items) => Ok(items.clone()),
        scalar => Ok(vec![scalar.clone()]),
    }
}

fn list_str<'a>(value: &'a Value, key: &str) -> Result<&'a str> {
    value.as_str().ok_or_else(|| {
        AnonymizerError::malformed_condition(format!(
            "entries of '{}' must be strings, got {}",
            key,
            describe_value(value)
        ))
    })
}

/// Run every spec in order against the matched object. Null stays null.
pub fn conditional_operation(
    value: Value,
    specs: &[ConditionalSpec],
    registry: &OperatorRegistry,
) -> Result<Value> {
    let mut object = value;
    if object.is_null() {
        return Ok(object);
    }
    for spec in specs {
        spec.apply(&mut object, registry)?;
    }
    Ok(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(document: Value, args: Value) -> Result<Value> {
        let registry = OperatorRegistry::with_secret("123");
        let specs = ConditionalSpec::compile_all(&[args], &registry)?;
        conditional_operation(document, &specs, &registry)
    }

    fn encrypt_when_type_is(value: Value) -> Value {
        json!({
            "function": "encrypt",
            "target_field": "id",
            "conditional_fields": "type",
            "conditional_field_values_when_null": null,
            "conditional_values": value,
            "conditional_operators": "=="
        })
    }

    #[test]
    fn test_single_condition_met() {
        let out = run(
            json!({"type": "user", "id": "1234567"}),
            encrypt_when_type_is(json!("user")),
        )
        .unwrap();
        assert_eq!(out, json!({"type": "user", "id": "Zh7hpRitlY7ANahH3RDk7w=="}));
    }

    #[test]
    fn test_single_condition_not_met() {
        let doc = json!({"type": "group", "id": "1234567"});
        assert_eq!(run(doc.clone(), encrypt_when_type_is(json!("user"))).unwrap(), doc);
    }

    #[test]
    fn test_null_field_compared_through_substitute() {
        let doc = json!({"type": null, "id": "test"});
        let out = run(doc, encrypt_when_type_is(Value::Null)).unwrap();
        assert_eq!(out, json!({"type": null, "id": "KfrlmeI/MCzm5GUeRFz0ag=="}));
    }

    #[test]
    fn test_missing_condition_field_uses_substitute() {
        let args = json!({
            "function": "put_to_null",
            "target_field": "name",
            "conditional_fields": "attributes.member_count",
            "conditional_field_values_when_null": 0,
            "conditional_values": 100,
            "conditional_operators": "<"
        });
        let out = run(json!({"name": "runners", "attributes": {}}), args).unwrap();
        assert_eq!(out, json!({"name": null, "attributes": {}}));
    }

    #[test]
    fn test_or_combination() {
        let args = json!({
            "function": "put_to_null",
            "target_field": "attributes.name",
            "conditional_fields": ["type", "attributes.member_count"],
            "conditional_field_values_when_null": [null, 0],
            "conditional_values": ["random_group", 100],
            "conditional_operators": ["!=", "<"],
            "conditional_boolean_function": "or"
        });
        let big = json!({"type": "random_group", "attributes": {"name": "x", "member_count": 500}});
        assert_eq!(run(big.clone(), args.clone()).unwrap(), big);

        let small = json!({"type": "random_group", "attributes": {"name": "x", "member_count": 5}});
        assert_eq!(
            run(small, args).unwrap(),
            json!({"type": "random_group", "attributes": {"name": null, "member_count": 5}})
        );
    }

    #[test]
    fn test_and_combination_is_default() {
        let args = json!({
            "function": "put_to_null",
            "target_field": "id",
            "conditional_fields": ["type", "count"],
            "conditional_field_values_when_null": [null, null],
            "conditional_values": ["user", 2],
            "conditional_operators": ["==", ">="]
        });
        let doc = json!({"type": "user", "count": 1, "id": 7});
        assert_eq!(run(doc.clone(), args.clone()).unwrap(), doc);
        let doc = json!({"type": "user", "count": 2.0, "id": 7});
        assert_eq!(run(doc, args).unwrap(), json!({"type": "user", "count": 2.0, "id": null}));
    }

    #[test]
    fn test_in_operator_with_wrapped_list() {
        let args = json!({
            "function": "encrypt",
            "target_field": "id",
            "conditional_fields": "type",
            "conditional_field_values_when_null": null,
            "conditional_values": [["runners_group", "community_group"]],
            "conditional_operators": "in"
        });
        let out = run(json!({"type": "runners_group", "id": "test"}), args.clone()).unwrap();
        assert_eq!(out["id"], json!("KfrlmeI/MCzm5GUeRFz0ag=="));

        let doc = json!({"type": "private_group", "id": "test"});
        assert_eq!(run(doc.clone(), args).unwrap(), doc);
    }

    #[test]
    fn test_array_target_is_mapped_element_wise() {
        let args = json!({
            "function": "encrypt",
            "target_field": "relationships.ids",
            "conditional_fields": "type",
            "conditional_field_values_when_null": null,
            "conditional_values": "user",
            "conditional_operators": "=="
        });
        let out = run(
            json!({"type": "user", "relationships": {"ids": [2, 3, 4]}}),
            args,
        )
        .unwrap();
        assert_eq!(
            out["relationships"]["ids"],
            json!([
                "JbAbzZt+w7vv/SPXXQI4Jw==",
                "9htZqKFcgoVKuq2rxtHzZA==",
                "XqoM7JxhN5obnSMM9uNEiA=="
            ])
        );
    }

    #[test]
    fn test_missing_target_path_skips() {
        let args = json!({
            "function": "encrypt",
            "target_field": "attributes.source_content.id",
            "conditional_fields": "type",
            "conditional_field_values_when_null": null,
            "conditional_values": "sport_activity",
            "conditional_operators": "=="
        });
        let doc = json!({"type": "sport_activity", "attributes": {"title": "run"}});
        assert_eq!(run(doc.clone(), args).unwrap(), doc);
    }

    #[test]
    fn test_specs_run_in_order() {
        let args = json!([
            encrypt_when_type_is(json!("user")),
            {
                "function": "put_to_null",
                "target_field": "type",
                "conditional_fields": "type",
                "conditional_field_values_when_null": null,
                "conditional_values": "user",
                "conditional_operators": "=="
            }
        ]);
        let out = run(json!({"type": "user", "id": "test"}), args).unwrap();
        assert_eq!(out, json!({"type": null, "id": "KfrlmeI/MCzm5GUeRFz0ag=="}));
    }

    #[test]
    fn test_null_object_passes_through() {
        assert_eq!(run(Value::Null, encrypt_when_type_is(json!("user"))).unwrap(), Value::Null);
    }

    #[test]
    fn test_list_length_mismatch_is_malformed() {
        let args = json!({
            "function": "encrypt",
            "target_field": "id",
            "conditional_fields": ["type", "count"],
            "conditional_field_values_when_null": null,
            "conditional_values": ["user", 1],
            "conditional_operators": ["==", ">"]
        });
        assert!(matches!(
            run(json!({"id": 1}), args),
            Err(AnonymizerError::MalformedCondition { .. })
        ));
    }

    #[test]
    fn test_malformed_specs_rejected() {
        let registry = OperatorRegistry::new();
        let mut missing_target = encrypt_when_type_is(json!("user"));
        missing_target.as_object_mut().unwrap().remove("target_field");
        assert!(matches!(
            ConditionalSpec::compile_all(&[missing_target], &registry),
            Err(AnonymizerError::MalformedCondition { .. })
        ));

        let mut bad_operator = encrypt_when_type_is(json!("user"));
        bad_operator["conditional_operators"] = json!("~=");
        assert!(matches!(
            ConditionalSpec::compile_all(&[bad_operator], &registry),
            Err(AnonymizerError::MalformedCondition { .. })
        ));

        let mut bad_function = encrypt_when_type_is(json!("user"));
        bad_function["function"] = json!("encrpyt");
        assert!(matches!(
            ConditionalSpec::compile_all(&[bad_function], &registry),
            Err(AnonymizerError::UnknownOperation { .. })
        ));

        assert!(matches!(
            ConditionalSpec::compile_all(&[json!("encrypt")], &registry),
            Err(AnonymizerError::MalformedCondition { .. })
        ));
        assert!(matches!(
            ConditionalSpec::compile_all(&[], &registry),
            Err(AnonymizerError::MalformedCondition { .. })
        ));
    }

    #[test]
    fn test_ordering_against_null_without_substitute_errors() {
        let args = json!({
            "function": "put_to_null",
            "target_field": "id",
            "conditional_fields": "count",
            "conditional_field_values_when_null": null,
            "conditional_values": 3,
            "conditional_operators": "<"
        });
        assert!(matches!(
            run(json!({"id": 1, "count": null}), args),
            Err(AnonymizerError::IncomparableValues { .. })
        ));
    }

    #[test]
    fn test_operator_parsing() {
        assert_eq!("=".parse::<ComparisonOperator>().unwrap(), ComparisonOperator::Eq);
        assert_eq!("not in".parse::<ComparisonOperator>().unwrap(), ComparisonOperator::NotIn);
        assert_eq!(ComparisonOperator::Ge.to_string(), ">=");
        assert!("xor".parse::<Combinator>().is_err());
    }

    #[test]
    fn test_not_in_substring() {
        let op = ComparisonOperator::NotIn;
        assert!(op.evaluate(&json!("bike"), &json!("running plan")).unwrap());
        assert!(!op.evaluate(&json!("run"), &json!("running plan")).unwrap());
        assert!(op.evaluate(&json!(1), &json!(true)).is_err());
    }
}
