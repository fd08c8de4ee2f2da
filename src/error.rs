//! Error handling for the anonymization engine
//!
//! Rule-authoring mistakes (unknown operations, malformed conditions, missing
//! secret, bad arguments) surface as errors. Document-shape variance such as
//! missing or null branches never does; those cases are handled in place.

use anonymizer_crypto::CryptoError;
use thiserror::Error;

/// Main error type for the anonymizer
#[derive(Error, Debug)]
pub enum AnonymizerError {
    #[error("Cannot create anonymizer: {message}")]
    Construction { message: String },

    #[error("Unknown anonymization operation '{name}'")]
    UnknownOperation { name: String },

    #[error("Operation '{operation}' requires an encryption secret, but none was configured")]
    MissingSecret { operation: String },

    #[error("Malformed conditional operation: {message}")]
    MalformedCondition { message: String },

    #[error("Invalid arguments for '{operation}': {message}")]
    InvalidArguments { operation: String, message: String },

    #[error("Operation '{operation}' cannot be applied to {found}")]
    InvalidValue { operation: String, found: String },

    #[error("Cannot evaluate {left} {operator} {right}")]
    IncomparableValues {
        operator: String,
        left: String,
        right: String,
    },

    #[error("Encryption error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AnonymizerError>;

impl AnonymizerError {
    pub fn construction(message: impl Into<String>) -> Self {
        Self::Construction {
            message: message.into(),
        }
    }

    pub fn malformed_condition(message: impl Into<String>) -> Self {
        Self::MalformedCondition {
            message: message.into(),
        }
    }

    pub fn invalid_arguments(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn invalid_value(operation: impl Into<String>, value: &serde_json::Value) -> Self {
        Self::InvalidValue {
            operation: operation.into(),
            found: describe_value(value),
        }
    }

    /// True for errors caused by the rule set rather than by a document.
    pub fn is_rule_error(&self) -> bool {
        matches!(
            self,
            Self::Construction { .. }
                | Self::UnknownOperation { .. }
                | Self::MissingSecret { .. }
                | Self::MalformedCondition { .. }
                | Self::InvalidArguments { .. }
        )
    }
}

/// Short type-plus-value description used in error messages.
pub(crate) fn describe_value(value: &serde_json::Value) -> String {
    use serde_json::Value;
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean {}", b),
        Value::Number(n) => format!("number {}", n),
        Value::String(s) => format!("string {:?}", s),
        Value::Array(items) => format!("array of {} elements", items.len()),
        Value::Object(map) => format!("object with {} keys", map.len()),
    }
}
