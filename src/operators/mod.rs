//! Operator registry
//!
//! Maps the operation names used in `x-anonymize-operation` to typed
//! [`Operation`]s and applies them to values.
//!
//! Compilation happens once per rule when the engine is built: arguments are
//! checked, regexes compiled and nested operation names resolved, so a rule
//! set that builds will not fail on configuration at run time. The one
//! exception is `encrypt`/`decrypt` without a secret, reported when such a
//! rule actually meets a value.

mod compare;
pub mod compound;
pub mod conditional;
pub mod dates;
mod json_format;
pub mod primitives;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anonymizer_crypto::{AesEcbCipher, SymmetricCipher};
use regex::Regex;
use serde_json::Value;

use crate::error::{AnonymizerError, Result};

pub use compound::{CastType, EmbeddedFieldSpec, SplitSpec};
pub use conditional::{Combinator, ComparisonOperator, Condition, ConditionalSpec};
pub use json_format::to_spaced_json;

// ============================================================================
// Operation names
// ============================================================================

/// Every operation a schema can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    RoundIp,
    PutToNull,
    RoundFloatToInteger,
    RoundFloat,
    Encrypt,
    Decrypt,
    IsStringPresent,
    IsNumberPresent,
    IsEmailPresentOrTest,
    IsSlugPresentOrTest,
    TruncateDayFromStr,
    TruncateDayFromPosixTimestamp,
    TruncateDayFromEpochMilliseconds,
    ReplaceRegexMatchesWithString,
    ConditionalOperation,
    SplitAnonymizeAndJoin,
    ApplyFunctionOnFieldInJsonString,
    SerializeToJsonString,
    ConvertToFieldLength,
}

impl OperationKind {
    pub const ALL: [OperationKind; 19] = [
        Self::RoundIp,
        Self::PutToNull,
        Self::RoundFloatToInteger,
        Self::RoundFloat,
        Self::Encrypt,
        Self::Decrypt,
        Self::IsStringPresent,
        Self::IsNumberPresent,
        Self::IsEmailPresentOrTest,
        Self::IsSlugPresentOrTest,
        Self::TruncateDayFromStr,
        Self::TruncateDayFromPosixTimestamp,
        Self::TruncateDayFromEpochMilliseconds,
        Self::ReplaceRegexMatchesWithString,
        Self::ConditionalOperation,
        Self::SplitAnonymizeAndJoin,
        Self::ApplyFunctionOnFieldInJsonString,
        Self::SerializeToJsonString,
        Self::ConvertToFieldLength,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoundIp => "round_ip",
            Self::PutToNull => "put_to_null",
            Self::RoundFloatToInteger => "round_float_to_integer",
            Self::RoundFloat => "round_float",
            Self::Encrypt => "encrypt",
            Self::Decrypt => "decrypt",
            Self::IsStringPresent => "is_string_present",
            Self::IsNumberPresent => "is_number_present",
            Self::IsEmailPresentOrTest => "is_email_present_or_test",
            Self::IsSlugPresentOrTest => "is_slug_present_or_test",
            Self::TruncateDayFromStr => "truncate_day_from_str",
            Self::TruncateDayFromPosixTimestamp => "truncate_day_from_posix_timestamp",
            Self::TruncateDayFromEpochMilliseconds => "truncate_day_from_epoch_milliseconds",
            Self::ReplaceRegexMatchesWithString => "replace_regex_matches_with_string",
            Self::ConditionalOperation => "conditional_operation",
            Self::SplitAnonymizeAndJoin => "split_anonymize_and_join",
            Self::ApplyFunctionOnFieldInJsonString => "apply_function_on_field_in_json_string",
            Self::SerializeToJsonString => "serialize_to_json_string",
            Self::ConvertToFieldLength => "convert_to_field_length",
        }
    }

    /// Operations that need the engine's cipher.
    pub fn requires_secret(&self) -> bool {
        matches!(self, Self::Encrypt | Self::Decrypt)
    }
}

impl FromStr for OperationKind {
    type Err = AnonymizerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| AnonymizerError::UnknownOperation {
                name: s.to_string(),
            })
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Compiled operations
// ============================================================================

/// An operation with its arguments checked and prepared.
#[derive(Debug, Clone)]
pub enum Operation {
    RoundIp,
    PutToNull,
    RoundFloatToInteger,
    RoundFloat { ndigits: i32 },
    Encrypt,
    Decrypt,
    IsStringPresent,
    IsNumberPresent,
    IsEmailPresentOrTest { test_domains: Vec<String> },
    IsSlugPresentOrTest,
    TruncateDayFromStr { pattern: Option<String> },
    TruncateDayFromPosixTimestamp,
    TruncateDayFromEpochMilliseconds,
    ReplaceRegexMatches { pattern: Regex, replacement: String },
    Conditional(Vec<ConditionalSpec>),
    SplitAnonymizeAndJoin(Box<SplitSpec>),
    ApplyFunctionOnFieldInJsonString(Box<EmbeddedFieldSpec>),
    SerializeToJsonString,
    ConvertToFieldLength,
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::RoundIp => OperationKind::RoundIp,
            Self::PutToNull => OperationKind::PutToNull,
            Self::RoundFloatToInteger => OperationKind::RoundFloatToInteger,
            Self::RoundFloat { .. } => OperationKind::RoundFloat,
            Self::Encrypt => OperationKind::Encrypt,
            Self::Decrypt => OperationKind::Decrypt,
            Self::IsStringPresent => OperationKind::IsStringPresent,
            Self::IsNumberPresent => OperationKind::IsNumberPresent,
            Self::IsEmailPresentOrTest { .. } => OperationKind::IsEmailPresentOrTest,
            Self::IsSlugPresentOrTest => OperationKind::IsSlugPresentOrTest,
            Self::TruncateDayFromStr { .. } => OperationKind::TruncateDayFromStr,
            Self::TruncateDayFromPosixTimestamp => OperationKind::TruncateDayFromPosixTimestamp,
            Self::TruncateDayFromEpochMilliseconds => {
                OperationKind::TruncateDayFromEpochMilliseconds
            }
            Self::ReplaceRegexMatches { .. } => OperationKind::ReplaceRegexMatchesWithString,
            Self::Conditional(_) => OperationKind::ConditionalOperation,
            Self::SplitAnonymizeAndJoin(_) => OperationKind::SplitAnonymizeAndJoin,
            Self::ApplyFunctionOnFieldInJsonString(_) => {
                OperationKind::ApplyFunctionOnFieldInJsonString
            }
            Self::SerializeToJsonString => OperationKind::SerializeToJsonString,
            Self::ConvertToFieldLength => OperationKind::ConvertToFieldLength,
        }
    }

    /// True if this operation, or any operation nested in it, needs a cipher.
    pub fn requires_secret(&self) -> bool {
        match self {
            Self::Conditional(specs) => specs.iter().any(|spec| spec.operation.requires_secret()),
            Self::SplitAnonymizeAndJoin(spec) => spec.operation.requires_secret(),
            Self::ApplyFunctionOnFieldInJsonString(spec) => spec.operation.requires_secret(),
            other => other.kind().requires_secret(),
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Name lookup plus the shared collaborators operations need at run time.
#[derive(Clone, Default)]
pub struct OperatorRegistry {
    cipher: Option<Arc<dyn SymmetricCipher>>,
}

impl fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorRegistry")
            .field("cipher", &self.cipher.as_ref().map(|_| "<configured>"))
            .finish()
    }
}

impl OperatorRegistry {
    /// A registry without encryption support.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry encrypting with AES-256-ECB keyed by SHA-256 of `secret`.
    pub fn with_secret(secret: &str) -> Self {
        Self::with_cipher(Arc::new(AesEcbCipher::new(secret)))
    }

    pub fn with_cipher(cipher: Arc<dyn SymmetricCipher>) -> Self {
        Self {
            cipher: Some(cipher),
        }
    }

    pub fn has_cipher(&self) -> bool {
        self.cipher.is_some()
    }

    /// Names of all registered operations.
    pub fn names() -> impl Iterator<Item = &'static str> {
        OperationKind::ALL.into_iter().map(|kind| kind.as_str())
    }

    pub fn contains(name: &str) -> bool {
        name.parse::<OperationKind>().is_ok()
    }

    /// Resolve `name` and check its positional `args`.
    pub fn compile(&self, name: &str, args: &[Value]) -> Result<Operation> {
        let kind: OperationKind = name.parse()?;

        let operation = match kind {
            OperationKind::RoundIp => Operation::RoundIp,
            OperationKind::PutToNull => Operation::PutToNull,
            OperationKind::RoundFloatToInteger => Operation::RoundFloatToInteger,
            OperationKind::RoundFloat => Operation::RoundFloat {
                ndigits: ndigits_arg(kind, args)?,
            },
            OperationKind::Encrypt => Operation::Encrypt,
            OperationKind::Decrypt => Operation::Decrypt,
            OperationKind::IsStringPresent => Operation::IsStringPresent,
            OperationKind::IsNumberPresent => Operation::IsNumberPresent,
            OperationKind::IsEmailPresentOrTest => Operation::IsEmailPresentOrTest {
                test_domains: test_domains_arg(kind, args)?,
            },
            OperationKind::IsSlugPresentOrTest => Operation::IsSlugPresentOrTest,
            OperationKind::TruncateDayFromStr => Operation::TruncateDayFromStr {
                pattern: required_arg(kind, args, 0, "pattern")?
                    .as_str()
                    .map(str::to_string),
            },
            OperationKind::TruncateDayFromPosixTimestamp => {
                Operation::TruncateDayFromPosixTimestamp
            }
            OperationKind::TruncateDayFromEpochMilliseconds => {
                Operation::TruncateDayFromEpochMilliseconds
            }
            OperationKind::ReplaceRegexMatchesWithString => {
                let pattern = string_arg(kind, args, 0, "pattern")?;
                let replacement = string_arg(kind, args, 1, "replacement")?;
                let pattern = Regex::new(pattern).map_err(|err| {
                    AnonymizerError::invalid_arguments(
                        kind.as_str(),
                        format!("invalid regex: {}", err),
                    )
                })?;
                Operation::ReplaceRegexMatches {
                    pattern,
                    replacement: primitives::translate_replacement(replacement),
                }
            }
            OperationKind::ConditionalOperation => {
                Operation::Conditional(ConditionalSpec::compile_all(args, self)?)
            }
            OperationKind::SplitAnonymizeAndJoin => {
                Operation::SplitAnonymizeAndJoin(Box::new(SplitSpec::compile(args, self)?))
            }
            OperationKind::ApplyFunctionOnFieldInJsonString => {
                Operation::ApplyFunctionOnFieldInJsonString(Box::new(EmbeddedFieldSpec::compile(
                    args, self,
                )?))
            }
            OperationKind::SerializeToJsonString => Operation::SerializeToJsonString,
            OperationKind::ConvertToFieldLength => Operation::ConvertToFieldLength,
        };
        Ok(operation)
    }

    /// Apply a compiled operation to one value.
    pub fn apply(&self, operation: &Operation, value: Value) -> Result<Value> {
        match operation {
            Operation::RoundIp => primitives::round_ip(value),
            Operation::PutToNull => Ok(Value::Null),
            Operation::RoundFloatToInteger => primitives::round_float_to_integer(value),
            Operation::RoundFloat { ndigits } => primitives::round_float(value, *ndigits),
            Operation::Encrypt => self.encrypt(value),
            Operation::Decrypt => self.decrypt(value),
            Operation::IsStringPresent => Ok(Value::from(primitives::is_string_present(&value))),
            Operation::IsNumberPresent => Ok(primitives::is_number_present(&value)),
            Operation::IsEmailPresentOrTest { test_domains } => {
                Ok(primitives::is_email_present_or_test(&value, test_domains))
            }
            Operation::IsSlugPresentOrTest => Ok(primitives::is_slug_present_or_test(&value)),
            Operation::TruncateDayFromStr { pattern } => {
                Ok(dates::truncate_day_from_str(&value, pattern.as_deref()))
            }
            Operation::TruncateDayFromPosixTimestamp => {
                Ok(dates::truncate_day_from_posix_timestamp(&value))
            }
            Operation::TruncateDayFromEpochMilliseconds => {
                Ok(dates::truncate_day_from_epoch_milliseconds(&value))
            }
            Operation::ReplaceRegexMatches {
                pattern,
                replacement,
            } => primitives::replace_regex_matches(value, pattern, replacement),
            Operation::Conditional(specs) => conditional::conditional_operation(value, specs, self),
            Operation::SplitAnonymizeAndJoin(spec) => {
                compound::split_anonymize_and_join(value, spec, self)
            }
            Operation::ApplyFunctionOnFieldInJsonString(spec) => {
                compound::apply_function_on_field_in_json_string(value, spec, self)
            }
            Operation::SerializeToJsonString => compound::serialize_to_json_string(&value),
            Operation::ConvertToFieldLength => primitives::convert_to_field_length(&value),
        }
    }

    /// Compile and apply in one step.
    pub fn invoke(&self, name: &str, args: &[Value], value: Value) -> Result<Value> {
        let operation = self.compile(name, args)?;
        self.apply(&operation, value)
    }

    fn cipher_for(&self, kind: OperationKind) -> Result<&dyn SymmetricCipher> {
        self.cipher
            .as_deref()
            .ok_or_else(|| AnonymizerError::MissingSecret {
                operation: kind.as_str().to_string(),
            })
    }

    fn encrypt(&self, value: Value) -> Result<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        let cipher = self.cipher_for(OperationKind::Encrypt)?;
        let plaintext = primitives::coerce_to_string(&value);
        Ok(Value::String(cipher.encrypt(&plaintext)?))
    }

    fn decrypt(&self, value: Value) -> Result<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        let cipher = self.cipher_for(OperationKind::Decrypt)?;
        let ciphertext = primitives::coerce_to_string(&value);
        Ok(Value::String(cipher.decrypt(&ciphertext)?))
    }
}

fn required_arg<'a>(
    kind: OperationKind,
    args: &'a [Value],
    index: usize,
    name: &str,
) -> Result<&'a Value> {
    args.get(index).ok_or_else(|| {
        AnonymizerError::invalid_arguments(
            kind.as_str(),
            format!("missing argument {} ({})", index, name),
        )
    })
}

fn string_arg<'a>(
    kind: OperationKind,
    args: &'a [Value],
    index: usize,
    name: &str,
) -> Result<&'a str> {
    required_arg(kind, args, index, name)?.as_str().ok_or_else(|| {
        AnonymizerError::invalid_arguments(
            kind.as_str(),
            format!("argument {} ({}) must be a string", index, name),
        )
    })
}

fn ndigits_arg(kind: OperationKind, args: &[Value]) -> Result<i32> {
    required_arg(kind, args, 0, "ndigits")?
        .as_i64()
        .and_then(|n| i32::try_from(n).ok())
        .ok_or_else(|| {
            AnonymizerError::invalid_arguments(kind.as_str(), "ndigits must be an integer")
        })
}

fn test_domains_arg(kind: OperationKind, args: &[Value]) -> Result<Vec<String>> {
    let domains = required_arg(kind, args, 0, "test_domains")?;
    let not_a_list = || {
        AnonymizerError::invalid_arguments(kind.as_str(), "test_domains must be a list of strings")
    };
    domains
        .as_array()
        .ok_or_else(not_a_list)?
        .iter()
        .map(|domain| domain.as_str().map(str::to_string).ok_or_else(not_a_list))
        .collect()
}
