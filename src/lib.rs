//! Schema-driven anonymization of JSON documents.
//!
//! Schema authors annotate fields of a JSON-Schema with
//! `x-anonymize-operation` (and positional `x-anonymize-args`); the engine
//! finds every annotated field in a document and rewrites it in place.
//!
//! # Architecture
//!
//! ```text
//! JSON-Schema ──► schema walker ──► Rule { path, operation, args }
//!                                         │
//!                                         ▼
//!                              OperatorRegistry::compile
//!                                         │
//!                                         ▼
//! document ──► Anonymizer::anonymize ──► path applier ──► Operation
//!                                                           │
//!                              ┌────────────────────────────┼───────────────────┐
//!                              ▼                            ▼                   ▼
//!                         primitives               conditional evaluator   compound ops
//!                  (rounding, presence, dates,   (field predicates, then  (split/join,
//!                   regex, encryption)            a nested operation)      embedded JSON)
//! ```
//!
//! # Example
//!
//! ```
//! use json_anonymizer::Anonymizer;
//! use serde_json::json;
//!
//! let schema = json!({
//!     "type": "object",
//!     "properties": {
//!         "ip": {"type": "string", "x-anonymize-operation": "round_ip"},
//!         "sessions": {
//!             "type": "array",
//!             "items": {
//!                 "type": "object",
//!                 "properties": {
//!                     "lat": {
//!                         "type": "number",
//!                         "x-anonymize-operation": "round_float",
//!                         "x-anonymize-args": [1]
//!                     }
//!                 }
//!             }
//!         }
//!     }
//! });
//!
//! let anonymizer = Anonymizer::new(schema, None).unwrap();
//! let out = anonymizer
//!     .anonymize_value(json!({"ip": "192.168.1.1", "sessions": [{"lat": 52.5206}]}))
//!     .unwrap();
//! assert_eq!(out, json!({"ip": "192.168.0.0", "sessions": [{"lat": 52.5}]}));
//! ```

pub mod anonymizer;
pub mod config;
pub mod error;
pub mod logging;
pub mod operators;
pub mod path;
pub mod schema;

pub use anonymizer::{Anonymizer, AnonymizerBuilder, CompiledRule};
pub use config::{AnonymizerConfig, SchemaSource};
pub use error::{AnonymizerError, Result};
pub use logging::init_tracing;
pub use operators::{Operation, OperationKind, OperatorRegistry};
pub use path::{DottedPath, PathSegment, SchemaPath};
pub use schema::{extract_rules, Rule};

pub use anonymizer_crypto::{AesEcbCipher, CryptoError, SymmetricCipher};
