//! Schema walker
//!
//! Discovers annotated fields in a JSON-Schema and turns them into [`Rule`]s.

mod walker;

pub use walker::{extract_rules, Rule, ARGS_KEYWORD, OPERATION_KEYWORD};
