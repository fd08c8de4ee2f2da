//! Path languages and the path applier
//!
//! Two path languages live here:
//!
//! - [`SchemaPath`]: derived from a JSON-Schema by the walker. A sequence of
//!   object keys and array wildcards, never written by hand.
//! - [`DottedPath`]: `a.b.c` strings written by rule authors inside
//!   conditional operations, resolved relative to the object being matched.

mod applier;
mod dotted;
mod schema_path;

pub use applier::apply_by_path;
pub use dotted::DottedPath;
pub use schema_path::{PathSegment, SchemaPath, WILDCARD};
