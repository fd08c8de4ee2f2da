//! Engine configuration
//!
//! A schema plus an optional encryption secret, loaded from a YAML file or
//! from the environment (`.env` supported).

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::error::{AnonymizerError, Result};

/// Environment variable holding the schema file path.
pub const SCHEMA_PATH_ENV: &str = "ANONYMIZER_SCHEMA_PATH";
/// Environment variable holding the encryption secret.
pub const ENCRYPTION_SECRET_ENV: &str = "ANONYMIZER_ENCRYPTION_SECRET";

/// Where the annotated schema comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaSource {
    Inline(Value),
    Text(String),
    File(PathBuf),
}

impl SchemaSource {
    /// Read and parse the schema document.
    pub fn load(&self) -> Result<Value> {
        match self {
            Self::Inline(schema) => Ok(schema.clone()),
            Self::Text(text) => parse_schema_text(text),
            Self::File(path) => parse_schema_text(&std::fs::read_to_string(path)?),
        }
    }
}

/// Blank text counts as no schema at all.
fn parse_schema_text(text: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Err(AnonymizerError::construction("no schema supplied"));
    }
    Ok(serde_json::from_str(text)?)
}

#[derive(Clone, PartialEq)]
pub struct AnonymizerConfig {
    pub schema: SchemaSource,
    pub encryption_secret: Option<String>,
}

impl fmt::Debug for AnonymizerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnonymizerConfig")
            .field("schema", &self.schema)
            .field(
                "encryption_secret",
                &self.encryption_secret.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// On-disk layout: exactly one of `schema_path` or `schema`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    schema_path: Option<PathBuf>,
    schema: Option<Value>,
    encryption_secret: Option<String>,
}

impl AnonymizerConfig {
    pub fn new(schema: SchemaSource, encryption_secret: Option<String>) -> Self {
        Self {
            schema,
            encryption_secret,
        }
    }

    /// Load from a YAML file. A relative `schema_path` is resolved against the
    /// directory holding the config file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let file: ConfigFile = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        let schema = match (file.schema_path, file.schema) {
            (Some(_), Some(_)) => bail!(
                "{}: set either 'schema_path' or 'schema', not both",
                path.display()
            ),
            (None, None) => bail!("{}: missing 'schema_path' or 'schema'", path.display()),
            (Some(schema_path), None) if schema_path.is_relative() => {
                let base = path.parent().unwrap_or_else(|| Path::new("."));
                SchemaSource::File(base.join(schema_path))
            }
            (Some(schema_path), None) => SchemaSource::File(schema_path),
            (None, Some(schema)) => SchemaSource::Inline(schema),
        };

        info!(config = %path.display(), "Loaded anonymizer config");
        Ok(Self::new(schema, non_empty(file.encryption_secret)))
    }

    /// Load from `ANONYMIZER_SCHEMA_PATH` / `ANONYMIZER_ENCRYPTION_SECRET`,
    /// reading a `.env` file first if present.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let schema_path = non_empty(lookup(SCHEMA_PATH_ENV))
            .with_context(|| format!("{} must be set", SCHEMA_PATH_ENV))?;
        Ok(Self::new(
            SchemaSource::File(PathBuf::from(schema_path)),
            non_empty(lookup(ENCRYPTION_SECRET_ENV)),
        ))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
