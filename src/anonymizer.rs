//! The anonymization engine
//!
//! Built once from an annotated schema, then applied to any number of
//! documents. Building extracts the rules and compiles their operations;
//! applying walks each rule's path and rewrites the matched values in place.

use std::sync::Arc;

use anonymizer_crypto::SymmetricCipher;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{AnonymizerConfig, SchemaSource};
use crate::error::{AnonymizerError, Result};
use crate::operators::{Operation, OperatorRegistry};
use crate::path::apply_by_path;
use crate::schema::{extract_rules, Rule};

/// A rule with its operation compiled.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub rule: Rule,
    pub operation: Operation,
}

/// Schema-driven document anonymizer. Immutable after construction and safe
/// to share between threads.
#[derive(Debug, Clone)]
pub struct Anonymizer {
    rules: Vec<CompiledRule>,
    registry: OperatorRegistry,
}

impl Anonymizer {
    pub fn builder() -> AnonymizerBuilder {
        AnonymizerBuilder::default()
    }

    /// Build from a schema value and an optional encryption secret.
    pub fn new(schema: Value, encryption_secret: Option<&str>) -> Result<Self> {
        let mut builder = Self::builder().schema(schema);
        if let Some(secret) = encryption_secret {
            builder = builder.encryption_secret(secret);
        }
        builder.build()
    }

    pub fn from_schema_str(schema: &str, encryption_secret: Option<&str>) -> Result<Self> {
        let mut builder = Self::builder().schema_str(schema);
        if let Some(secret) = encryption_secret {
            builder = builder.encryption_secret(secret);
        }
        builder.build()
    }

    pub fn from_config(config: &AnonymizerConfig) -> Result<Self> {
        let mut builder = Self::builder().schema_source(config.schema.clone());
        if let Some(secret) = &config.encryption_secret {
            builder = builder.encryption_secret(secret.clone());
        }
        builder.build()
    }

    fn compile(schema: &Value, registry: OperatorRegistry) -> Result<Self> {
        let rules = extract_rules(schema)?
            .into_iter()
            .map(|rule| -> Result<CompiledRule> {
                let operation = registry
                    .compile(&rule.operation, &rule.args)
                    .inspect_err(|err| {
                        debug!(path = %rule.path, %err, "Rejected anonymization rule")
                    })?;
                if operation.requires_secret() && !registry.has_cipher() {
                    warn!(
                        path = %rule.path,
                        operation = %operation.kind(),
                        "Rule requires an encryption secret but none is configured"
                    );
                }
                Ok(CompiledRule { rule, operation })
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            rules = rules.len(),
            encryption = registry.has_cipher(),
            "Anonymizer ready"
        );
        Ok(Self { rules, registry })
    }

    /// Rules in application order.
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    pub fn registry(&self) -> &OperatorRegistry {
        &self.registry
    }

    /// Anonymize `document` in place.
    ///
    /// Rules run in schema pre-order, so a rule on a container sees values
    /// before the rules on its children rewrite them. On error the failing
    /// value keeps its original content but values rewritten by earlier rules
    /// stay rewritten, so the document must not be emitted.
    pub fn anonymize(&self, document: &mut Value) -> Result<()> {
        for compiled in &self.rules {
            let rewritten = apply_by_path(document, &compiled.rule.path, |value| {
                self.registry.apply(&compiled.operation, value)
            })?;
            debug!(
                path = %compiled.rule.path,
                operation = %compiled.operation.kind(),
                rewritten,
                "Applied anonymization rule"
            );
        }
        Ok(())
    }

    /// Owned variant of [`Anonymizer::anonymize`].
    pub fn anonymize_value(&self, mut document: Value) -> Result<Value> {
        self.anonymize(&mut document)?;
        Ok(document)
    }

    /// Parse a JSON document and anonymize it.
    pub fn anonymize_str(&self, document: &str) -> Result<Value> {
        self.anonymize_value(serde_json::from_str(document)?)
    }
}

/// Programmatic construction of an [`Anonymizer`].
#[derive(Default)]
pub struct AnonymizerBuilder {
    schema: Option<SchemaSource>,
    encryption_secret: Option<String>,
    cipher: Option<Arc<dyn SymmetricCipher>>,
}

impl AnonymizerBuilder {
    pub fn schema(self, schema: Value) -> Self {
        self.schema_source(SchemaSource::Inline(schema))
    }

    pub fn schema_str(self, schema: impl Into<String>) -> Self {
        self.schema_source(SchemaSource::Text(schema.into()))
    }

    pub fn schema_source(mut self, source: SchemaSource) -> Self {
        self.schema = Some(source);
        self
    }

    pub fn encryption_secret(mut self, secret: impl Into<String>) -> Self {
        self.encryption_secret = Some(secret.into());
        self
    }

    /// Use a custom cipher; takes precedence over `encryption_secret`.
    pub fn cipher(mut self, cipher: Arc<dyn SymmetricCipher>) -> Self {
        self.cipher = Some(cipher);
        self
    }

    pub fn build(self) -> Result<Anonymizer> {
        let source = self
            .schema
            .ok_or_else(|| AnonymizerError::construction("no schema supplied"))?;
        let schema = source.load()?;
        if schema.as_object().is_some_and(|map| map.is_empty()) {
            return Err(AnonymizerError::construction("schema is empty"));
        }

        let registry = match (self.cipher, self.encryption_secret) {
            (Some(cipher), _) => OperatorRegistry::with_cipher(cipher),
            (None, Some(secret)) => OperatorRegistry::with_secret(&secret),
            (None, None) => OperatorRegistry::new(),
        };

        Anonymizer::compile(&schema, registry)
    }
}
