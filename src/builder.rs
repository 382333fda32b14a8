//! Builder API for QueryGen.

use crate::QueryGen;
use crate::error::GenError;
use crate::policy::Policy;
use crate::schema::Schema;

/// Builder for constructing a QueryGen.
pub struct QueryGenBuilder {
    source: Option<String>,
    schema: Option<Schema>,
    policy: Policy,
}

impl QueryGenBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            source: None,
            schema: None,
            policy: Policy::default(),
        }
    }

    /// Set the source identifier.
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Set the schema.
    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Set the policy.
    pub fn policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    /// Build the generator, validating the schema and the policy.
    pub fn build(self) -> Result<QueryGen, GenError> {
        let source = self
            .source
            .filter(|s| !s.is_empty())
            .ok_or_else(|| GenError::invalid_config("source is required"))?;
        let schema = self
            .schema
            .ok_or_else(|| GenError::invalid_config("schema is required"))?;

        schema
            .validate()
            .map_err(|e| GenError::invalid_config(e.to_string()).in_scope("schema"))?;
        self.policy.validate()?;

        Ok(QueryGen::new(source, schema, self.policy))
    }
}

impl Default for QueryGenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSpec, SchemaBuilder};

    fn test_schema() -> Schema {
        SchemaBuilder::new()
            .field("method", FieldSpec::keyword(["GET", "POST"]))
            .field("duration", FieldSpec::int(0, 1000))
            .build()
    }

    #[test]
    fn test_builder_basic() {
        let generator = QueryGenBuilder::new()
            .source("nginx")
            .schema(test_schema())
            .policy(Policy::default())
            .build();
        assert!(generator.is_ok());
        assert_eq!(generator.unwrap().source(), "nginx");
    }

    #[test]
    fn test_builder_without_schema() {
        let result = QueryGenBuilder::new().source("nginx").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_without_source() {
        let result = QueryGenBuilder::new().schema(test_schema()).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_rejects_invalid_schema() {
        let schema = SchemaBuilder::new()
            .field("duration", FieldSpec::int(10, 0))
            .build();
        let err = QueryGenBuilder::new()
            .source("nginx")
            .schema(schema)
            .build()
            .unwrap_err();
        assert_eq!(err.scope, "schema");
    }

    #[test]
    fn test_builder_custom_policy() {
        let policy = Policy::default()
            .with_max_retries(3)
            .with_segment_range(2, 2);
        let generator = QueryGenBuilder::new()
            .source("nginx")
            .schema(test_schema())
            .policy(policy)
            .build()
            .unwrap();
        assert_eq!(generator.policy().max_retries, 3);
        assert_eq!(generator.policy().min_segments, 2);
    }

    #[test]
    fn test_builder_rejects_invalid_policy() {
        let result = QueryGenBuilder::new()
            .source("nginx")
            .schema(test_schema())
            .policy(Policy::default().with_segment_range(3, 1))
            .build();
        assert!(result.is_err());
    }
}
