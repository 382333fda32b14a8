//! Schema-aware generator for pipe-delimited log queries.
//!
//! This crate produces random but plausible queries of the form
//! `source = <name> | <segment> | <segment> ...` from a declarative schema of
//! the indexed data, to exercise a query-processing engine. It provides:
//! - **Typed field specifications** loaded from a JSON schema document
//! - **A per-query context** tracking which fields are still in scope, which
//!   must survive narrowing, and which segment kinds were used
//! - **Runtime policy** with weights, ranges and probabilities
//! - **Seeded randomness** so one seed reproduces one query
//! - **proptest integration** via `Strategy` trait
//!
//! # Example
//!
//! ```
//! use ppl_gen::{FieldSpec, Policy, QueryGen, SchemaBuilder};
//!
//! let schema = SchemaBuilder::new()
//!     .field("method", FieldSpec::keyword(["GET", "POST"]))
//!     .field("duration", FieldSpec::int(0, 1000))
//!     .build();
//!
//! let generator = QueryGen::builder()
//!     .source("nginx")
//!     .schema(schema)
//!     .policy(Policy::default())
//!     .build()
//!     .unwrap();
//!
//! let query = generator.generate(42).unwrap();
//! assert!(query.to_string().starts_with("source = nginx"));
//! ```

pub mod ast;
pub mod builder;
pub mod context;
pub mod error;
pub mod generate;
pub mod policy;
pub mod schema;
pub mod strategy;

// Re-export main types
pub use ast::{
    AggFunc, Aggregate, CmpOp, Condition, Connective, Literal, Predicate, Query, Segment,
    SegmentKind, TimePart,
};
pub use builder::QueryGenBuilder;
pub use context::{Context, KeyFilter};
pub use error::{GenError, GenErrorKind};
pub use generate::Attempt;
pub use policy::{
    ExprConfig, FieldsConfig, GroupingConfig, ParseConfig, Policy, SegmentWeights, StatsConfig,
    WhereConfig,
};
pub use schema::{FieldSpec, FieldType, ParserSpec, Scalar, Schema, SchemaBuilder, SchemaError};
pub use strategy::{GeneratedQuery, QueryStrategy};

/// The main query generator: a source name, a schema and a policy.
#[derive(Debug, Clone)]
pub struct QueryGen {
    source: String,
    schema: Schema,
    policy: Policy,
}

impl QueryGen {
    /// Create a new QueryGen with the given source name, schema and policy.
    pub fn new(source: impl Into<String>, schema: Schema, policy: Policy) -> Self {
        Self {
            source: source.into(),
            schema,
            policy,
        }
    }

    /// Create a builder for constructing a QueryGen.
    pub fn builder() -> QueryGenBuilder {
        QueryGenBuilder::new()
    }

    /// The source identifier every query starts from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Get a reference to the schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Get a reference to the policy.
    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// A fresh context over this generator's schema.
    pub fn context(&self, seed: u64) -> Context {
        Context::new_with_seed(&self.schema, seed).with_config(self.policy.expr_config)
    }

    /// Generate a query on an existing context.
    pub fn query(&self, ctx: &mut Context) -> Result<Query, GenError> {
        generate::pipeline::generate_query(self, ctx)
    }

    /// Generate a query from a fresh context seeded with `seed`.
    pub fn generate(&self, seed: u64) -> Result<Query, GenError> {
        let mut ctx = self.context(seed);
        self.query(&mut ctx)
    }

    /// Convert this generator into a proptest strategy.
    pub fn strategy(self) -> QueryStrategy {
        QueryStrategy::new(self)
    }
}
