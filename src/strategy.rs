//! proptest Strategy implementation.

use std::fmt;

use proptest::prelude::*;
use proptest::strategy::{NewTree, ValueTree};
use proptest::test_runner::TestRunner;

use crate::QueryGen;
use crate::ast::{Query, SegmentKind};

/// A generated query with the seed that reproduces it.
#[derive(Clone, Debug)]
pub struct GeneratedQuery {
    /// The query text.
    pub text: String,
    /// The AST of the generated query.
    pub ast: Query,
    /// Seed of the context the query was generated on.
    pub seed: u64,
}

impl GeneratedQuery {
    pub fn kinds(&self) -> Vec<SegmentKind> {
        self.ast.kinds()
    }
}

/// proptest Strategy for generating queries.
pub struct QueryStrategy {
    generator: QueryGen,
}

impl fmt::Debug for QueryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryStrategy")
            .field("source", &self.generator.source())
            .field("schema_fields", &self.generator.schema().len())
            .finish()
    }
}

impl QueryStrategy {
    /// Create a new query strategy from a generator.
    pub fn new(generator: QueryGen) -> Self {
        Self { generator }
    }
}

impl Strategy for QueryStrategy {
    type Tree = QueryValueTree;
    type Value = GeneratedQuery;

    fn new_tree(&self, runner: &mut TestRunner) -> NewTree<Self> {
        // Use the test runner's RNG to seed our context
        let seed: u64 = runner.rng().random();

        match self.generator.generate(seed) {
            Ok(query) => Ok(QueryValueTree {
                current: GeneratedQuery {
                    text: query.to_string(),
                    ast: query,
                    seed,
                },
            }),
            Err(e) => Err(e.to_string().into()),
        }
    }
}

/// Value tree for query generation.
///
/// Queries do not shrink; `GeneratedQuery::seed` reproduces them.
pub struct QueryValueTree {
    current: GeneratedQuery,
}

impl ValueTree for QueryValueTree {
    type Value = GeneratedQuery;

    fn current(&self) -> Self::Value {
        self.current.clone()
    }

    fn simplify(&mut self) -> bool {
        false
    }

    fn complicate(&mut self) -> bool {
        false
    }
}
