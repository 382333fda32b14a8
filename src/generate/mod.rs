//! Segment generation modules.
//!
//! # Design Principles
//!
//! **Always pass configs, never have functions without configs.**
//!
//! Every segment generator has the same shape,
//! `fn(&QueryGen, &mut Context) -> Result<Attempt, GenError>`, and reads its
//! probabilities and ranges from `generator.policy()`.
//!
//! **Decide first, mutate last.**
//!
//! A generator that returns [`Attempt::Retry`] must leave the context exactly
//! as it found it. All feasibility checks and random draws happen before the
//! first call that narrows, renames or inserts fields.

pub mod aggregate;
pub mod derive;
pub mod filter;
pub mod order;
pub mod pipeline;
pub mod projection;

use crate::QueryGen;
use crate::ast::{Segment, SegmentKind};
use crate::context::Context;
use crate::error::GenError;

/// Outcome of one segment attempt.
#[derive(Debug, Clone)]
pub enum Attempt {
    /// The segment was produced and the context updated to match.
    Produced(Segment),
    /// The segment is infeasible in the current context. Nothing was mutated.
    Retry { reason: String },
}

impl Attempt {
    pub fn retry(reason: impl Into<String>) -> Self {
        Attempt::Retry {
            reason: reason.into(),
        }
    }

    pub fn is_retry(&self) -> bool {
        matches!(self, Attempt::Retry { .. })
    }

    /// The produced segment, if any.
    pub fn segment(self) -> Option<Segment> {
        match self {
            Attempt::Produced(segment) => Some(segment),
            Attempt::Retry { .. } => None,
        }
    }
}

/// Signature shared by every segment generator.
pub type SegmentGenerator = fn(&QueryGen, &mut Context) -> Result<Attempt, GenError>;

/// The generator routine for `kind`.
pub fn generator_for(kind: SegmentKind) -> SegmentGenerator {
    match kind {
        SegmentKind::Dedup => projection::generate_dedup,
        SegmentKind::Fields => projection::generate_fields,
        SegmentKind::Head => order::generate_head,
        SegmentKind::Rare => aggregate::generate_rare,
        SegmentKind::Top => aggregate::generate_top,
        SegmentKind::Rename => projection::generate_rename,
        SegmentKind::Sort => order::generate_sort,
        SegmentKind::Stats => aggregate::generate_stats,
        SegmentKind::Where => filter::generate_where,
        SegmentKind::Eval => derive::generate_eval,
        SegmentKind::Parse => derive::generate_parse,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{TimeZone, Utc};

    use crate::QueryGen;
    use crate::policy::Policy;
    use crate::schema::{FieldSpec, ParserSpec, Scalar, Schema, SchemaBuilder};

    /// A small web-access-log schema covering every field type.
    pub fn access_log_schema() -> Schema {
        let parser =
            ParserSpec::new(r"(?P<verb>\w+) (?P<path>\S+) (?P<status>\d+)", ["verb", "status"])
                .unwrap();

        SchemaBuilder::new()
            .field("method", FieldSpec::keyword(["GET", "POST", "PUT"]))
            .field("http.status_code", FieldSpec::int(100, 599))
            .field("duration", FieldSpec::float(0.0, 30.0))
            .field(
                "@timestamp",
                FieldSpec::time(
                    Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap(),
                    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
                ),
            )
            .field(
                "tags",
                FieldSpec::list(vec![Scalar::Text("prod".into()), Scalar::Text("eu".into())]),
            )
            .field(
                "message",
                FieldSpec::text([
                    "GET /index.html 200",
                    "POST /login 401",
                    "GET /static/app.js 304",
                ])
                .with_parser(parser),
            )
            .field("referrer", FieldSpec::Empty)
            .build()
    }

    pub fn generator(schema: Schema) -> QueryGen {
        QueryGen::new("logs", schema, Policy::default())
    }

    pub fn generator_with(schema: Schema, policy: Policy) -> QueryGen {
        QueryGen::new("logs", schema, policy)
    }
}
