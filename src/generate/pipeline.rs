//! Segment selection and query assembly.
//!
//! Each pipeline position draws a kind from the eligible set, runs its
//! generator and re-rolls on [`Attempt::Retry`] up to `policy.max_retries`
//! times. A position that produces nothing ends the query early.

use tracing::{debug, trace};

use crate::QueryGen;
use crate::ast::{Query, Segment, SegmentKind};
use crate::context::Context;
use crate::error::GenError;
use crate::generate::{Attempt, generator_for};

/// Kinds allowed anywhere in the pipeline.
const BASE_KINDS: [SegmentKind; 5] = [
    SegmentKind::Fields,
    SegmentKind::Rename,
    SegmentKind::Sort,
    SegmentKind::Where,
    SegmentKind::Eval,
];

/// Kinds allowed only in the last position.
const TERMINAL_KINDS: [SegmentKind; 5] = [
    SegmentKind::Dedup,
    SegmentKind::Head,
    SegmentKind::Rare,
    SegmentKind::Stats,
    SegmentKind::Top,
];

/// The segment kinds that may be attempted next.
///
/// Every kind appears at most once per query, and once any forcing kind has
/// been used none of them is offered again.
pub fn eligible_kinds(ctx: &Context, terminal: bool) -> Vec<SegmentKind> {
    let mut kinds = BASE_KINDS.to_vec();
    if terminal {
        kinds.extend(TERMINAL_KINDS);
    }
    if ctx.has_parsable_field() {
        kinds.push(SegmentKind::Parse);
    }

    let forcing_used = ctx.used_kinds().iter().any(SegmentKind::is_forcing);
    kinds.retain(|kind| !ctx.has_used(*kind) && !(forcing_used && kind.is_forcing()));
    kinds
}

/// Produce the segment for one pipeline position.
///
/// Returns `Ok(None)` when no kind is eligible or every attempt asked for a
/// retry.
pub fn generate_segment(
    generator: &QueryGen,
    ctx: &mut Context,
    terminal: bool,
) -> Result<Option<Segment>, GenError> {
    let policy = generator.policy();
    let eligible = eligible_kinds(ctx, terminal);

    for attempt in 0..policy.max_retries {
        let Some(kind) = policy.select_segment_kind(ctx, &eligible) else {
            debug!(terminal, "no eligible segment kind");
            return Ok(None);
        };

        match generator_for(kind)(generator, ctx)? {
            Attempt::Produced(segment) => {
                ctx.record(kind);
                trace!(%kind, %segment, "produced segment");
                return Ok(Some(segment));
            }
            Attempt::Retry { reason } => {
                trace!(%kind, attempt, %reason, "segment infeasible, retrying");
            }
        }
    }

    debug!(retries = policy.max_retries, "retry ceiling reached");
    Ok(None)
}

/// Generate a full query on `ctx`.
pub fn generate_query(generator: &QueryGen, ctx: &mut Context) -> Result<Query, GenError> {
    let policy = generator.policy();
    let target = ctx.gen_range_inclusive(policy.min_segments, policy.max_segments);
    let mut query = Query::new(generator.source());

    for position in 0..target {
        if ctx.is_empty() {
            debug!(position, "context exhausted");
            break;
        }

        let terminal = position + 1 == target;
        match generate_segment(generator, ctx, terminal)? {
            Some(segment) => query.segments.push(segment),
            None => break,
        }
    }

    debug!(segments = query.segments.len(), target, "generated query");
    Ok(query)
}
