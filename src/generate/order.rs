//! `sort` and `head` segment generation.

use crate::QueryGen;
use crate::ast::Segment;
use crate::context::{Context, KeyFilter};
use crate::error::GenError;
use crate::generate::Attempt;

/// Generate a `sort` segment over a sortable field, ascending or descending
/// with equal probability.
pub fn generate_sort(_generator: &QueryGen, ctx: &mut Context) -> Result<Attempt, GenError> {
    let Some(field) = ctx.random_key(KeyFilter::sortable()) else {
        return Ok(Attempt::retry("no sortable field"));
    };
    let descending = ctx.gen_bool();
    Ok(Attempt::Produced(Segment::Sort { field, descending }))
}

/// Generate a `head` segment with a limit from the policy's limit set.
pub fn generate_head(generator: &QueryGen, ctx: &mut Context) -> Result<Attempt, GenError> {
    let limit = ctx
        .choose(&generator.policy().limits)
        .copied()
        .ok_or_else(|| GenError::invalid_config("limits must not be empty").in_scope("head"))?;
    Ok(Attempt::Produced(Segment::Head { limit }))
}
