//! Projection segments: `fields`, `rename` and `dedup`.

use crate::QueryGen;
use crate::ast::Segment;
use crate::context::{Context, KeyFilter};
use crate::error::GenError;
use crate::generate::Attempt;

/// Generate a `fields` projection and narrow the context to it.
///
/// Forced fields are always appended to the sampled set.
pub fn generate_fields(generator: &QueryGen, ctx: &mut Context) -> Result<Attempt, GenError> {
    if ctx.is_empty() {
        return Ok(Attempt::retry("no field to project"));
    }

    let keys = ctx.keys();
    let max = generator.policy().fields_config.max_fields.min(keys.len());
    let count = ctx.gen_range_inclusive(1, max);

    let mut fields: Vec<String> = ctx
        .sample_indices(keys.len(), count)
        .into_iter()
        .map(|i| keys[i].clone())
        .collect();
    for forced in ctx.forced() {
        if !fields.contains(forced) {
            fields.push(forced.clone());
        }
    }

    ctx.filter_to(&fields).map_err(|e| e.in_scope("fields"))?;
    Ok(Attempt::Produced(Segment::Fields { fields }))
}

/// Generate a `dedup` segment. No context mutation.
pub fn generate_dedup(_generator: &QueryGen, ctx: &mut Context) -> Result<Attempt, GenError> {
    match ctx.random_key(KeyFilter::any()) {
        Some(field) => Ok(Attempt::Produced(Segment::Dedup { field })),
        None => Ok(Attempt::retry("no field to deduplicate")),
    }
}

/// Generate a `rename` segment from a field to its short name.
///
/// The new name is forced for the rest of the query.
pub fn generate_rename(_generator: &QueryGen, ctx: &mut Context) -> Result<Attempt, GenError> {
    let Some(from) = ctx.random_key(KeyFilter::any()) else {
        return Ok(Attempt::retry("no field to rename"));
    };
    let Some(to) = short_name(&from) else {
        return Ok(Attempt::retry(format!("'{from}' has no separator")));
    };
    if ctx.contains(to) {
        return Ok(Attempt::retry(format!("'{to}' is already in the context")));
    }
    let to = to.to_string();

    ctx.rename_field(&from, &to)?;
    ctx.force(&to)?;
    Ok(Attempt::Produced(Segment::Rename { from, to }))
}

/// The part of `name` after its last separator (`.`, `_` or any non-word
/// character), ignoring surrounding backquotes.
///
/// Returns `None` when there is no separator or nothing follows it.
pub fn short_name(name: &str) -> Option<&str> {
    let name = name.trim_matches('`');
    let (idx, sep) = name
        .char_indices()
        .rev()
        .find(|(_, c)| *c == '_' || !c.is_alphanumeric())?;

    let suffix = &name[idx + sep.len_utf8()..];
    if suffix.is_empty() {
        None
    } else {
        Some(suffix)
    }
}
