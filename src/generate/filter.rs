//! `where` segment generation.

use crate::QueryGen;
use crate::ast::{Condition, Connective, Segment};
use crate::context::{Context, KeyFilter};
use crate::error::GenError;
use crate::generate::Attempt;

/// Generate a `where` segment: 1-3 predicates over distinct fields joined by
/// random `AND`/`OR`.
///
/// Leaves the context untouched either way.
pub fn generate_where(generator: &QueryGen, ctx: &mut Context) -> Result<Attempt, GenError> {
    let config = &generator.policy().where_config;
    let target = ctx.gen_range_inclusive(config.min_predicates, config.max_predicates);

    let mut keys: Vec<String> = Vec::with_capacity(target);
    let mut draws = 0;
    while keys.len() < target {
        if draws >= config.max_field_attempts {
            return Ok(Attempt::retry(format!(
                "found {} distinct fields for {target} predicates",
                keys.len()
            )));
        }
        draws += 1;

        let Some(key) = ctx.random_key(KeyFilter::any()) else {
            return Ok(Attempt::retry("no field to filter on"));
        };
        if !keys.contains(&key) {
            keys.push(key);
        }
    }

    let mut predicates = Vec::with_capacity(keys.len());
    for key in &keys {
        let predicate = ctx
            .generate_boolean_expression(key)
            .map_err(|e| e.in_scope("where"))?;
        predicates.push(predicate);
    }

    let mut predicates = predicates.into_iter();
    let Some(first) = predicates.next() else {
        return Ok(Attempt::retry("no predicate built"));
    };
    let rest = predicates
        .map(|predicate| {
            let connective = if ctx.gen_bool() {
                Connective::And
            } else {
                Connective::Or
            };
            (connective, predicate)
        })
        .collect();

    Ok(Attempt::Produced(Segment::Where {
        condition: Condition { first, rest },
    }))
}
