//! Aggregating segments: `stats`, `top` and `rare`.
//!
//! All three end the pipeline in practice, and all three narrow the context
//! to the fields they reference. The grouping field is drawn with
//! `prefer_forced`, so a forced field is always the one kept.

use crate::QueryGen;
use crate::ast::{AggFunc, Aggregate, Segment};
use crate::context::{Context, KeyFilter};
use crate::error::GenError;
use crate::generate::Attempt;

/// Generate a `stats` segment with 1-3 distinct aggregate functions and an
/// optional `by` clause.
pub fn generate_stats(generator: &QueryGen, ctx: &mut Context) -> Result<Attempt, GenError> {
    let config = &generator.policy().stats_config;

    let mut functions: Vec<AggFunc> = Vec::with_capacity(config.functions.len());
    for func in &config.functions {
        if !functions.contains(func) {
            functions.push(*func);
        }
    }
    let count = ctx
        .gen_range_inclusive(config.min_aggregates, config.max_aggregates)
        .min(functions.len());
    let picked: Vec<AggFunc> = ctx
        .sample_indices(functions.len(), count)
        .into_iter()
        .map(|i| functions[i])
        .collect();

    let mut aggregates = Vec::with_capacity(picked.len());
    for func in picked {
        let field = match func {
            AggFunc::Count if ctx.gen_bool_with_prob(config.count_without_field_probability) => {
                None
            }
            AggFunc::Count => match ctx.random_key(KeyFilter::any()) {
                Some(key) => Some(key),
                None => continue,
            },
            _ => match ctx.random_key(KeyFilter::numeric()) {
                Some(key) => Some(key),
                None => continue,
            },
        };
        aggregates.push(Aggregate { func, field });
    }

    if aggregates.is_empty() {
        return Ok(Attempt::retry("no aggregate found a usable field"));
    }

    let Some(group) = ctx.random_key(KeyFilter::any().prefer_forced()) else {
        return Ok(Attempt::retry("no grouping field"));
    };
    let referenced = aggregates
        .iter()
        .any(|agg| agg.field.as_deref() == Some(group.as_str()));
    let by = if referenced {
        None
    } else if ctx.is_forced(&group) || ctx.gen_bool_with_prob(config.by_probability) {
        Some(group.clone())
    } else {
        None
    };

    let mut keep = vec![group];
    for agg in &aggregates {
        if let Some(field) = &agg.field {
            if !keep.contains(field) {
                keep.push(field.clone());
            }
        }
    }
    ctx.filter_to(&keep).map_err(|e| e.in_scope("stats"))?;

    Ok(Attempt::Produced(Segment::Stats { aggregates, by }))
}

/// Generate a `top` segment, optionally with a row count.
pub fn generate_top(generator: &QueryGen, ctx: &mut Context) -> Result<Attempt, GenError> {
    let limit = ctx
        .choose(&generator.policy().limits)
        .copied()
        .ok_or_else(|| GenError::invalid_config("limits must not be empty").in_scope("top"))?;

    Ok(match grouped_fields(generator, ctx, "top")? {
        Some((field, by)) => Attempt::Produced(Segment::Top { limit, field, by }),
        None => Attempt::retry("no field for top"),
    })
}

/// Generate a `rare` segment.
pub fn generate_rare(generator: &QueryGen, ctx: &mut Context) -> Result<Attempt, GenError> {
    Ok(match grouped_fields(generator, ctx, "rare")? {
        Some((field, by)) => Attempt::Produced(Segment::Rare { field, by }),
        None => Attempt::retry("no field for rare"),
    })
}

/// Pick the value field and optional `by` field shared by `top` and `rare`,
/// then narrow the context to them.
fn grouped_fields(
    generator: &QueryGen,
    ctx: &mut Context,
    scope: &str,
) -> Result<Option<(String, Option<String>)>, GenError> {
    let Some(field) = ctx.random_key(KeyFilter::any()) else {
        return Ok(None);
    };
    let Some(group) = ctx.random_key(KeyFilter::any().prefer_forced()) else {
        return Ok(None);
    };

    let with_by =
        field != group && ctx.gen_bool_with_prob(generator.policy().grouping_config.by_probability);

    if with_by {
        ctx.filter_to(&[field.clone(), group.clone()])
            .map_err(|e| e.in_scope(scope))?;
        return Ok(Some((field, Some(group))));
    }

    let single = if ctx.is_forced(&group) { group } else { field };
    ctx.filter_to(std::slice::from_ref(&single))
        .map_err(|e| e.in_scope(scope))?;
    Ok(Some((single, None)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::test_support::{access_log_schema, generator, generator_with};
    use crate::policy::{Policy, StatsConfig};
    use crate::schema::{FieldSpec, SchemaBuilder};

    #[test]
    fn test_stats_aggregates_are_well_formed() {
        let generator = generator(access_log_schema());

        for seed in 0..100 {
            let mut ctx = generator.context(seed);
            let Attempt::Produced(Segment::Stats { aggregates, by }) =
                generate_stats(&generator, &mut ctx).unwrap()
            else {
                continue;
            };

            assert!((1..=3).contains(&aggregates.len()));
            for agg in &aggregates {
                match (&agg.func, &agg.field) {
                    (AggFunc::Count, _) => {}
                    (_, Some(field)) => assert!(
                        field == "duration" || field == "http.status_code",
                        "{field}"
                    ),
                    (func, None) => panic!("{func:?} without a field"),
                }
                if let Some(field) = &agg.field {
                    assert!(ctx.contains(field));
                }
            }
            if let Some(group) = &by {
                assert!(ctx.contains(group));
                assert!(aggregates.iter().all(|a| a.field.as_ref() != Some(group)));
            }
        }
    }

    #[test]
    fn test_stats_without_numeric_field_retries() {
        let schema = SchemaBuilder::new()
            .field("method", FieldSpec::keyword(["GET", "POST"]))
            .field("path", FieldSpec::text(["/a", "/b"]))
            .build();
        let policy = Policy::default().with_stats_config(StatsConfig {
            functions: vec![AggFunc::Sum, AggFunc::Avg],
            ..StatsConfig::default()
        });
        let generator = generator_with(schema, policy);

        for seed in 0..20 {
            let mut ctx = generator.context(seed);
            let attempt = generate_stats(&generator, &mut ctx).unwrap();
            assert!(attempt.is_retry());
            assert_eq!(ctx.len(), 2);
        }
    }

    #[test]
    fn test_stats_retries_after_numeric_field_is_dropped() {
        let schema = SchemaBuilder::new()
            .field("method", FieldSpec::keyword(["GET", "POST"]))
            .field("path", FieldSpec::text(["/a", "/b"]))
            .field("duration", FieldSpec::int(0, 1000))
            .build();
        let policy = Policy::default().with_stats_config(StatsConfig {
            functions: vec![AggFunc::Sum, AggFunc::Max],
            ..StatsConfig::default()
        });
        let generator = generator_with(schema, policy);

        for seed in 0..20 {
            let mut ctx = generator.context(seed);
            ctx.filter_to(&["method".to_string(), "path".to_string()])
                .unwrap();
            let before = ctx.keys();

            let attempt = generate_stats(&generator, &mut ctx).unwrap();
            assert!(attempt.is_retry());
            assert_eq!(ctx.keys(), before);
            assert!(ctx.forced().is_empty());
        }
    }

    #[test]
    fn test_stats_always_groups_by_forced_field() {
        let generator = generator(access_log_schema());

        for seed in 0..50 {
            let mut ctx = generator.context(seed);
            ctx.force("method").unwrap();

            let segment = generate_stats(&generator, &mut ctx)
                .unwrap()
                .segment()
                .unwrap();
            let Segment::Stats { aggregates, by } = &segment else {
                panic!("expected stats");
            };
            let referenced = aggregates
                .iter()
                .any(|a| a.field.as_deref() == Some("method"));
            assert!(referenced || by.as_deref() == Some("method"), "{segment}");
            assert!(ctx.contains("method"));
        }
    }

    #[test]
    fn test_top_and_rare_narrow_to_used_fields() {
        let generator = generator(access_log_schema());

        for seed in 0..100 {
            let mut ctx = generator.context(seed);
            let segment = generate_top(&generator, &mut ctx)
                .unwrap()
                .segment()
                .unwrap();
            let Segment::Top { field, by, .. } = &segment else {
                panic!("expected top");
            };
            let mut expected = vec![field.clone()];
            expected.extend(by.clone());
            expected.sort();
            assert_eq!(ctx.keys(), expected, "{segment}");

            let mut ctx = generator.context(seed);
            let segment = generate_rare(&generator, &mut ctx)
                .unwrap()
                .segment()
                .unwrap();
            let Segment::Rare { field, by } = &segment else {
                panic!("expected rare");
            };
            assert!(ctx.contains(field));
            if let Some(group) = by {
                assert_ne!(group, field);
                assert_eq!(ctx.len(), 2);
            } else {
                assert_eq!(ctx.len(), 1);
            }
        }
    }

    #[test]
    fn test_rare_keeps_forced_field() {
        let generator = generator(access_log_schema());

        for seed in 0..50 {
            let mut ctx = generator.context(seed);
            ctx.force("duration").unwrap();
            let segment = generate_rare(&generator, &mut ctx)
                .unwrap()
                .segment()
                .unwrap();
            assert!(ctx.contains("duration"), "{segment}");
            assert!(segment.to_string().contains("duration"));
        }
    }
}
