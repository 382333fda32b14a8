//! Field-introducing segments: `eval` and `parse`.
//!
//! Both add fields to the context and force the first one they add, so
//! later segments can rely on it. At most one of them runs per query.

use std::collections::BTreeSet;

use chrono::Datelike;
use strum::IntoEnumIterator;

use crate::QueryGen;
use crate::ast::{Segment, TimePart};
use crate::context::{Context, KeyFilter};
use crate::error::GenError;
use crate::generate::Attempt;
use crate::generate::projection::short_name;
use crate::policy::ParseConfig;
use crate::schema::FieldSpec;

/// Generate an `eval` segment extracting a time part into a new int field.
pub fn generate_eval(_generator: &QueryGen, ctx: &mut Context) -> Result<Attempt, GenError> {
    let Some(source) = ctx.random_key(KeyFilter::time()) else {
        return Ok(Attempt::retry("no time field"));
    };
    let years = match ctx.get(&source) {
        Some(FieldSpec::Time { min, max }) => (i64::from(min.year()), i64::from(max.year())),
        _ => return Err(GenError::unknown_field(&source).in_scope("eval")),
    };

    let parts: Vec<TimePart> = TimePart::iter().collect();
    let Some(func) = ctx.choose(&parts).copied() else {
        return Ok(Attempt::retry("no time function"));
    };

    let short = short_name(&source).unwrap_or_else(|| source.trim_matches('`'));
    let target = format!("{}_{short}", func.name().to_lowercase());
    if ctx.contains(&target) {
        return Ok(Attempt::retry(format!("'{target}' is already in the context")));
    }

    let (lo, hi) = func.bounds(years);
    ctx.insert_field(target.clone(), FieldSpec::int(lo, hi));
    ctx.force(&target)?;

    Ok(Attempt::Produced(Segment::Eval {
        target,
        func,
        source,
    }))
}

/// Generate a `parse` segment over a field carrying a parser descriptor.
///
/// Each named sub-field with at least one capture across the field's sample
/// values becomes a context entry.
pub fn generate_parse(generator: &QueryGen, ctx: &mut Context) -> Result<Attempt, GenError> {
    let Some((field, spec)) = ctx.random_item(true) else {
        return Ok(Attempt::retry("no parsable field"));
    };
    let (FieldSpec::Text { values, .. }, Some(parser)) = (&spec, spec.parser()) else {
        return Ok(Attempt::retry(format!("'{field}' has no parser")));
    };

    let mut extracted: Vec<(String, FieldSpec)> = Vec::new();
    for name in parser.fields() {
        let captures: Vec<&str> = values
            .iter()
            .filter_map(|value| parser.regex().captures(value))
            .filter_map(|caps| caps.name(name).map(|m| m.as_str()))
            .collect();
        if captures.is_empty() {
            continue;
        }
        extracted.push((
            name.clone(),
            infer_spec(&captures, &generator.policy().parse_config),
        ));
    }

    let Some(first) = extracted.first().map(|(name, _)| name.clone()) else {
        return Ok(Attempt::retry(format!("'{field}' matched no sample value")));
    };

    for (name, spec) in extracted {
        ctx.insert_field(name, spec);
    }
    ctx.force(&first)?;

    Ok(Attempt::Produced(Segment::Parse {
        field,
        pattern: parser.render(),
    }))
}

/// Type the values captured for one sub-field.
fn infer_spec(captures: &[&str], config: &ParseConfig) -> FieldSpec {
    let ints: Option<Vec<i64>> = captures.iter().map(|c| c.parse().ok()).collect();
    if let Some(ints) = ints {
        let min = ints.iter().copied().min().unwrap_or_default();
        let max = ints.iter().copied().max().unwrap_or_default();
        return FieldSpec::int(min, max);
    }

    let floats: Option<Vec<f64>> = captures
        .iter()
        .map(|c| c.parse::<f64>().ok().filter(|v| v.is_finite()))
        .collect();
    if let Some(floats) = floats {
        let min = floats.iter().copied().fold(f64::INFINITY, f64::min);
        let max = floats.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        return FieldSpec::float(min, max);
    }

    let distinct: BTreeSet<&str> = captures.iter().copied().collect();
    if distinct.len() <= config.max_keyword_values {
        FieldSpec::keyword(distinct)
    } else {
        FieldSpec::text(distinct)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::generate::test_support::{access_log_schema, generator};
    use crate::schema::{FieldType, ParserSpec, SchemaBuilder};

    #[test]
    fn test_eval_adds_forced_int_field() {
        let generator = generator(access_log_schema());

        for seed in 0..50 {
            let mut ctx = generator.context(seed);
            let segment = generate_eval(&generator, &mut ctx)
                .unwrap()
                .segment()
                .unwrap();
            let Segment::Eval {
                target,
                func,
                source,
            } = &segment
            else {
                panic!("expected eval");
            };

            assert_eq!(source, "@timestamp");
            assert_eq!(target, &format!("{}_timestamp", func.name().to_lowercase()));
            assert!(ctx.is_forced(target));
            assert!(ctx.contains("@timestamp"));

            let (lo, hi) = func.bounds((2023, 2024));
            match ctx.get(target).unwrap() {
                FieldSpec::Int { min, max } => assert_eq!((*min, *max), (lo, hi)),
                other => panic!("expected int, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_eval_without_time_field_retries() {
        let schema = SchemaBuilder::new()
            .field("duration", FieldSpec::int(0, 10))
            .build();
        let generator = generator(schema);
        let mut ctx = generator.context(1);

        assert!(generate_eval(&generator, &mut ctx).unwrap().is_retry());
        assert!(ctx.forced().is_empty());
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn test_eval_name_collision_retries() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut schema = SchemaBuilder::new().field("ts", FieldSpec::time(start, start));
        for part in TimePart::iter() {
            schema = schema.field(
                format!("{}_ts", part.name().to_lowercase()),
                FieldSpec::int(0, 1),
            );
        }
        let generator = generator(schema.build());
        let mut ctx = generator.context(2);
        let before = ctx.len();

        assert!(generate_eval(&generator, &mut ctx).unwrap().is_retry());
        assert_eq!(ctx.len(), before);
        assert!(ctx.forced().is_empty());
    }

    #[test]
    fn test_parse_extracts_typed_fields() {
        let generator = generator(access_log_schema());

        for seed in 0..20 {
            let mut ctx = generator.context(seed);
            let segment = generate_parse(&generator, &mut ctx)
                .unwrap()
                .segment()
                .unwrap();

            assert_eq!(
                segment.to_string(),
                r"parse message '(?<verb>\w+) (?<path>\S+) (?<status>\d+)'"
            );
            assert_eq!(ctx.get("verb").unwrap().field_type(), FieldType::Keyword);
            match ctx.get("status").unwrap() {
                FieldSpec::Int { min, max } => assert_eq!((*min, *max), (200, 401)),
                other => panic!("expected int, got {other:?}"),
            }
            // Not listed by the descriptor
            assert!(!ctx.contains("path"));
            assert!(ctx.is_forced("verb"));
            assert!(ctx.contains("message"));
        }
    }

    #[test]
    fn test_parse_without_matches_retries() {
        let parser = ParserSpec::new(r"user=(?P<user>\w+)", ["user"]).unwrap();
        let schema = SchemaBuilder::new()
            .field(
                "message",
                FieldSpec::text(["no match here", "nor here"]).with_parser(parser),
            )
            .build();
        let generator = generator(schema);
        let mut ctx = generator.context(4);

        assert!(generate_parse(&generator, &mut ctx).unwrap().is_retry());
        assert_eq!(ctx.keys(), vec!["message".to_string()]);
    }

    #[test]
    fn test_parse_without_parsable_field_retries() {
        let schema = SchemaBuilder::new()
            .field("message", FieldSpec::text(["a b"]))
            .build();
        let generator = generator(schema);
        let mut ctx = generator.context(4);

        assert!(generate_parse(&generator, &mut ctx).unwrap().is_retry());
    }

    #[test]
    fn test_infer_spec() {
        let config = ParseConfig::default();

        assert!(matches!(
            infer_spec(&["1", "20", "-3"], &config),
            FieldSpec::Int { min: -3, max: 20 }
        ));
        match infer_spec(&["1.5", "2", "0.25"], &config) {
            FieldSpec::Float { min, max } => assert_eq!((min, max), (0.25, 2.0)),
            other => panic!("expected float, got {other:?}"),
        }
        assert_eq!(
            infer_spec(&["GET", "POST", "GET"], &config).field_type(),
            FieldType::Keyword
        );

        let wide: Vec<String> = (0..11).map(|i| format!("user{i}")).collect();
        let wide: Vec<&str> = wide.iter().map(String::as_str).collect();
        assert_eq!(infer_spec(&wide, &config).field_type(), FieldType::Text);
    }
}
