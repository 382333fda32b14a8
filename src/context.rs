//! Per-query generation context.
//!
//! The context is a mutable projection of the schema for one query: which
//! fields are still in scope, which of them are forced (must survive every
//! narrowing), and which segment kinds were already used. It also owns the
//! seeded RNG, so one seed reproduces one query.

use std::collections::{BTreeMap, BTreeSet};

use chrono::DateTime;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::ast::{CmpOp, Literal, Predicate, SegmentKind};
use crate::error::GenError;
use crate::policy::ExprConfig;
use crate::schema::{FieldSpec, Schema};

/// Restrictions applied by [`Context::random_key`].
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyFilter {
    /// Keep only ordered types (text, int, float, time).
    pub sortable: bool,
    /// Keep only int and float.
    pub numeric: bool,
    /// Keep only time.
    pub time: bool,
    /// Restrict to forced fields when any of them passes the other filters.
    pub prefer_forced: bool,
}

impl KeyFilter {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn sortable() -> Self {
        Self {
            sortable: true,
            ..Self::default()
        }
    }

    pub fn numeric() -> Self {
        Self {
            numeric: true,
            ..Self::default()
        }
    }

    pub fn time() -> Self {
        Self {
            time: true,
            ..Self::default()
        }
    }

    pub fn prefer_forced(mut self) -> Self {
        self.prefer_forced = true;
        self
    }

    fn accepts(&self, spec: &FieldSpec) -> bool {
        (!self.sortable || spec.is_sortable())
            && (!self.numeric || spec.is_numeric())
            && (!self.time || spec.is_time())
    }
}

/// Context for generating one query.
pub struct Context {
    rng: ChaCha8Rng,
    fields: BTreeMap<String, FieldSpec>,
    forced: BTreeSet<String>,
    used: Vec<SegmentKind>,
    config: ExprConfig,
}

impl Context {
    /// Create a context over the generative fields of `schema`.
    pub fn new_with_seed(schema: &Schema, seed: u64) -> Self {
        let fields = schema
            .generative_fields()
            .map(|(name, spec)| (name.clone(), spec.clone()))
            .collect();

        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            fields,
            forced: BTreeSet::new(),
            used: Vec::new(),
            config: ExprConfig::default(),
        }
    }

    /// Replace the expression config.
    pub fn with_config(mut self, config: ExprConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ExprConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&FieldSpec> {
        self.fields.get(key)
    }

    /// Snapshot of the current field names.
    pub fn keys(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    pub fn forced(&self) -> &BTreeSet<String> {
        &self.forced
    }

    pub fn is_forced(&self, key: &str) -> bool {
        self.forced.contains(key)
    }

    /// Segment kinds used so far, in pipeline order.
    pub fn used_kinds(&self) -> &[SegmentKind] {
        &self.used
    }

    pub fn has_used(&self, kind: SegmentKind) -> bool {
        self.used.contains(&kind)
    }

    /// Record that a segment of `kind` was appended to the query.
    pub fn record(&mut self, kind: SegmentKind) {
        self.used.push(kind);
    }

    /// Returns true if some field in scope carries a parser descriptor.
    pub fn has_parsable_field(&self) -> bool {
        self.fields.values().any(|spec| spec.parser().is_some())
    }

    // Field selection

    /// Pick a field name uniformly among those passing `filter`.
    ///
    /// Returns `None` when no field qualifies.
    pub fn random_key(&mut self, filter: KeyFilter) -> Option<String> {
        let mut candidates: Vec<String> = self
            .fields
            .iter()
            .filter(|(_, spec)| filter.accepts(spec))
            .map(|(name, _)| name.clone())
            .collect();

        if filter.prefer_forced {
            let forced: Vec<String> = candidates
                .iter()
                .filter(|name| self.forced.contains(*name))
                .cloned()
                .collect();
            if !forced.is_empty() {
                candidates = forced;
            }
        }

        self.choose(&candidates).cloned()
    }

    /// Pick a `(name, spec)` pair uniformly, optionally only among fields
    /// carrying a parser descriptor.
    pub fn random_item(&mut self, parsable_only: bool) -> Option<(String, FieldSpec)> {
        let candidates: Vec<&String> = self
            .fields
            .iter()
            .filter(|(_, spec)| !parsable_only || spec.parser().is_some())
            .map(|(name, _)| name)
            .collect();

        if candidates.is_empty() {
            return None;
        }
        let idx = self.rng.random_range(0..candidates.len());
        let name = candidates[idx].clone();
        let spec = self.fields.get(&name)?.clone();
        Some((name, spec))
    }

    // Values and predicates

    /// Draw a literal from the domain of `key`.
    pub fn sample_value(&mut self, key: &str) -> Result<Literal, GenError> {
        let spec = self
            .fields
            .get(key)
            .ok_or_else(|| GenError::unknown_field(key))?;

        sample_literal(&mut self.rng, spec, &self.config)
            .ok_or_else(|| GenError::unknown_field(key).with_context("field has no values"))
    }

    /// Build one comparison predicate over `key`, with operators chosen by
    /// the field's type.
    pub fn generate_boolean_expression(&mut self, key: &str) -> Result<Predicate, GenError> {
        let spec = self
            .fields
            .get(key)
            .ok_or_else(|| GenError::unknown_field(key))?;

        build_predicate(&mut self.rng, key, spec, &self.config)
            .ok_or_else(|| GenError::unknown_field(key).with_context("field has no values"))
    }

    // Mutation

    /// Narrow the context to exactly `keys`. Names not in scope are ignored.
    ///
    /// Fails without touching the context if a forced field would be dropped.
    pub fn filter_to(&mut self, keys: &[String]) -> Result<(), GenError> {
        let keep: BTreeSet<&str> = keys.iter().map(String::as_str).collect();

        if let Some(dropped) = self.forced.iter().find(|f| !keep.contains(f.as_str())) {
            return Err(GenError::forced_field_dropped(dropped.clone()));
        }

        self.fields.retain(|name, _| keep.contains(name.as_str()));
        Ok(())
    }

    /// Remove every field, or every non-forced field when `keep_forced`.
    pub fn clear(&mut self, keep_forced: bool) {
        if keep_forced {
            let forced = &self.forced;
            self.fields.retain(|name, _| forced.contains(name));
        } else {
            self.fields.clear();
            self.forced.clear();
        }
    }

    /// Add or replace a field. Fields without values are ignored.
    pub fn insert_field(&mut self, name: impl Into<String>, spec: FieldSpec) {
        if spec.is_generative() {
            self.fields.insert(name.into(), spec);
        }
    }

    /// Mark a field in scope as forced.
    pub fn force(&mut self, key: &str) -> Result<(), GenError> {
        if !self.fields.contains_key(key) {
            return Err(GenError::unknown_field(key).in_scope("force"));
        }
        self.forced.insert(key.to_string());
        Ok(())
    }

    /// Re-key `from` as `to`. The forced mark follows the field.
    pub fn rename_field(&mut self, from: &str, to: &str) -> Result<(), GenError> {
        let spec = self
            .fields
            .remove(from)
            .ok_or_else(|| GenError::unknown_field(from).in_scope("rename"))?;

        if self.forced.remove(from) {
            self.forced.insert(to.to_string());
        }
        self.fields.insert(to.to_string(), spec);
        Ok(())
    }

    // RNG methods

    /// Generate a random boolean.
    pub fn gen_bool(&mut self) -> bool {
        self.rng.random()
    }

    /// Generate a random boolean with the given probability of being true.
    pub fn gen_bool_with_prob(&mut self, prob: f64) -> bool {
        self.rng.random_bool(prob)
    }

    /// Generate a random usize in the range [0, max).
    pub fn gen_range(&mut self, max: usize) -> usize {
        if max == 0 {
            0
        } else {
            self.rng.random_range(0..max)
        }
    }

    /// Generate a random usize in the range [min, max].
    pub fn gen_range_inclusive(&mut self, min: usize, max: usize) -> usize {
        if min >= max {
            min
        } else {
            self.rng.random_range(min..=max)
        }
    }

    /// Select a random element from a slice.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            None
        } else {
            let idx = self.gen_range(items.len());
            Some(&items[idx])
        }
    }

    /// Select a random index based on weights.
    ///
    /// Returns `None` if all weights are zero (no valid options).
    pub fn weighted_index(&mut self, weights: &[u32]) -> Option<usize> {
        let total: u32 = weights.iter().sum();
        if total == 0 {
            return None;
        }

        let mut threshold = self.rng.random_range(0..total);
        for (i, &weight) in weights.iter().enumerate() {
            if threshold < weight {
                return Some(i);
            }
            threshold -= weight;
        }

        Some(weights.len().saturating_sub(1))
    }

    /// Pick `amount` distinct indices below `len`, in random order.
    ///
    /// `amount` is capped at `len`.
    pub fn sample_indices(&mut self, len: usize, amount: usize) -> Vec<usize> {
        index::sample(&mut self.rng, len, amount.min(len)).into_vec()
    }
}

fn pick<'a, T>(rng: &mut ChaCha8Rng, items: &'a [T]) -> Option<&'a T> {
    if items.is_empty() {
        None
    } else {
        Some(&items[rng.random_range(0..items.len())])
    }
}

fn sample_literal(rng: &mut ChaCha8Rng, spec: &FieldSpec, config: &ExprConfig) -> Option<Literal> {
    let literal = match spec {
        FieldSpec::Keyword { values } | FieldSpec::Text { values, .. } => {
            Literal::Text(pick(rng, values)?.clone())
        }
        FieldSpec::Int { min, max } => {
            let value = if min >= max {
                *min
            } else {
                rng.random_range(*min..=*max)
            };
            Literal::Integer(value)
        }
        FieldSpec::Float { min, max } => Literal::Float(sample_float(rng, *min, *max, config)),
        FieldSpec::Time { min, max } => {
            let lo = min.timestamp_millis() as f64 / 1000.0;
            let hi = max.timestamp_millis() as f64 / 1000.0;
            let u: f64 = rng.random();
            let secs = (lo + (hi - lo) * u).floor() as i64;
            Literal::Timestamp(DateTime::from_timestamp(secs, 0).unwrap_or(*min))
        }
        FieldSpec::List { items, .. } => Literal::from(pick(rng, items)?),
        FieldSpec::Empty => return None,
    };
    Some(literal)
}

fn sample_float(rng: &mut ChaCha8Rng, min: f64, max: f64, config: &ExprConfig) -> f64 {
    let value = if min >= max {
        min
    } else {
        rng.random_range(min..=max)
    };

    match config.float_decimals {
        Some(decimals) => {
            let scale = 10f64.powi(decimals as i32);
            ((value * scale).round() / scale).clamp(min, max.max(min))
        }
        None => value,
    }
}

fn build_predicate(
    rng: &mut ChaCha8Rng,
    key: &str,
    spec: &FieldSpec,
    config: &ExprConfig,
) -> Option<Predicate> {
    let field = key.to_string();
    let compare = |op: CmpOp, value: Literal| Predicate::Compare {
        field: key.to_string(),
        op,
        value,
    };

    let predicate = match spec {
        FieldSpec::Keyword { values } => {
            let distinct: Vec<&String> = values
                .iter()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();

            match rng.random_range(0..3) {
                0 => compare(CmpOp::Eq, sample_literal(rng, spec, config)?),
                1 => compare(CmpOp::Ne, sample_literal(rng, spec, config)?),
                // A single-valued domain has nothing to put in a set
                _ if distinct.len() < 2 => compare(CmpOp::Eq, sample_literal(rng, spec, config)?),
                _ => {
                    let amount = rng
                        .random_range(config.min_in_list..=config.max_in_list)
                        .min(distinct.len());
                    let values = index::sample(rng, distinct.len(), amount)
                        .iter()
                        .map(|i| Literal::Text(distinct[i].clone()))
                        .collect();
                    Predicate::In { field, values }
                }
            }
        }
        FieldSpec::Text { values, .. } => {
            let value = pick(rng, values)?;
            let long = value.chars().count() > config.long_text_threshold;
            // Index 6 is the partial-match slot after the six comparators
            let choice = if long {
                CmpOp::ALL.len()
            } else {
                rng.random_range(0..=CmpOp::ALL.len())
            };

            match CmpOp::ALL.get(choice) {
                Some(op) => compare(*op, Literal::Text(value.clone())),
                None => match like_pattern(rng, value, config) {
                    Some(pattern) => Predicate::Like { field, pattern },
                    None => compare(CmpOp::Eq, Literal::Text(value.clone())),
                },
            }
        }
        FieldSpec::Int { .. } | FieldSpec::Float { .. } => {
            let op = *pick(rng, &CmpOp::ALL)?;
            compare(op, sample_literal(rng, spec, config)?)
        }
        FieldSpec::List { .. } => {
            let op = *pick(rng, &CmpOp::EQUALITY)?;
            compare(op, sample_literal(rng, spec, config)?)
        }
        FieldSpec::Time { .. } => {
            let op = *pick(rng, &CmpOp::ORDERING)?;
            compare(op, sample_literal(rng, spec, config)?)
        }
        FieldSpec::Empty => return None,
    };
    Some(predicate)
}

/// A random contiguous slice of `value`, wildcarded on one side.
///
/// `%` and `_` inside the slice are escaped so they match literally.
fn like_pattern(rng: &mut ChaCha8Rng, value: &str, config: &ExprConfig) -> Option<String> {
    let chars: Vec<char> = value.chars().collect();
    if chars.is_empty() {
        return None;
    }

    let min_len = config.min_like_len.min(chars.len());
    let max_len = config.max_like_len.min(chars.len()).max(min_len);
    let len = rng.random_range(min_len..=max_len);
    let start = rng.random_range(0..=chars.len() - len);

    let mut slice = String::with_capacity(len);
    for &c in &chars[start..start + len] {
        if c == '%' || c == '_' {
            slice.push('\\');
        }
        slice.push(c);
    }

    if rng.random_bool(0.5) {
        Some(format!("%{slice}"))
    } else {
        Some(format!("{slice}%"))
    }
}
