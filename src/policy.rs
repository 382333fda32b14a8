//! Runtime policy for controlling generation weights and limits.
//!
//! The Policy struct holds every probability, range and constant used while
//! generating a query. Tests and callers can tighten or loosen individual
//! knobs on top of the defaults.

use crate::ast::{AggFunc, SegmentKind};
use crate::context::Context;
use crate::error::GenError;

/// Runtime policy controlling generation weights and limits.
#[derive(Debug, Clone)]
pub struct Policy {
    /// Weights for segment kinds (0 = disabled).
    pub segment_weights: SegmentWeights,

    /// Attempts per pipeline position before the position is abandoned.
    pub max_retries: usize,

    /// Minimum number of segments a query aims for.
    pub min_segments: usize,

    /// Maximum number of segments a query aims for.
    pub max_segments: usize,

    /// Row counts offered to `head` and `top` (`None` = no count).
    pub limits: Vec<Option<u32>>,

    pub expr_config: ExprConfig,
    pub fields_config: FieldsConfig,
    pub grouping_config: GroupingConfig,
    pub parse_config: ParseConfig,
    pub stats_config: StatsConfig,
    pub where_config: WhereConfig,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            segment_weights: SegmentWeights::default(),
            max_retries: 10,
            min_segments: 1,
            max_segments: 5,
            limits: vec![None, Some(1), Some(5), Some(10), Some(100)],
            expr_config: ExprConfig::default(),
            fields_config: FieldsConfig::default(),
            grouping_config: GroupingConfig::default(),
            parse_config: ParseConfig::default(),
            stats_config: StatsConfig::default(),
            where_config: WhereConfig::default(),
        }
    }
}

impl Policy {
    /// Create a new policy with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set segment weights.
    pub fn with_segment_weights(mut self, weights: SegmentWeights) -> Self {
        self.segment_weights = weights;
        self
    }

    /// Builder method to set the retry ceiling.
    pub fn with_max_retries(mut self, retries: usize) -> Self {
        self.max_retries = retries;
        self
    }

    /// Builder method to set the target segment count range.
    pub fn with_segment_range(mut self, min: usize, max: usize) -> Self {
        self.min_segments = min;
        self.max_segments = max;
        self
    }

    /// Builder method to set expression config.
    pub fn with_expr_config(mut self, config: ExprConfig) -> Self {
        self.expr_config = config;
        self
    }

    /// Builder method to set stats config.
    pub fn with_stats_config(mut self, config: StatsConfig) -> Self {
        self.stats_config = config;
        self
    }

    /// Check ranges and probabilities for consistency.
    pub fn validate(&self) -> Result<(), GenError> {
        if self.min_segments > self.max_segments {
            return Err(GenError::invalid_config(
                "min_segments is greater than max_segments",
            ));
        }
        if self.limits.is_empty() {
            return Err(GenError::invalid_config("limits must not be empty"));
        }
        if self.stats_config.functions.is_empty() {
            return Err(GenError::invalid_config(
                "stats_config.functions must not be empty",
            ));
        }
        if self.stats_config.min_aggregates == 0
            || self.stats_config.min_aggregates > self.stats_config.max_aggregates
        {
            return Err(GenError::invalid_config(
                "stats aggregate range must be non-empty and start at 1 or more",
            ));
        }
        if self.where_config.min_predicates == 0
            || self.where_config.min_predicates > self.where_config.max_predicates
        {
            return Err(GenError::invalid_config(
                "where predicate range must be non-empty and start at 1 or more",
            ));
        }
        if self.fields_config.max_fields == 0 {
            return Err(GenError::invalid_config("fields_config.max_fields is 0"));
        }
        self.expr_config.validate()?;

        let probabilities = [
            ("grouping_config.by_probability", self.grouping_config.by_probability),
            ("stats_config.by_probability", self.stats_config.by_probability),
            (
                "stats_config.count_without_field_probability",
                self.stats_config.count_without_field_probability,
            ),
        ];
        for (name, prob) in probabilities {
            if !(0.0..=1.0).contains(&prob) {
                return Err(GenError::invalid_config(format!(
                    "{name} must be within [0, 1], got {prob}"
                )));
            }
        }

        Ok(())
    }

    /// Select a segment kind from candidates based on weights.
    ///
    /// Returns `None` when every candidate has zero weight.
    pub fn select_segment_kind(
        &self,
        ctx: &mut Context,
        candidates: &[SegmentKind],
    ) -> Option<SegmentKind> {
        let weights: Vec<u32> = candidates
            .iter()
            .map(|k| self.segment_weights.weight_for(*k))
            .collect();

        ctx.weighted_index(&weights).map(|idx| candidates[idx])
    }
}

/// Weights for segment kinds.
///
/// Equal weights give the uniform choice among eligible generators.
#[derive(Debug, Clone)]
pub struct SegmentWeights {
    pub dedup: u32,
    pub fields: u32,
    pub head: u32,
    pub rare: u32,
    pub rename: u32,
    pub sort: u32,
    pub stats: u32,
    pub top: u32,
    pub filter: u32,
    pub eval: u32,
    pub parse: u32,
}

impl Default for SegmentWeights {
    fn default() -> Self {
        Self {
            dedup: 1,
            fields: 1,
            head: 1,
            rare: 1,
            rename: 1,
            sort: 1,
            stats: 1,
            top: 1,
            filter: 1,
            eval: 1,
            parse: 1,
        }
    }
}

impl SegmentWeights {
    /// Weights that only ever pick `kind`.
    pub fn only(kind: SegmentKind) -> Self {
        let mut weights = Self {
            dedup: 0,
            fields: 0,
            head: 0,
            rare: 0,
            rename: 0,
            sort: 0,
            stats: 0,
            top: 0,
            filter: 0,
            eval: 0,
            parse: 0,
        };
        *weights.weight_mut(kind) = 1;
        weights
    }

    /// Get the weight for a segment kind.
    pub fn weight_for(&self, kind: SegmentKind) -> u32 {
        match kind {
            SegmentKind::Dedup => self.dedup,
            SegmentKind::Fields => self.fields,
            SegmentKind::Head => self.head,
            SegmentKind::Rare => self.rare,
            SegmentKind::Rename => self.rename,
            SegmentKind::Sort => self.sort,
            SegmentKind::Stats => self.stats,
            SegmentKind::Top => self.top,
            SegmentKind::Where => self.filter,
            SegmentKind::Eval => self.eval,
            SegmentKind::Parse => self.parse,
        }
    }

    fn weight_mut(&mut self, kind: SegmentKind) -> &mut u32 {
        match kind {
            SegmentKind::Dedup => &mut self.dedup,
            SegmentKind::Fields => &mut self.fields,
            SegmentKind::Head => &mut self.head,
            SegmentKind::Rare => &mut self.rare,
            SegmentKind::Rename => &mut self.rename,
            SegmentKind::Sort => &mut self.sort,
            SegmentKind::Stats => &mut self.stats,
            SegmentKind::Top => &mut self.top,
            SegmentKind::Where => &mut self.filter,
            SegmentKind::Eval => &mut self.eval,
            SegmentKind::Parse => &mut self.parse,
        }
    }
}

/// Configuration for literal sampling and predicate building.
#[derive(Debug, Clone, Copy)]
pub struct ExprConfig {
    /// Minimum number of values in an `IN` list.
    pub min_in_list: usize,
    /// Maximum number of values in an `IN` list.
    pub max_in_list: usize,
    /// Text literals longer than this always use partial match.
    pub long_text_threshold: usize,
    /// Minimum length of the slice used as a partial-match pattern.
    pub min_like_len: usize,
    /// Maximum length of the slice used as a partial-match pattern.
    pub max_like_len: usize,
    /// Round sampled floats to this many decimals (`None` keeps full precision).
    pub float_decimals: Option<u32>,
}

impl Default for ExprConfig {
    fn default() -> Self {
        Self {
            min_in_list: 2,
            max_in_list: 4,
            long_text_threshold: 20,
            min_like_len: 2,
            max_like_len: 20,
            float_decimals: None,
        }
    }
}

impl ExprConfig {
    fn validate(&self) -> Result<(), GenError> {
        if self.min_in_list < 2 || self.min_in_list > self.max_in_list {
            return Err(GenError::invalid_config(
                "IN list range must start at 2 or more and be non-empty",
            ));
        }
        if self.min_like_len == 0 || self.min_like_len > self.max_like_len {
            return Err(GenError::invalid_config(
                "partial-match slice range must start at 1 or more and be non-empty",
            ));
        }
        Ok(())
    }
}

/// Configuration for `fields` projections.
#[derive(Debug, Clone)]
pub struct FieldsConfig {
    /// Upper bound on sampled fields (forced fields come on top).
    pub max_fields: usize,
}

impl Default for FieldsConfig {
    fn default() -> Self {
        Self { max_fields: 5 }
    }
}

/// Configuration for `top` and `rare`.
#[derive(Debug, Clone)]
pub struct GroupingConfig {
    /// Probability of a `by` clause when value and grouping fields differ.
    pub by_probability: f64,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            by_probability: 0.75,
        }
    }
}

/// Configuration for `parse`.
#[derive(Debug, Clone)]
pub struct ParseConfig {
    /// Extracted strings with at most this many distinct values become
    /// keyword fields; anything wider becomes text.
    pub max_keyword_values: usize,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            max_keyword_values: 10,
        }
    }
}

/// Configuration for `stats`.
#[derive(Debug, Clone)]
pub struct StatsConfig {
    /// Aggregate functions to draw from.
    pub functions: Vec<AggFunc>,
    pub min_aggregates: usize,
    pub max_aggregates: usize,
    /// Probability of `count()` having no argument.
    pub count_without_field_probability: f64,
    /// Probability of a `by` clause when the grouping field is not forced.
    pub by_probability: f64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            functions: vec![
                AggFunc::Count,
                AggFunc::Sum,
                AggFunc::Avg,
                AggFunc::Max,
                AggFunc::Min,
            ],
            min_aggregates: 1,
            max_aggregates: 3,
            count_without_field_probability: 0.5,
            by_probability: 0.5,
        }
    }
}

/// Configuration for `where`.
#[derive(Debug, Clone)]
pub struct WhereConfig {
    pub min_predicates: usize,
    pub max_predicates: usize,
    /// Draws allowed to find an unused field before giving up.
    pub max_field_attempts: usize,
}

impl Default for WhereConfig {
    fn default() -> Self {
        Self {
            min_predicates: 1,
            max_predicates: 3,
            max_field_attempts: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;
    use strum::IntoEnumIterator;

    #[test]
    fn test_default_policy() {
        let policy = Policy::default();
        assert_eq!(policy.max_retries, 10);
        assert_eq!(policy.min_segments, 1);
        assert_eq!(policy.max_segments, 5);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_default_weights_are_uniform() {
        let weights = SegmentWeights::default();
        for kind in SegmentKind::iter() {
            assert_eq!(weights.weight_for(kind), 1, "{kind:?}");
        }
    }

    #[test]
    fn test_weights_only() {
        let weights = SegmentWeights::only(SegmentKind::Sort);
        for kind in SegmentKind::iter() {
            let expected = u32::from(kind == SegmentKind::Sort);
            assert_eq!(weights.weight_for(kind), expected);
        }
    }

    #[test]
    fn test_validate_rejects_inverted_segment_range() {
        let policy = Policy::default().with_segment_range(4, 2);
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_probability() {
        let mut policy = Policy::default();
        policy.grouping_config.by_probability = 1.5;
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_select_segment_kind_skips_zero_weight() {
        let policy = Policy::default().with_segment_weights(SegmentWeights::only(SegmentKind::Head));
        let mut ctx = Context::new_with_seed(&Schema::default(), 7);
        let candidates = [SegmentKind::Sort, SegmentKind::Head, SegmentKind::Where];
        for _ in 0..20 {
            assert_eq!(
                policy.select_segment_kind(&mut ctx, &candidates),
                Some(SegmentKind::Head)
            );
        }
        assert_eq!(
            policy.select_segment_kind(&mut ctx, &[SegmentKind::Sort]),
            None
        );
    }
}
