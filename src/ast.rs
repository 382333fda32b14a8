//! Generated query AST.
//!
//! Every node renders to the query language through `Display`, so the text
//! contract lives in one place.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::schema::Scalar;

// =============================================================================
// Queries and segments
// =============================================================================

/// A full generated query: a source declaration followed by piped segments.
#[derive(Debug, Clone)]
pub struct Query {
    pub source: String,
    pub segments: Vec<Segment>,
}

impl Query {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            segments: Vec::new(),
        }
    }

    /// Kinds of the segments in pipeline order.
    pub fn kinds(&self) -> Vec<SegmentKind> {
        self.segments.iter().map(SegmentKind::from).collect()
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source = {}", self.source)?;
        for segment in &self.segments {
            write!(f, " | {segment}")?;
        }
        Ok(())
    }
}

/// One pipeline stage.
#[derive(Debug, Clone, strum::EnumDiscriminants)]
#[strum_discriminants(name(SegmentKind))]
#[strum_discriminants(derive(Hash, PartialOrd, Ord, strum::EnumIter))]
pub enum Segment {
    Dedup {
        field: String,
    },
    Fields {
        fields: Vec<String>,
    },
    Head {
        limit: Option<u32>,
    },
    Rare {
        field: String,
        by: Option<String>,
    },
    Top {
        limit: Option<u32>,
        field: String,
        by: Option<String>,
    },
    Rename {
        from: String,
        to: String,
    },
    Sort {
        field: String,
        descending: bool,
    },
    Stats {
        aggregates: Vec<Aggregate>,
        by: Option<String>,
    },
    Where {
        condition: Condition,
    },
    Eval {
        target: String,
        func: TimePart,
        source: String,
    },
    Parse {
        field: String,
        pattern: String,
    },
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Dedup { field } => write!(f, "dedup {field}"),
            Segment::Fields { fields } => write!(f, "fields {}", fields.join(", ")),
            Segment::Head { limit } => match limit {
                Some(n) => write!(f, "head {n}"),
                None => write!(f, "head"),
            },
            Segment::Rare { field, by } => {
                write!(f, "rare {field}")?;
                write_by(f, by)
            }
            Segment::Top { limit, field, by } => {
                write!(f, "top ")?;
                if let Some(n) = limit {
                    write!(f, "{n} ")?;
                }
                write!(f, "{field}")?;
                write_by(f, by)
            }
            Segment::Rename { from, to } => write!(f, "rename {from} as {to}"),
            Segment::Sort { field, descending } => {
                if *descending {
                    write!(f, "sort - {field}")
                } else {
                    write!(f, "sort {field}")
                }
            }
            Segment::Stats { aggregates, by } => {
                write!(f, "stats ")?;
                for (i, agg) in aggregates.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{agg}")?;
                }
                write_by(f, by)
            }
            Segment::Where { condition } => write!(f, "where {condition}"),
            Segment::Eval {
                target,
                func,
                source,
            } => write!(f, "eval {target} = {}({source})", func.name()),
            Segment::Parse { field, pattern } => {
                write!(f, "parse {field} {}", quote_pattern(pattern))
            }
        }
    }
}

fn write_by(f: &mut fmt::Formatter<'_>, by: &Option<String>) -> fmt::Result {
    match by {
        Some(group) => write!(f, " by {group}"),
        None => Ok(()),
    }
}

impl SegmentKind {
    /// The command keyword introducing this segment.
    pub fn keyword(&self) -> &'static str {
        match self {
            SegmentKind::Dedup => "dedup",
            SegmentKind::Fields => "fields",
            SegmentKind::Head => "head",
            SegmentKind::Rare => "rare",
            SegmentKind::Top => "top",
            SegmentKind::Rename => "rename",
            SegmentKind::Sort => "sort",
            SegmentKind::Stats => "stats",
            SegmentKind::Where => "where",
            SegmentKind::Eval => "eval",
            SegmentKind::Parse => "parse",
        }
    }

    /// Kinds conventionally placed only at the end of a pipeline.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SegmentKind::Dedup
                | SegmentKind::Head
                | SegmentKind::Rare
                | SegmentKind::Stats
                | SegmentKind::Top
        )
    }

    /// Kinds that introduce or rename fields. At most one of them may appear
    /// in a query.
    pub fn is_forcing(&self) -> bool {
        matches!(
            self,
            SegmentKind::Eval | SegmentKind::Rename | SegmentKind::Parse
        )
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

// =============================================================================
// Aggregates
// =============================================================================

/// Aggregate function usable in `stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
pub enum AggFunc {
    Count,
    Sum,
    Avg,
    Max,
    Min,
}

impl AggFunc {
    pub fn name(&self) -> &'static str {
        match self {
            AggFunc::Count => "count",
            AggFunc::Sum => "sum",
            AggFunc::Avg => "avg",
            AggFunc::Max => "max",
            AggFunc::Min => "min",
        }
    }
}

/// An aggregate call, `count()` or `<fn>(<field>)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    pub func: AggFunc,
    pub field: Option<String>,
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{}({field})", self.func.name()),
            None => write!(f, "{}()", self.func.name()),
        }
    }
}

// =============================================================================
// Time-part functions
// =============================================================================

/// Time-part extraction function usable in `eval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
pub enum TimePart {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
    DayOfWeek,
    DayOfYear,
}

impl TimePart {
    pub fn name(&self) -> &'static str {
        match self {
            TimePart::Second => "SECOND",
            TimePart::Minute => "MINUTE",
            TimePart::Hour => "HOUR",
            TimePart::Day => "DAY",
            TimePart::Week => "WEEK",
            TimePart::Month => "MONTH",
            TimePart::Year => "YEAR",
            TimePart::DayOfWeek => "DAYOFWEEK",
            TimePart::DayOfYear => "DAYOFYEAR",
        }
    }

    /// Inclusive range of the extracted value. `years` is the year span of
    /// the source field, used only by `YEAR`.
    pub fn bounds(&self, years: (i64, i64)) -> (i64, i64) {
        match self {
            TimePart::Second | TimePart::Minute => (0, 59),
            TimePart::Hour => (0, 23),
            TimePart::Day => (1, 31),
            TimePart::Week => (0, 53),
            TimePart::Month => (1, 12),
            TimePart::Year => years,
            TimePart::DayOfWeek => (1, 7),
            TimePart::DayOfYear => (1, 366),
        }
    }
}

// =============================================================================
// Predicates
// =============================================================================

/// A literal value in the query language.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl From<&Scalar> for Literal {
    fn from(scalar: &Scalar) -> Self {
        match scalar {
            Scalar::Integer(i) => Literal::Integer(*i),
            Scalar::Float(v) => Literal::Float(*v),
            Scalar::Text(s) => Literal::Text(s.clone()),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Integer(i) => write!(f, "{i}"),
            // Fixed notation, with a decimal point on whole numbers: 5.0, not 5
            Literal::Float(v) if v.fract() == 0.0 => write!(f, "{v:.1}"),
            Literal::Float(v) => write!(f, "{v}"),
            Literal::Text(s) => f.write_str(&quote(s)),
            Literal::Timestamp(t) => {
                write!(f, "TIMESTAMP('{}')", t.format("%Y-%m-%d %H:%M:%S"))
            }
        }
    }
}

/// Quote a string literal. Single quotes unless the value contains a single
/// quote and no double quote.
pub fn quote(s: &str) -> String {
    let delim = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };

    let mut out = String::with_capacity(s.len() + 2);
    out.push(delim);
    for c in s.chars() {
        if c == '\\' || c == delim {
            out.push('\\');
        }
        out.push(c);
    }
    out.push(delim);
    out
}

/// Single-quote a regex pattern.
///
/// Backslashes are regex escapes and pass through untouched; a quote that is
/// not already escaped gets a backslash.
pub fn quote_pattern(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 2);
    out.push('\'');
    let mut backslashes = 0;
    for c in pattern.chars() {
        if c == '\'' && backslashes % 2 == 0 {
            out.push('\\');
        }
        backslashes = if c == '\\' { backslashes + 1 } else { 0 };
        out.push(c);
    }
    out.push('\'');
    out
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CmpOp {
    /// The full comparator set.
    pub const ALL: [CmpOp; 6] = [
        CmpOp::Eq,
        CmpOp::Ne,
        CmpOp::Gt,
        CmpOp::Ge,
        CmpOp::Lt,
        CmpOp::Le,
    ];

    /// Comparators meaningful on instants.
    pub const ORDERING: [CmpOp; 5] = [CmpOp::Eq, CmpOp::Gt, CmpOp::Ge, CmpOp::Lt, CmpOp::Le];

    /// Comparators approximating contains / does-not-contain on lists.
    pub const EQUALITY: [CmpOp; 2] = [CmpOp::Eq, CmpOp::Ne];
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "!=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
        };
        f.write_str(op)
    }
}

/// A single boolean predicate over one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        field: String,
        op: CmpOp,
        value: Literal,
    },
    In {
        field: String,
        values: Vec<Literal>,
    },
    Like {
        field: String,
        pattern: String,
    },
}

impl Predicate {
    pub fn field(&self) -> &str {
        match self {
            Predicate::Compare { field, .. }
            | Predicate::In { field, .. }
            | Predicate::Like { field, .. } => field,
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Compare { field, op, value } => write!(f, "{field} {op} {value}"),
            Predicate::In { field, values } => {
                write!(f, "{field} IN (")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, ")")
            }
            Predicate::Like { field, pattern } => {
                write!(f, "LIKE({field}, {})", quote(pattern))
            }
        }
    }
}

/// Logical connective between predicates. Negation is never generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connective {
    And,
    Or,
}

impl fmt::Display for Connective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Connective::And => write!(f, "AND"),
            Connective::Or => write!(f, "OR"),
        }
    }
}

/// A flat chain of predicates, `p1 AND p2 OR p3`.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub first: Predicate,
    pub rest: Vec<(Connective, Predicate)>,
}

impl Condition {
    pub fn predicates(&self) -> impl Iterator<Item = &Predicate> {
        std::iter::once(&self.first).chain(self.rest.iter().map(|(_, p)| p))
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.first)?;
        for (connective, predicate) in &self.rest {
            write!(f, " {connective} {predicate}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_query_display() {
        let query = Query {
            source: "nginx".to_string(),
            segments: vec![
                Segment::Where {
                    condition: Condition {
                        first: Predicate::Compare {
                            field: "method".to_string(),
                            op: CmpOp::Eq,
                            value: Literal::Text("GET".to_string()),
                        },
                        rest: vec![(
                            Connective::Or,
                            Predicate::In {
                                field: "status".to_string(),
                                values: vec![Literal::Integer(200), Literal::Integer(404)],
                            },
                        )],
                    },
                },
                Segment::Sort {
                    field: "duration".to_string(),
                    descending: true,
                },
                Segment::Head { limit: Some(10) },
            ],
        };

        assert_eq!(
            query.to_string(),
            "source = nginx | where method = 'GET' OR status IN (200, 404) | sort - duration | head 10"
        );
        assert_eq!(
            query.kinds(),
            vec![SegmentKind::Where, SegmentKind::Sort, SegmentKind::Head]
        );
    }

    #[test]
    fn test_bare_source() {
        assert_eq!(Query::new("logs").to_string(), "source = logs");
    }

    #[test]
    fn test_stats_display() {
        let seg = Segment::Stats {
            aggregates: vec![
                Aggregate {
                    func: AggFunc::Count,
                    field: None,
                },
                Aggregate {
                    func: AggFunc::Avg,
                    field: Some("duration".to_string()),
                },
            ],
            by: Some("method".to_string()),
        };
        assert_eq!(seg.to_string(), "stats count(), avg(duration) by method");
    }

    #[test]
    fn test_top_rare_display() {
        let top = Segment::Top {
            limit: Some(5),
            field: "path".to_string(),
            by: Some("method".to_string()),
        };
        assert_eq!(top.to_string(), "top 5 path by method");

        let rare = Segment::Rare {
            field: "path".to_string(),
            by: None,
        };
        assert_eq!(rare.to_string(), "rare path");
    }

    #[test]
    fn test_eval_parse_rename_display() {
        let eval = Segment::Eval {
            target: "hour_timestamp".to_string(),
            func: TimePart::Hour,
            source: "@timestamp".to_string(),
        };
        assert_eq!(eval.to_string(), "eval hour_timestamp = HOUR(@timestamp)");

        let parse = Segment::Parse {
            field: "message".to_string(),
            pattern: r"(?<verb>\w+) .*".to_string(),
        };
        assert_eq!(parse.to_string(), r"parse message '(?<verb>\w+) .*'");

        let quoted = Segment::Parse {
            field: "message".to_string(),
            pattern: r"user='(?<user>[^']+)' note=\'x".to_string(),
        };
        assert_eq!(
            quoted.to_string(),
            r"parse message 'user=\'(?<user>[^\']+)\' note=\'x'"
        );

        let rename = Segment::Rename {
            from: "http.method".to_string(),
            to: "method".to_string(),
        };
        assert_eq!(rename.to_string(), "rename http.method as method");
    }

    #[test]
    fn test_literal_display() {
        assert_eq!(Literal::Integer(0).to_string(), "0");
        assert_eq!(Literal::Float(5.0).to_string(), "5.0");
        assert_eq!(Literal::Float(2.25).to_string(), "2.25");
        assert_eq!(Literal::Float(-3.0).to_string(), "-3.0");
        assert_eq!(
            Literal::Float(4.210427788694593e-5).to_string(),
            "0.00004210427788694593"
        );
        assert_eq!(Literal::Float(1e16).to_string(), "10000000000000000.0");
        assert_eq!(Literal::Text("GET".to_string()).to_string(), "'GET'");
        assert_eq!(Literal::Text("it's".to_string()).to_string(), "\"it's\"");

        let t = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap();
        assert_eq!(
            Literal::Timestamp(t).to_string(),
            "TIMESTAMP('2024-03-01 12:30:05')"
        );
    }

    #[test]
    fn test_like_display() {
        let like = Predicate::Like {
            field: "agent".to_string(),
            pattern: "%Mozilla".to_string(),
        };
        assert_eq!(like.to_string(), "LIKE(agent, '%Mozilla')");
    }

    #[test]
    fn test_kind_classification() {
        assert!(SegmentKind::Stats.is_terminal());
        assert!(!SegmentKind::Where.is_terminal());
        assert!(SegmentKind::Rename.is_forcing());
        assert!(!SegmentKind::Fields.is_forcing());
        assert_eq!(SegmentKind::Where.to_string(), "where");
    }
}
