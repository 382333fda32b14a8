//! Schema types describing the shape of indexed data.
//!
//! A schema document is a JSON object mapping field names to field
//! specifications, tagged by `type`:
//!
//! ```json
//! {
//!   "method": { "type": "keyword", "values": ["GET", "POST"] },
//!   "duration": { "type": "int", "min": 0, "max": 1000 },
//!   "@timestamp": { "type": "time", "min": "2024-01-01T00:00:00.000Z", "max": "2024-01-02T00:00:00.000Z" }
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;

/// Error raised while loading or validating a schema document.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("malformed schema document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("field '{field}' has an empty value set")]
    EmptyDomain { field: String },

    #[error("field '{field}' has a minimum greater than its maximum")]
    InvertedRange { field: String },

    #[error("invalid parser pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("parser pattern '{pattern}' has no named group '{capture}'")]
    UnknownCapture { pattern: String, capture: String },
}

/// Type tag of a field specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Keyword,
    Text,
    Int,
    Float,
    Time,
    List,
    None,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Keyword => write!(f, "keyword"),
            FieldType::Text => write!(f, "text"),
            FieldType::Int => write!(f, "int"),
            FieldType::Float => write!(f, "float"),
            FieldType::Time => write!(f, "time"),
            FieldType::List => write!(f, "list"),
            FieldType::None => write!(f, "none"),
        }
    }
}

/// A scalar list item as it appears in the schema document.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Integer(i64),
    Float(f64),
    Text(String),
}

/// Description of one field's type and value domain.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldSpec {
    Keyword {
        values: Vec<String>,
    },
    Text {
        values: Vec<String>,
        #[serde(default)]
        unique: bool,
        #[serde(default)]
        parser: Option<ParserSpec>,
    },
    Int {
        min: i64,
        max: i64,
    },
    Float {
        min: f64,
        max: f64,
    },
    Time {
        min: DateTime<Utc>,
        max: DateTime<Utc>,
    },
    List {
        items: Vec<Scalar>,
        #[serde(default)]
        min_len: usize,
        #[serde(default)]
        max_len: usize,
    },
    /// No observed values. Never generated.
    #[serde(rename = "none")]
    Empty,
}

impl FieldSpec {
    pub fn keyword<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldSpec::Keyword {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn text<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldSpec::Text {
            values: values.into_iter().map(Into::into).collect(),
            unique: false,
            parser: None,
        }
    }

    pub fn int(min: i64, max: i64) -> Self {
        FieldSpec::Int { min, max }
    }

    pub fn float(min: f64, max: f64) -> Self {
        FieldSpec::Float { min, max }
    }

    pub fn time(min: DateTime<Utc>, max: DateTime<Utc>) -> Self {
        FieldSpec::Time { min, max }
    }

    pub fn list(items: Vec<Scalar>) -> Self {
        FieldSpec::List {
            items,
            min_len: 1,
            max_len: 1,
        }
    }

    /// Attach a parser descriptor. Only text fields can carry one; other
    /// specs are returned unchanged.
    pub fn with_parser(self, parser: ParserSpec) -> Self {
        match self {
            FieldSpec::Text { values, unique, .. } => FieldSpec::Text {
                values,
                unique,
                parser: Some(parser),
            },
            other => other,
        }
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            FieldSpec::Keyword { .. } => FieldType::Keyword,
            FieldSpec::Text { .. } => FieldType::Text,
            FieldSpec::Int { .. } => FieldType::Int,
            FieldSpec::Float { .. } => FieldType::Float,
            FieldSpec::Time { .. } => FieldType::Time,
            FieldSpec::List { .. } => FieldType::List,
            FieldSpec::Empty => FieldType::None,
        }
    }

    /// Returns true for types with a meaningful ordering.
    pub fn is_sortable(&self) -> bool {
        matches!(
            self,
            FieldSpec::Text { .. }
                | FieldSpec::Int { .. }
                | FieldSpec::Float { .. }
                | FieldSpec::Time { .. }
        )
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldSpec::Int { .. } | FieldSpec::Float { .. })
    }

    pub fn is_time(&self) -> bool {
        matches!(self, FieldSpec::Time { .. })
    }

    /// Returns false for fields that carry no observed values.
    pub fn is_generative(&self) -> bool {
        !matches!(self, FieldSpec::Empty)
    }

    pub fn parser(&self) -> Option<&ParserSpec> {
        match self {
            FieldSpec::Text { parser, .. } => parser.as_ref(),
            _ => None,
        }
    }

    fn validate(&self, field: &str) -> Result<(), SchemaError> {
        let empty = || SchemaError::EmptyDomain {
            field: field.to_string(),
        };
        let inverted = || SchemaError::InvertedRange {
            field: field.to_string(),
        };

        match self {
            FieldSpec::Keyword { values } | FieldSpec::Text { values, .. } => {
                if values.is_empty() {
                    return Err(empty());
                }
            }
            FieldSpec::Int { min, max } => {
                if min > max {
                    return Err(inverted());
                }
            }
            FieldSpec::Float { min, max } => {
                // NaN bounds fail this comparison too
                if !(min <= max) {
                    return Err(inverted());
                }
            }
            FieldSpec::Time { min, max } => {
                if min > max {
                    return Err(inverted());
                }
            }
            FieldSpec::List {
                items,
                min_len,
                max_len,
            } => {
                if items.is_empty() {
                    return Err(empty());
                }
                if min_len > max_len {
                    return Err(inverted());
                }
            }
            FieldSpec::Empty => {}
        }

        Ok(())
    }
}

/// A named-group pattern that can extract sub-fields from a text field.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawParserSpec")]
pub struct ParserSpec {
    regex: Regex,
    fields: Vec<String>,
}

#[derive(Deserialize)]
struct RawParserSpec {
    pattern: String,
    fields: Vec<String>,
}

impl TryFrom<RawParserSpec> for ParserSpec {
    type Error = SchemaError;

    fn try_from(raw: RawParserSpec) -> Result<Self, Self::Error> {
        ParserSpec::new(&raw.pattern, raw.fields)
    }
}

impl ParserSpec {
    /// Compile a parser descriptor. Every listed field must be a named group
    /// of the pattern.
    pub fn new<I, S>(pattern: &str, fields: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let regex = Regex::new(pattern).map_err(|source| SchemaError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();

        for field in &fields {
            if !regex.capture_names().flatten().any(|name| name == field) {
                return Err(SchemaError::UnknownCapture {
                    pattern: pattern.to_string(),
                    capture: field.clone(),
                });
            }
        }

        Ok(Self { regex, fields })
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Names of the sub-fields this parser extracts.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// The pattern in the query language's named-group syntax, `(?<name>...)`.
    pub fn render(&self) -> String {
        self.pattern().replace("(?P<", "(?<")
    }
}

/// Immutable mapping from field name to specification.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    pub fields: BTreeMap<String, FieldSpec>,
}

impl Schema {
    /// Parse and validate a JSON schema document.
    pub fn from_json(document: &str) -> Result<Self, SchemaError> {
        let schema: Schema = serde_json::from_str(document)?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        for (name, spec) in &self.fields {
            spec.validate(name)?;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    /// Fields that take part in generation (everything but `none`).
    pub fn generative_fields(&self) -> impl Iterator<Item = (&String, &FieldSpec)> {
        self.fields.iter().filter(|(_, spec)| spec.is_generative())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Builder for constructing a schema in code.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    fields: BTreeMap<String, FieldSpec>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.insert(name.into(), spec);
        self
    }

    pub fn build(self) -> Schema {
        Schema {
            fields: self.fields,
        }
    }
}
