//! Error types for query generation.

use std::fmt;

/// Error that aborts the generation of a query.
///
/// Infeasible segment attempts are not errors; they are reported through
/// [`crate::generate::Attempt::Retry`] and never reach this type.
#[derive(Debug, Clone)]
pub struct GenError {
    pub kind: GenErrorKind,
    pub scope: String,
    pub context: Vec<String>,
}

/// Kind of generation error.
#[derive(Debug, Clone)]
pub enum GenErrorKind {
    /// A narrowing operation would have removed a forced field.
    ForcedFieldDropped { field: String },

    /// A field was referenced that is not part of the context.
    UnknownField { field: String },

    /// Invalid policy configuration.
    InvalidConfig { message: String },
}

impl GenError {
    /// Create a forced-field-dropped error.
    pub fn forced_field_dropped(field: impl Into<String>) -> Self {
        Self {
            kind: GenErrorKind::ForcedFieldDropped {
                field: field.into(),
            },
            scope: String::new(),
            context: vec![],
        }
    }

    /// Create an unknown field error.
    pub fn unknown_field(field: impl Into<String>) -> Self {
        Self {
            kind: GenErrorKind::UnknownField {
                field: field.into(),
            },
            scope: String::new(),
            context: vec![],
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self {
            kind: GenErrorKind::InvalidConfig {
                message: message.into(),
            },
            scope: String::new(),
            context: vec![],
        }
    }

    /// Add context to the error.
    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    /// Set the scope.
    pub fn in_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }
}

impl fmt::Display for GenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            GenErrorKind::ForcedFieldDropped { field } => {
                if self.scope.is_empty() {
                    write!(f, "forced field '{field}' would be dropped")?;
                } else {
                    write!(
                        f,
                        "forced field '{field}' would be dropped in scope '{}'",
                        self.scope
                    )?;
                }
            }
            GenErrorKind::UnknownField { field } => {
                write!(f, "field '{field}' is not in the context")?;
            }
            GenErrorKind::InvalidConfig { message } => {
                write!(f, "invalid configuration: {message}")?;
            }
        }

        if !self.context.is_empty() {
            write!(f, "\n  context:")?;
            for c in &self.context {
                write!(f, "\n    - {c}")?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for GenError {}
