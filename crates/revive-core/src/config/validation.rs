//! Accumulating configuration validator.

use crate::errors::ReviveError;
use std::fmt;

/// A single configuration problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Value is required but missing or empty
    Required {
        /// Dotted field path
        field: String,
    },
    /// Value must be non-zero
    Zero {
        /// Dotted field path
        field: String,
    },
    /// Custom rule failed
    Custom {
        /// Dotted field path
        field: String,
        /// What went wrong
        message: String,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Required { field } => {
                write!(f, "field '{field}' is required but missing")
            }
            ValidationError::Zero { field } => write!(f, "field '{field}' must be non-zero"),
            ValidationError::Custom { field, message } => write!(f, "field '{field}': {message}"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Collects validation failures under a dotted field prefix.
#[derive(Debug, Default)]
pub struct ConfigValidator {
    errors: Vec<ValidationError>,
    field_prefix: String,
}

impl ConfigValidator {
    /// Create a validator at the root.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a validator for a nested section.
    pub fn for_field(&self, field_name: &str) -> Self {
        Self {
            errors: Vec::new(),
            field_prefix: self.full_field_name(field_name),
        }
    }

    /// Require a non-empty (after trimming) string.
    pub fn non_empty(&mut self, field_name: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.errors.push(ValidationError::Required {
                field: self.full_field_name(field_name),
            });
        }
        self
    }

    /// Require a non-zero number.
    pub fn non_zero<T>(&mut self, field_name: &str, value: T) -> &mut Self
    where
        T: PartialEq + Default,
    {
        if value == T::default() {
            self.errors.push(ValidationError::Zero {
                field: self.full_field_name(field_name),
            });
        }
        self
    }

    /// Validate using a custom predicate.
    pub fn custom(&mut self, field_name: &str, ok: bool, message: impl Into<String>) -> &mut Self {
        if !ok {
            self.errors.push(ValidationError::Custom {
                field: self.full_field_name(field_name),
                message: message.into(),
            });
        }
        self
    }

    /// Merge errors from a nested validator.
    pub fn merge(&mut self, other: ConfigValidator) {
        self.errors.extend(other.errors);
    }

    /// All collected errors.
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// `Ok` when nothing failed, otherwise every failure in one `Invalid`.
    pub fn finish(self) -> Result<(), ReviveError> {
        if self.errors.is_empty() {
            return Ok(());
        }
        let joined = self
            .errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Err(ReviveError::invalid(format!("configuration rejected: {joined}")))
    }

    fn full_field_name(&self, field_name: &str) -> String {
        if self.field_prefix.is_empty() {
            field_name.to_string()
        } else {
            format!("{}.{}", self.field_prefix, field_name)
        }
    }
}
