//! Request validation
//!
//! Every request model implements [`Schema`], a parse function from an
//! untyped JSON value into the model that reports *every* violated rule
//! rather than stopping at the first one. The [`Fields`] reader does the
//! field extraction, coercion and bookkeeping; the extractors in [`extract`]
//! apply a schema to the body, query string or route parameters and turn a
//! failure into the matching [`crate::api::ApiError`].
//!
//! # Example
//!
//! ```rust
//! use pharma_service::validation::{Fields, Schema, ValidationErrors};
//! use serde_json::{json, Value};
//!
//! struct NewCategory {
//!     name: String,
//!     position: i64,
//! }
//!
//! impl Schema for NewCategory {
//!     fn parse(input: &Value) -> Result<Self, ValidationErrors> {
//!         let mut fields = Fields::new(input);
//!         let name = fields.required_str("name");
//!         let position = fields.optional_i64("position").unwrap_or(0);
//!         fields.finish()?;
//!         Ok(Self { name: name.unwrap_or_default(), position })
//!     }
//! }
//!
//! let errors = NewCategory::parse(&json!({ "position": "x" })).err().unwrap();
//! assert_eq!(errors.len(), 2);
//! ```

pub mod extract;
mod fields;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use extract::{ValidJson, ValidPath, ValidQuery};
pub use fields::Fields;

/// A single violated rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    /// Dotted path of the offending field; empty for the input as a whole
    pub field: String,
    /// Human-readable explanation
    pub message: String,
    /// Machine-readable rule name (`required`, `invalid_type`, `too_small`, ...)
    pub code: String,
}

/// Every violation found while parsing one input, in encounter order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    violations: Vec<FieldViolation>,
}

impl ValidationErrors {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Collection holding exactly one violation
    pub fn single(
        field: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let mut errors = Self::new();
        errors.push(field, code, message);
        errors
    }

    /// Record a violation
    pub fn push(
        &mut self,
        field: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.violations.push(FieldViolation {
            field: field.into(),
            message: message.into(),
            code: code.into(),
        });
    }

    /// Append every violation from `other`
    pub fn extend(&mut self, other: ValidationErrors) {
        self.violations.extend(other.violations);
    }

    /// True when no rule was violated
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Number of violations
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// Borrow the violations
    pub fn violations(&self) -> &[FieldViolation] {
        &self.violations
    }

    /// Take ownership of the violations
    pub fn into_violations(self) -> Vec<FieldViolation> {
        self.violations
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation error(s)", self.violations.len())?;
        for (i, v) in self.violations.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            if v.field.is_empty() {
                write!(f, "{sep}{}", v.message)?;
            } else {
                write!(f, "{sep}{}: {}", v.field, v.message)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// A typed request model parsed from untyped JSON
pub trait Schema: Sized {
    /// Parse `input`, applying defaults and coercions, or return every violation
    fn parse(input: &Value) -> Result<Self, ValidationErrors>;
}

/// Part of the request a schema was applied to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputSource {
    /// JSON request body
    Body,
    /// Query string
    Query,
    /// Route parameters
    Params,
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Body => write!(f, "body"),
            Self::Query => write!(f, "query"),
            Self::Params => write!(f, "params"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_lists_every_violation() {
        let mut errors = ValidationErrors::new();
        errors.push("name", "required", "name is required");
        errors.push("", "invalid_type", "Expected an object");

        assert_eq!(
            errors.to_string(),
            "2 validation error(s): name: name is required; Expected an object"
        );
    }

    #[test]
    fn test_extend_keeps_order() {
        let mut first = ValidationErrors::single("a", "required", "a is required");
        first.extend(ValidationErrors::single("b", "too_small", "b is too small"));

        let fields: Vec<_> = first.violations().iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["a", "b"]);
    }

    #[test]
    fn test_violation_serializes_with_field_message_code() {
        let v = FieldViolation {
            field: "lines.0.quantity".into(),
            message: "quantity must be at least 1".into(),
            code: "too_small".into(),
        };
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["field"], "lines.0.quantity");
        assert_eq!(json["code"], "too_small");
    }
}
