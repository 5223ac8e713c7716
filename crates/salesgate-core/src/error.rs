//! # Error Types
//!
//! Validation errors raised before a request reaches the engine.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  salesgate-core (this file)                                            │
//! │  └── ValidationError  - shape / business-rule violations               │
//! │                                                                         │
//! │  salesgate-engine                                                      │
//! │  └── EngineError      - faults reported by the engine                  │
//! │                                                                         │
//! │  salesgate-gateway                                                     │
//! │  ├── GatewayError     - the taxonomy callers see                       │
//! │  └── ApiError         - serialized inside ApiResponse                  │
//! │                                                                         │
//! │  Flow: ValidationError ─┐                                              │
//! │        EngineError ─────┴─► GatewayError → ApiError → HTTP layer       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Every variant is detected without touching the engine, so returning one
/// guarantees that no work was submitted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: f64, max: f64 },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    Negative { field: String },

    /// Value must not be zero.
    #[error("{field} must not be zero")]
    Zero { field: String },

    /// Invalid format (whitespace in a code, NaN number, ...).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A document without lines cannot be created.
    #[error("document must contain at least one line")]
    EmptyDocument,

    /// A line carries both a unit price and a tax-included price.
    #[error("line {line}: set either unitPrice or taxIncludedPrice, not both")]
    AmbiguousPrice { line: usize },

    /// A line-level rule failed; wraps the underlying error with the line index.
    #[error("line {line}: {source}")]
    Line {
        line: usize,
        #[source]
        source: Box<ValidationError>,
    },
}

impl ValidationError {
    pub(crate) fn required(field: &str) -> Self {
        ValidationError::Required {
            field: field.to_string(),
        }
    }

    pub(crate) fn at_line(line: usize, source: ValidationError) -> Self {
        ValidationError::Line {
            line,
            source: Box::new(source),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_messages() {
        assert_eq!(ValidationError::required("itemId").to_string(), "itemId is required");
        assert_eq!(
            ValidationError::EmptyDocument.to_string(),
            "document must contain at least one line"
        );
        assert_eq!(
            ValidationError::AmbiguousPrice { line: 2 }.to_string(),
            "line 2: set either unitPrice or taxIncludedPrice, not both"
        );
    }

    #[test]
    fn test_line_error_wraps_source() {
        let err = ValidationError::at_line(1, ValidationError::required("itemId"));
        assert_eq!(err.to_string(), "line 1: itemId is required");
    }
}
