//! # Validation Module
//!
//! Shape and business-rule checks that run before a request is submitted
//! to the engine.
//!
//! ## Where Validation Sits
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP layer (external)                                        │
//! │  └── Deserialization, required fields                                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Empty documents, ambiguous prices                                 │
//! │  ├── Code formats, numeric ranges                                      │
//! │  └── Normalization: zero / empty → None                                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Engine                                                       │
//! │  └── Duplicate keys, unknown currencies, commit rules                  │
//! │                                                                         │
//! │  A request that fails here costs zero worker submissions.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::types::{
    DocumentKey, LineDraft, LinePrice, LineSpec, TaxRate, TransactionDraft, ValidatedDraft,
};
use crate::{MAX_CODE_LEN, MAX_DOCUMENT_NUMBER, MAX_LINE_PRICE_CENTS, MAX_LINE_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Codes and Keys
// =============================================================================

/// Validates a series or document type code.
///
/// ## Rules
/// - Must not be empty
/// - At most 20 characters
/// - No whitespace
///
/// ```rust
/// use salesgate_core::validation::validate_code;
///
/// assert!(validate_code("series", "A").is_ok());
/// assert!(validate_code("series", "").is_err());
/// assert!(validate_code("documentType", "F S").is_err());
/// ```
pub fn validate_code(field: &str, value: &str) -> ValidationResult<()> {
    if value.is_empty() {
        return Err(ValidationError::required(field));
    }

    if value.chars().count() > MAX_CODE_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_CODE_LEN,
        });
    }

    if value.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must not contain whitespace".to_string(),
        });
    }

    Ok(())
}

/// Validates a product code passed to `initialize`.
pub fn validate_product_code(code: &str) -> ValidationResult<()> {
    if code.trim().is_empty() {
        return Err(ValidationError::required("productCode"));
    }
    Ok(())
}

/// Validates a key used for `get` / `delete`.
///
/// Numbers need not be integral, but they must be finite, positive and
/// at most [`MAX_DOCUMENT_NUMBER`].
pub fn validate_key(key: &DocumentKey) -> ValidationResult<()> {
    validate_code("series", &key.series)?;
    validate_code("documentType", &key.document_type)?;

    document_number("number", key.number)?;
    if key.number <= 0.0 {
        return Err(ValidationError::OutOfRange {
            field: "number".to_string(),
            min: 1.0,
            max: MAX_DOCUMENT_NUMBER,
        });
    }

    Ok(())
}

/// Validates the number a reverse scan starts from. Zero is allowed and
/// scans nothing.
///
/// ```rust
/// use salesgate_core::validation::validate_scan_start;
///
/// assert!(validate_scan_start(0.0).is_ok());
/// assert!(validate_scan_start(120.0).is_ok());
/// assert!(validate_scan_start(f64::INFINITY).is_err());
/// assert!(validate_scan_start(1e17).is_err());
/// ```
pub fn validate_scan_start(start: f64) -> ValidationResult<()> {
    document_number("startNumber", start)
}

/// Validates listing pagination. Pages are 1-based.
pub fn validate_page(page: u32, page_size: u32, max_page_size: u32) -> ValidationResult<()> {
    if page == 0 {
        return Err(ValidationError::Zero {
            field: "page".to_string(),
        });
    }
    if page_size == 0 || page_size > max_page_size {
        return Err(ValidationError::OutOfRange {
            field: "pageSize".to_string(),
            min: 1.0,
            max: max_page_size as f64,
        });
    }
    Ok(())
}

// =============================================================================
// Drafts
// =============================================================================

/// Validates a whole draft and normalizes it for the assembler.
///
/// ## Checks, in order
/// 1. At least one line (`EmptyDocument`)
/// 2. Series / document type codes
/// 3. Explicit number finite, ≥ 0 (0 = allocate) and ≤ 2^53
/// 4. Party id finite and ≥ 0
/// 5. Global discount within 0..=100
/// 6. Every line (see [`validate_line`])
///
/// ```rust
/// use salesgate_core::money::Money;
/// use salesgate_core::types::{LineDraft, TransactionDraft};
/// use salesgate_core::validation::validate_draft;
///
/// let mut draft = TransactionDraft::default();
/// assert!(validate_draft(&draft).is_err());
///
/// draft.lines.push(LineDraft::new("X1", 2.0, Money::from_cents(5000)));
/// let validated = validate_draft(&draft).unwrap();
/// assert_eq!(validated.number, None);
/// ```
pub fn validate_draft(draft: &TransactionDraft) -> ValidationResult<ValidatedDraft> {
    if draft.lines.is_empty() {
        return Err(ValidationError::EmptyDocument);
    }

    let series = non_empty(draft.series.as_deref());
    if let Some(series) = &series {
        validate_code("series", series)?;
    }
    validate_code("documentType", &draft.document_type)?;

    document_number("number", draft.number)?;
    let number = optional_non_negative("number", draft.number)?;
    let party_id = optional_non_negative("partyId", draft.party_id)?;

    let discount = if draft.global_discount_percent == 0.0 {
        None
    } else {
        validate_percent("globalDiscountPercent", draft.global_discount_percent)?;
        Some(TaxRate::from_percentage(draft.global_discount_percent))
    };

    let lines = draft
        .lines
        .iter()
        .enumerate()
        .map(|(index, line)| validate_line(index + 1, line))
        .collect::<ValidationResult<Vec<_>>>()?;

    Ok(ValidatedDraft {
        series,
        document_type: draft.document_type.clone(),
        number,
        party_id,
        create_date: draft.create_date,
        currency_id: non_empty(draft.currency_id.as_deref()),
        comments: non_empty(draft.comments.as_deref()),
        tax_included: draft.tax_included,
        discount,
        lines,
    })
}

/// Validates one line. `line` is 1-based and only used in error messages.
///
/// ## Rules
/// - `itemId` required
/// - quantity finite, non-zero and within ±1 000 000 (negative quantities
///   are returns)
/// - prices non-negative and at most 1 000 000 000.00, at most one of them
///   non-zero
/// - tax percent within 0..=100
pub fn validate_line(line: usize, draft: &LineDraft) -> ValidationResult<LineSpec> {
    let at = |err| ValidationError::at_line(line, err);

    if draft.item_id.trim().is_empty() {
        return Err(at(ValidationError::required("itemId")));
    }

    if !draft.quantity.is_finite() {
        return Err(at(ValidationError::InvalidFormat {
            field: "quantity".to_string(),
            reason: "must be a finite number".to_string(),
        }));
    }
    if draft.quantity == 0.0 {
        return Err(at(ValidationError::Zero {
            field: "quantity".to_string(),
        }));
    }
    if draft.quantity.abs() > MAX_LINE_QUANTITY {
        return Err(at(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: -MAX_LINE_QUANTITY,
            max: MAX_LINE_QUANTITY,
        }));
    }

    if draft.unit_price.is_negative() {
        return Err(at(ValidationError::Negative {
            field: "unitPrice".to_string(),
        }));
    }
    if draft.tax_included_price.is_negative() {
        return Err(at(ValidationError::Negative {
            field: "taxIncludedPrice".to_string(),
        }));
    }

    for (field, price) in [
        ("unitPrice", draft.unit_price),
        ("taxIncludedPrice", draft.tax_included_price),
    ] {
        if price.cents() > MAX_LINE_PRICE_CENTS {
            return Err(at(ValidationError::OutOfRange {
                field: field.to_string(),
                min: 0.0,
                max: MAX_LINE_PRICE_CENTS as f64 / 100.0,
            }));
        }
    }

    let price = line_price(line, draft)?;
    validate_percent("taxPercent", draft.tax_percent).map_err(at)?;

    Ok(LineSpec {
        item_id: draft.item_id.trim().to_string(),
        description: non_empty(draft.description.as_deref()),
        quantity: draft.quantity,
        price,
        tax_rate: TaxRate::from_percentage(draft.tax_percent),
        unit_of_sale: non_empty(draft.unit_of_sale.as_deref()),
        warehouse_id: draft.warehouse_id,
        color_id: (draft.color_id != 0).then_some(draft.color_id),
        size_id: (draft.size_id != 0).then_some(draft.size_id),
        property_value: non_empty(draft.property_value.as_deref()),
    })
}

/// Picks the one price a line is built with.
///
/// Both zero is a free line; both non-zero is ambiguous.
pub fn line_price(line: usize, draft: &LineDraft) -> ValidationResult<LinePrice> {
    match (draft.unit_price.is_zero(), draft.tax_included_price.is_zero()) {
        (true, true) => Ok(LinePrice::Free),
        (false, true) => Ok(LinePrice::Unit(draft.unit_price)),
        (true, false) => Ok(LinePrice::TaxIncluded(draft.tax_included_price)),
        (false, false) => Err(ValidationError::AmbiguousPrice { line }),
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Finite, non-negative and small enough to step through one by one.
fn document_number(field: &str, value: f64) -> ValidationResult<()> {
    if !value.is_finite() {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must be a finite number".to_string(),
        });
    }
    if !(0.0..=MAX_DOCUMENT_NUMBER).contains(&value) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0.0,
            max: MAX_DOCUMENT_NUMBER,
        });
    }
    Ok(())
}

fn optional_non_negative(field: &str, value: f64) -> ValidationResult<Option<f64>> {
    if !value.is_finite() {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must be a finite number".to_string(),
        });
    }
    if value < 0.0 {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }
    Ok((value > 0.0).then_some(value))
}

fn validate_percent(field: &str, value: f64) -> ValidationResult<()> {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0.0,
            max: 100.0,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
