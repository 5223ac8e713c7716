//! # salesgate-core: Pure Domain Types for the Sales Gateway
//!
//! Everything the gateway knows about sales documents, without knowing
//! anything about the engine that stores them.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Salesgate Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 HTTP layer (not part of this repo)              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ ApiResponse<T>                         │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │   salesgate-gateway: session, affinity worker, numbering,       │   │
//! │  │   transaction assembler, facade                                 │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ salesgate-core (THIS CRATE) ★                   │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐                  │   │
//! │  │   │   types   │  │   money   │  │ validation│                  │   │
//! │  │   │ Document  │  │   Money   │  │   draft   │                  │   │
//! │  │   │ Key/Draft │  │  TaxRate  │  │   rules   │                  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘                  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO ENGINE • PURE FUNCTIONS                           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │        salesgate-engine: SalesEngine trait + memory engine      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Document keys, drafts, read models, session records
//! - [`money`] - Money type with integer arithmetic
//! - [`error`] - Validation error type
//! - [`validation`] - Draft and key validation, run before any engine call
//!
//! ## Example Usage
//!
//! ```rust
//! use salesgate_core::money::Money;
//! use salesgate_core::types::{DocumentKey, TaxRate};
//!
//! let key = DocumentKey::new("A", "FS", 12.0);
//! assert_eq!(key.transaction_id(), "A-FS-12");
//!
//! let net = Money::from_cents(10000);
//! assert_eq!(net.calculate_tax(TaxRate::from_percentage(23.0)).cents(), 2300);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::ValidationError;
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Series used when neither the request nor the engine names one.
pub const DEFAULT_SERIES: &str = "A";

/// Document type used when the request does not name one (simplified invoice).
pub const DEFAULT_DOCUMENT_TYPE: &str = "FS";

/// Comment written on documents created without one.
pub const DEFAULT_COMMENTS: &str = "Created via gateway";

/// Product codes the engine is known to accept at initialization.
///
/// Unknown codes are still passed through; the engine is the authority.
pub const KNOWN_PRODUCT_CODES: [&str; 5] = ["Sage 50c", "CRTL", "CGCO", "Sage50c", "50c"];

/// Maximum length of a series or document type code.
pub const MAX_CODE_LEN: usize = 20;

/// Largest document number accepted (2^53). Above it an `f64` can no longer
/// tell `n` from `n - 1`.
pub const MAX_DOCUMENT_NUMBER: f64 = 9_007_199_254_740_992.0;

/// Largest absolute line quantity.
pub const MAX_LINE_QUANTITY: f64 = 1_000_000.0;

/// Largest unit or tax-included line price, in cents (1 000 000 000.00).
pub const MAX_LINE_PRICE_CENTS: i64 = 100_000_000_000;

/// Returns the known product codes, in catalogue order.
pub fn available_products() -> Vec<String> {
    KNOWN_PRODUCT_CODES.iter().map(|p| p.to_string()).collect()
}
