//! # Domain Types
//!
//! Core domain types for the sales gateway.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Domain Type Hierarchy                            │
//! │                                                                         │
//! │  Write side (request → engine)        Read side (engine → caller)       │
//! │  ─────────────────────────────        ───────────────────────────       │
//! │  TransactionDraft                     PersistedTransaction              │
//! │    └── LineDraft ×N                     ├── DocumentKey                 │
//! │          │ validation                   ├── DocumentTotals              │
//! │          ▼                              └── PersistedLine ×N            │
//! │  ValidatedDraft                                                         │
//! │    └── LineSpec ×N  (LinePrice)       DocumentSummary (listing row)     │
//! │                                        CreatedDocument (create echo)    │
//! │                                        DeletionReport                   │
//! │                                                                         │
//! │  Session records: SessionSettings, SystemSnapshot, CompanyInfo,         │
//! │                   Currency                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Composite Identity
//! The engine has no surrogate ids. A document is addressed only by
//! `(series, document type, number)`, and the number is a float in the
//! engine's object model, so `DocumentKey::number` is an `f64`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::Money;
use crate::DEFAULT_DOCUMENT_TYPE;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01%, so 2300 bps = 23%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a tax rate from a percentage, as requests carry it.
    pub fn from_percentage(pct: f64) -> Self {
        TaxRate((pct * 100.0).round().max(0.0) as u32)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage.
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

// =============================================================================
// Document Kind
// =============================================================================

/// The transactional domain a document type belongs to.
///
/// Numbering and loads are scoped per kind: the same series/type/number
/// triple in the sales domain and the purchase domain are different
/// documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DocumentKind {
    #[default]
    Sale,
    Purchase,
    Stock,
    Other,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::Sale => write!(f, "sale"),
            DocumentKind::Purchase => write!(f, "purchase"),
            DocumentKind::Stock => write!(f, "stock"),
            DocumentKind::Other => write!(f, "other"),
        }
    }
}

// =============================================================================
// Document Key
// =============================================================================

/// Composite identity of a document: `(series, documentType, number)`.
///
/// Immutable once assigned by a successful save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentKey {
    pub series: String,
    pub document_type: String,
    pub number: f64,
}

impl DocumentKey {
    pub fn new(series: impl Into<String>, document_type: impl Into<String>, number: f64) -> Self {
        DocumentKey {
            series: series.into(),
            document_type: document_type.into(),
            number,
        }
    }

    /// Same series and type, different number. Used while scanning.
    pub fn with_number(&self, number: f64) -> Self {
        DocumentKey {
            series: self.series.clone(),
            document_type: self.document_type.clone(),
            number,
        }
    }

    /// Human-readable id, `"A-FS-12"`.
    pub fn transaction_id(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.series, self.document_type, self.number)
    }
}

// =============================================================================
// Session Records
// =============================================================================

/// Arguments a session was opened with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSettings {
    pub product_code: String,
    pub company_id: String,
    pub debug_mode: bool,
}

impl SessionSettings {
    pub fn new(product_code: impl Into<String>, company_id: impl Into<String>, debug_mode: bool) -> Self {
        SessionSettings {
            product_code: product_code.into(),
            company_id: company_id.into(),
            debug_mode,
        }
    }
}

/// Company the session is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyInfo {
    pub id: String,
    pub name: String,
    pub address: String,
    pub phone: String,
    pub fax: String,
    pub email: String,
}

/// A currency known to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Currency {
    pub id: String,
    pub name: String,
}

impl Currency {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Currency {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// What the engine reports right after a successful initialize.
///
/// Cached by the session so status reads never reach the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemSnapshot {
    pub company: CompanyInfo,
    pub user_name: String,
    pub base_currency: Currency,
    /// Series flagged as the external default, when the company has one.
    pub default_series: Option<String>,
}

// =============================================================================
// Write Side: Drafts
// =============================================================================

/// Inbound request to create a document.
///
/// Zero means "not provided" for `number`, `party_id` and
/// `global_discount_percent`, as in the engine's own object model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDraft {
    #[serde(default)]
    pub series: Option<String>,

    #[serde(default = "default_document_type")]
    pub document_type: String,

    /// Explicit number, or 0 to allocate the next one.
    #[serde(default)]
    pub number: f64,

    #[serde(default)]
    pub party_id: f64,

    #[serde(default)]
    pub create_date: Option<NaiveDate>,

    #[serde(default)]
    pub currency_id: Option<String>,

    #[serde(default)]
    pub comments: Option<String>,

    #[serde(default = "default_true")]
    pub tax_included: bool,

    #[serde(default)]
    pub global_discount_percent: f64,

    #[serde(default)]
    pub lines: Vec<LineDraft>,
}

fn default_document_type() -> String {
    DEFAULT_DOCUMENT_TYPE.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for TransactionDraft {
    fn default() -> Self {
        TransactionDraft {
            series: None,
            document_type: default_document_type(),
            number: 0.0,
            party_id: 0.0,
            create_date: None,
            currency_id: None,
            comments: None,
            tax_included: true,
            global_discount_percent: 0.0,
            lines: Vec::new(),
        }
    }
}

/// One requested line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineDraft {
    pub item_id: String,

    #[serde(default)]
    pub description: Option<String>,

    pub quantity: f64,

    /// Net unit price. Mutually exclusive with `tax_included_price`.
    #[serde(default)]
    pub unit_price: Money,

    /// Gross unit price. Mutually exclusive with `unit_price`.
    #[serde(default)]
    pub tax_included_price: Money,

    #[serde(default)]
    pub unit_of_sale: Option<String>,

    #[serde(default)]
    pub warehouse_id: i16,

    #[serde(default)]
    pub tax_percent: f64,

    #[serde(default)]
    pub color_id: i16,

    #[serde(default)]
    pub size_id: i16,

    #[serde(default)]
    pub property_value: Option<String>,
}

impl LineDraft {
    /// A minimal line: item, quantity and net unit price.
    pub fn new(item_id: impl Into<String>, quantity: f64, unit_price: Money) -> Self {
        LineDraft {
            item_id: item_id.into(),
            description: None,
            quantity,
            unit_price,
            tax_included_price: Money::zero(),
            unit_of_sale: None,
            warehouse_id: 0,
            tax_percent: 0.0,
            color_id: 0,
            size_id: 0,
            property_value: None,
        }
    }
}

/// The single price a line is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "amount")]
pub enum LinePrice {
    /// Net unit price.
    Unit(Money),
    /// Gross unit price; the engine extracts the tax.
    TaxIncluded(Money),
    /// Neither price given.
    Free,
}

/// A line that passed validation. Optional overrides are `None` when the
/// request left them empty or zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineSpec {
    pub item_id: String,
    pub description: Option<String>,
    pub quantity: f64,
    pub price: LinePrice,
    pub tax_rate: TaxRate,
    pub unit_of_sale: Option<String>,
    pub warehouse_id: i16,
    pub color_id: Option<i16>,
    pub size_id: Option<i16>,
    pub property_value: Option<String>,
}

/// A draft that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedDraft {
    pub series: Option<String>,
    pub document_type: String,
    pub number: Option<f64>,
    pub party_id: Option<f64>,
    pub create_date: Option<NaiveDate>,
    pub currency_id: Option<String>,
    pub comments: Option<String>,
    pub tax_included: bool,
    /// Global discount in basis points, `None` when zero.
    pub discount: Option<TaxRate>,
    pub lines: Vec<LineSpec>,
}

// =============================================================================
// Read Side
// =============================================================================

/// Totals as computed by the engine's calculation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentTotals {
    pub net: Money,
    pub tax: Money,
    pub gross: Money,
}

/// One line of a persisted document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedLine {
    pub line_number: u32,
    pub item_id: String,
    pub description: String,
    pub quantity: f64,
    /// Net unit price after tax extraction.
    pub unit_price: Money,
    pub tax_rate: TaxRate,
    /// Net line amount after the global discount.
    pub line_total: Money,
    pub unit_of_sale: Option<String>,
    pub warehouse_id: i16,
    pub color_id: Option<i16>,
    pub size_id: Option<i16>,
    pub property_value: Option<String>,
}

/// Snapshot of a document as read from the engine. Never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedTransaction {
    pub key: DocumentKey,
    pub transaction_id: String,
    pub party_id: f64,
    pub create_date: NaiveDate,
    pub currency_id: String,
    pub comments: String,
    pub tax_included: bool,
    pub global_discount_percent: f64,
    pub totals: DocumentTotals,
    pub lines: Vec<PersistedLine>,
}

impl PersistedTransaction {
    /// Identity plus defaults, for when a document exists but cannot be loaded.
    pub fn minimal(key: DocumentKey, currency_id: impl Into<String>, create_date: NaiveDate) -> Self {
        PersistedTransaction {
            transaction_id: key.transaction_id(),
            key,
            party_id: 0.0,
            create_date,
            currency_id: currency_id.into(),
            comments: String::new(),
            tax_included: true,
            global_discount_percent: 0.0,
            totals: DocumentTotals::default(),
            lines: Vec::new(),
        }
    }
}

/// Whether a read result is fully hydrated or identity-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LoadStatus {
    Loaded,
    Partial,
}

/// Result of `get`: the document plus how much of it could be read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchedDocument {
    pub status: LoadStatus,
    pub document: PersistedTransaction,
}

/// One row of a recent-documents listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub key: DocumentKey,
    pub transaction_id: String,
    pub party_id: f64,
    pub party_name: String,
    pub create_date: NaiveDate,
    /// Net amount, before tax.
    pub total_amount: Money,
    pub currency_id: String,
    pub status: LoadStatus,
}

impl DocumentSummary {
    pub fn from_transaction(doc: &PersistedTransaction, party_name: String) -> Self {
        DocumentSummary {
            key: doc.key.clone(),
            transaction_id: doc.transaction_id.clone(),
            party_id: doc.party_id,
            party_name,
            create_date: doc.create_date,
            total_amount: doc.totals.net,
            currency_id: doc.currency_id.clone(),
            status: LoadStatus::Loaded,
        }
    }

    pub fn partial(key: DocumentKey, currency_id: impl Into<String>, create_date: NaiveDate) -> Self {
        DocumentSummary {
            transaction_id: key.transaction_id(),
            key,
            party_id: 0.0,
            party_name: String::new(),
            create_date,
            total_amount: Money::zero(),
            currency_id: currency_id.into(),
            status: LoadStatus::Partial,
        }
    }
}

/// What `create` echoes back after a successful save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedDocument {
    pub key: DocumentKey,
    pub transaction_id: String,
    pub party_id: f64,
    pub create_date: NaiveDate,
    pub currency_id: String,
    pub comments: String,
    pub tax_included: bool,
    pub totals: DocumentTotals,
    pub line_count: usize,
}

/// How a delete request was carried out.
///
/// The engine's delete path is unsafe, so deletion is only ever simulated.
/// The variant is serialized so callers can tell it apart from a real one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeletionOutcome {
    SimulatedDeletion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionReport {
    pub key: DocumentKey,
    pub outcome: DeletionOutcome,
    pub message: String,
}

// =============================================================================
// Unit Tests
// =============================================================================
