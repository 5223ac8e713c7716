//! # Engine Contract
//!
//! The calls the gateway is allowed to make against one live engine
//! session.
//!
//! ## Call Groups
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         SalesEngine                                     │
//! │                                                                         │
//! │  Session        initialize ─► SystemSnapshot       terminate           │
//! │                                                                         │
//! │  Lookups        document_kind   is_known_document   currency           │
//! │                 party_name                                              │
//! │                                                                         │
//! │  Probing        last_number(kind, series, type)                        │
//! │                 exists(kind, key)          ← one key at a time, no     │
//! │                 load(kind, key, suspended)    range or list query      │
//! │                                                                         │
//! │  Drafting       open_draft ─► set_header ─► set_party ─► add_line ×N   │
//! │                 ─► set_discount_percent ─► calculate ─► save           │
//! │                 discard_draft (any time, idempotent)                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! At most one draft is open per engine at a time. The drafting calls are
//! only meaningful as one uninterrupted sequence, which is why the gateway
//! runs them inside a single worker submission.

use chrono::NaiveDate;

use salesgate_core::{
    Currency, DocumentKey, DocumentKind, DocumentTotals, LineSpec, PersistedTransaction,
    SessionSettings, SystemSnapshot,
};

use crate::error::EngineResult;

// =============================================================================
// Draft Header
// =============================================================================

/// Header fields written onto an open draft.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftHeader {
    pub number: f64,
    pub create_date: NaiveDate,
    pub comments: String,
    pub tax_included: bool,
    pub currency: Currency,
}

// =============================================================================
// Engine Trait
// =============================================================================

/// One live session of the external engine.
///
/// Not `Send`: an implementation may hold thread-bound handles. Everything
/// takes `&mut self` because every call mutates engine-side state, even
/// reads (cursors, caches, the open draft).
pub trait SalesEngine {
    /// Opens the engine session for a company.
    fn initialize(&mut self, settings: &SessionSettings) -> EngineResult<SystemSnapshot>;

    /// Closes the engine session. Best-effort; callers ignore the outcome
    /// beyond logging it.
    fn terminate(&mut self) -> EngineResult<()>;

    /// Maps a document type code to its transactional domain.
    /// Unknown codes map to [`DocumentKind::Sale`].
    fn document_kind(&mut self, document_type: &str) -> DocumentKind;

    /// Whether the document type exists in the company's configuration.
    fn is_known_document(&mut self, document_type: &str) -> bool;

    /// Highest number used so far for `(kind, series, document_type)`,
    /// `0.0` when none.
    fn last_number(
        &mut self,
        kind: DocumentKind,
        series: &str,
        document_type: &str,
    ) -> EngineResult<f64>;

    /// Existence probe for a single key.
    fn exists(&mut self, kind: DocumentKind, key: &DocumentKey) -> EngineResult<bool>;

    /// Full load, including lines. `suspended` targets the suspended
    /// (parked) variant of the document.
    fn load(
        &mut self,
        kind: DocumentKind,
        key: &DocumentKey,
        suspended: bool,
    ) -> EngineResult<PersistedTransaction>;

    /// Display name of a party, `None` when the party is unknown.
    fn party_name(&mut self, party_id: f64) -> EngineResult<Option<String>>;

    /// Currency lookup by id.
    fn currency(&mut self, currency_id: &str) -> EngineResult<Option<Currency>>;

    /// Opens a new, empty draft. Replaces any draft left open.
    fn open_draft(&mut self, kind: DocumentKind, series: &str, document_type: &str)
        -> EngineResult<()>;

    fn set_header(&mut self, header: &DraftHeader) -> EngineResult<()>;

    fn set_party(&mut self, party_id: f64) -> EngineResult<()>;

    fn add_line(&mut self, line: &LineSpec) -> EngineResult<()>;

    /// Global (payment) discount, in percent.
    fn set_discount_percent(&mut self, percent: f64) -> EngineResult<()>;

    /// Prices the open draft. Must run before `save`.
    fn calculate(&mut self) -> EngineResult<DocumentTotals>;

    /// Commits the open draft. `Ok(false)` means the engine declined
    /// without raising.
    fn save(&mut self) -> EngineResult<bool>;

    /// Drops the open draft, if any.
    fn discard_draft(&mut self);
}

// =============================================================================
// Factory
// =============================================================================

/// Opens engines. Shared across threads; the engine it returns is not.
///
/// `open` is always called on the thread that will own the engine.
pub trait EngineFactory: Send + Sync {
    fn open(&self) -> EngineResult<Box<dyn SalesEngine>>;
}
