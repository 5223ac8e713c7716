//! # Transaction Assembler
//!
//! Builds, reads and (simulated) deletes documents through the engine's
//! draft API.
//!
//! ## Create Flow (one worker submission)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  validate_draft (caller's task, no engine)                              │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  engine thread ─────────────────────────────────────────────────────┐  │
//! │  │ series   = request │ engine default │ "A"                         │  │
//! │  │ currency = request (must exist) │ session base currency           │  │
//! │  │ number   = request │ last_number + 1                              │  │
//! │  │                                                                   │  │
//! │  │ open_draft → header → party → lines → discount → calculate → save │  │
//! │  │      │                                                            │  │
//! │  │      └─ any failure, or save == false: discard_draft              │  │
//! │  └───────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Allocating the number and saving run inside the same submission, so no
//! other gateway call can interleave between them. Writers outside this
//! process can, and then the save fails with `NumberConflict`.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};

use salesgate_core::validation::{validate_draft, validate_key};
use salesgate_core::{
    CreatedDocument, DeletionOutcome, DeletionReport, DocumentKey, DocumentKind, DocumentTotals,
    FetchedDocument, LoadStatus, PersistedTransaction, SystemSnapshot, TransactionDraft,
    ValidatedDraft, DEFAULT_COMMENTS, DEFAULT_SERIES,
};
use salesgate_engine::{DraftHeader, EngineResult, SalesEngine};

use crate::error::{GatewayError, GatewayResult};
use crate::numbering::next_after;
use crate::session::SessionManager;

/// Document reads and writes over the session's engine.
pub struct TransactionAssembler {
    session: Arc<SessionManager>,
}

impl TransactionAssembler {
    pub fn new(session: Arc<SessionManager>) -> Self {
        TransactionAssembler { session }
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Validates and persists a new document.
    ///
    /// Invalid drafts are rejected before anything reaches the engine.
    pub async fn create(&self, draft: TransactionDraft) -> GatewayResult<CreatedDocument> {
        let draft = validate_draft(&draft)?;
        let today = Utc::now().date_naive();

        self.session
            .execute("create", move |engine, snapshot| {
                assemble(engine, snapshot, draft, today)
            })
            .await?
    }

    // =========================================================================
    // Get
    // =========================================================================

    /// Probes, then loads. A document that exists but cannot be loaded comes
    /// back `Partial`: identity plus defaults.
    pub async fn get(&self, key: DocumentKey, suspended: bool) -> GatewayResult<FetchedDocument> {
        validate_key(&key)?;
        let today = Utc::now().date_naive();

        self.session
            .execute("get", move |engine, snapshot| -> GatewayResult<FetchedDocument> {
                let kind = engine.document_kind(&key.document_type);
                require_existing(engine, kind, &key, "get")?;

                match engine.load(kind, &key, suspended) {
                    Ok(document) => Ok(FetchedDocument {
                        status: LoadStatus::Loaded,
                        document,
                    }),
                    Err(e) => {
                        warn!(key = %key, error = %e, "document exists but failed to load");
                        let document =
                            PersistedTransaction::minimal(key, snapshot.base_currency.id.clone(), today);
                        Ok(FetchedDocument {
                            status: LoadStatus::Partial,
                            document,
                        })
                    }
                }
            })
            .await?
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Confirms the document exists and reports a simulated deletion.
    /// Nothing is removed from the engine.
    pub async fn delete(&self, key: DocumentKey) -> GatewayResult<DeletionReport> {
        validate_key(&key)?;

        self.session
            .execute("delete", move |engine, _| -> GatewayResult<DeletionReport> {
                let kind = engine.document_kind(&key.document_type);
                require_existing(engine, kind, &key, "delete")?;

                warn!(key = %key, "delete requested; engine deletion is disabled, simulating");
                let message = format!(
                    "Document {} exists. Deletion was simulated; the document was not removed.",
                    key
                );
                Ok(DeletionReport {
                    key,
                    outcome: DeletionOutcome::SimulatedDeletion,
                    message,
                })
            })
            .await?
    }
}

// =============================================================================
// Engine-Thread Helpers
// =============================================================================

fn require_existing(
    engine: &mut dyn SalesEngine,
    kind: DocumentKind,
    key: &DocumentKey,
    operation: &str,
) -> GatewayResult<()> {
    let exists = engine
        .exists(kind, key)
        .map_err(|e| GatewayError::from_engine(operation, Some(key), e))?;
    if exists {
        Ok(())
    } else {
        debug!(key = %key, operation, "document not found");
        Err(GatewayError::NotFound { key: key.clone() })
    }
}

fn assemble(
    engine: &mut dyn SalesEngine,
    snapshot: &SystemSnapshot,
    draft: ValidatedDraft,
    today: NaiveDate,
) -> GatewayResult<CreatedDocument> {
    let series = draft
        .series
        .clone()
        .or_else(|| snapshot.default_series.clone())
        .unwrap_or_else(|| DEFAULT_SERIES.to_string());
    let document_type = draft.document_type.clone();
    let kind = engine.document_kind(&document_type);

    let currency = match &draft.currency_id {
        Some(currency_id) => engine
            .currency(currency_id)
            .map_err(|e| GatewayError::from_engine("create", None, e))?
            .ok_or_else(|| GatewayError::CurrencyNotFound {
                currency_id: currency_id.clone(),
            })?,
        None => snapshot.base_currency.clone(),
    };

    let number = match draft.number {
        Some(number) => number,
        None => engine
            .last_number(kind, &series, &document_type)
            .map(next_after)
            .map_err(|e| GatewayError::from_engine("create", None, e))?,
    };
    let key = DocumentKey::new(series, document_type, number);

    let header = DraftHeader {
        number,
        create_date: draft.create_date.unwrap_or(today),
        comments: draft
            .comments
            .clone()
            .unwrap_or_else(|| DEFAULT_COMMENTS.to_string()),
        tax_included: draft.tax_included,
        currency,
    };

    engine
        .open_draft(kind, &key.series, &key.document_type)
        .map_err(|e| GatewayError::from_engine("create", Some(&key), e))?;

    match fill_and_save(engine, &draft, &header) {
        Ok(Some(totals)) => {
            info!(key = %key, lines = draft.lines.len(), net = %totals.net, "document created");
            Ok(CreatedDocument {
                transaction_id: key.transaction_id(),
                key,
                party_id: draft.party_id.unwrap_or(0.0),
                create_date: header.create_date,
                currency_id: header.currency.id,
                comments: header.comments,
                tax_included: header.tax_included,
                totals,
                line_count: draft.lines.len(),
            })
        }
        Ok(None) => {
            engine.discard_draft();
            warn!(key = %key, "engine declined to save; draft discarded");
            Err(GatewayError::PersistFailure { key })
        }
        Err(e) => {
            engine.discard_draft();
            Err(GatewayError::from_engine("create", Some(&key), e))
        }
    }
}

/// Populates the open draft and commits it. `None` when the engine declines.
fn fill_and_save(
    engine: &mut dyn SalesEngine,
    draft: &ValidatedDraft,
    header: &DraftHeader,
) -> EngineResult<Option<DocumentTotals>> {
    engine.set_header(header)?;
    if let Some(party_id) = draft.party_id {
        engine.set_party(party_id)?;
    }
    for line in &draft.lines {
        engine.add_line(line)?;
    }
    if let Some(discount) = draft.discount {
        engine.set_discount_percent(discount.percentage())?;
    }

    let totals = engine.calculate()?;
    Ok(engine.save()?.then_some(totals))
}
