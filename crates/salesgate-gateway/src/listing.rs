//! # Recent Documents
//!
//! Lists the most recent documents of a series and type by reverse scan.
//!
//! ```text
//! last_number ──► reverse scan (window, max results) ──► load each hit
//!                                                           │
//!        load failed? → Partial summary (identity only)     │
//!                                                           ▼
//!                          sort by date desc, number desc ──► page
//! ```
//!
//! Pagination applies to the collected set only. A page beyond it is
//! empty; the scan is never widened to fill it.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use salesgate_core::validation::{validate_code, validate_page};
use salesgate_core::{DocumentKey, DocumentKind, DocumentSummary, SystemSnapshot};
use salesgate_engine::SalesEngine;

use crate::config::ListingSettings;
use crate::error::{GatewayError, GatewayResult};
use crate::numbering::{scan_engine, ScanReport, ScanWindow};
use crate::session::SessionManager;

/// Listing request. Omitted fields fall back to `ListingSettings`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default)]
    pub document_type: Option<String>,
    #[serde(default)]
    pub series: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub page_size: Option<u32>,
}

impl ListQuery {
    pub fn new(document_type: impl Into<String>, series: impl Into<String>) -> Self {
        ListQuery {
            document_type: Some(document_type.into()),
            series: Some(series.into()),
            page: None,
            page_size: None,
        }
    }

    pub fn page(mut self, page: u32, page_size: u32) -> Self {
        self.page = Some(page);
        self.page_size = Some(page_size);
        self
    }
}

/// One page of recent documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentDocuments {
    pub entries: Vec<DocumentSummary>,
    pub page: u32,
    pub page_size: u32,
    /// Size of the collected set before paging.
    pub total_collected: usize,
    /// `None` when the document type is unknown and nothing was scanned.
    pub scan: Option<ScanReport>,
}

pub struct RecentListing {
    session: Arc<SessionManager>,
    settings: ListingSettings,
}

impl RecentListing {
    pub fn new(session: Arc<SessionManager>, settings: ListingSettings) -> Self {
        RecentListing { session, settings }
    }

    pub async fn list_recent(&self, query: ListQuery) -> GatewayResult<RecentDocuments> {
        let document_type = non_empty(query.document_type)
            .unwrap_or_else(|| self.settings.default_document_type.clone());
        let series = non_empty(query.series).unwrap_or_else(|| self.settings.default_series.clone());
        let page = query.page.unwrap_or(1);
        let page_size = query.page_size.unwrap_or(self.settings.default_page_size);

        validate_code("documentType", &document_type)?;
        validate_code("series", &series)?;
        validate_page(page, page_size, self.settings.max_page_size)?;

        let window_size = self.settings.window_size;
        let max_results = self.settings.max_results;
        let today = Utc::now().date_naive();

        let (mut entries, scan) = self
            .session
            .execute("list_recent", move |engine, snapshot| {
                collect(engine, snapshot, series, document_type, window_size, max_results, today)
            })
            .await??;

        entries.sort_by(|a, b| {
            b.create_date
                .cmp(&a.create_date)
                .then_with(|| b.key.number.total_cmp(&a.key.number))
        });

        let total_collected = entries.len();
        let skip = (page as usize - 1).saturating_mul(page_size as usize);
        let entries: Vec<_> = entries.into_iter().skip(skip).take(page_size as usize).collect();

        debug!(total_collected, page, returned = entries.len(), "listing page built");
        Ok(RecentDocuments {
            entries,
            page,
            page_size,
            total_collected,
            scan,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Runs on the engine thread: scan, then summarize each hit.
fn collect(
    engine: &mut dyn SalesEngine,
    snapshot: &SystemSnapshot,
    series: String,
    document_type: String,
    window_size: u32,
    max_results: u32,
    today: NaiveDate,
) -> GatewayResult<(Vec<DocumentSummary>, Option<ScanReport>)> {
    if !engine.is_known_document(&document_type) {
        warn!(document_type = %document_type, "unknown document type; returning an empty listing");
        return Ok((Vec::new(), None));
    }

    let kind = engine.document_kind(&document_type);
    let last = engine
        .last_number(kind, &series, &document_type)
        .map_err(|e| GatewayError::from_engine("list_recent", None, e))?;

    let base = DocumentKey::new(series, document_type, last);
    let window = ScanWindow::new(last, window_size, max_results);
    let outcome = scan_engine(engine, kind, &base, &window);

    let entries = outcome
        .hits
        .iter()
        .map(|number| summarize(engine, kind, base.with_number(*number), snapshot, today))
        .collect();

    Ok((entries, Some(outcome.report)))
}

fn summarize(
    engine: &mut dyn SalesEngine,
    kind: DocumentKind,
    key: DocumentKey,
    snapshot: &SystemSnapshot,
    today: NaiveDate,
) -> DocumentSummary {
    match engine.load(kind, &key, false) {
        Ok(document) => {
            let party_name = if document.party_id > 0.0 {
                engine
                    .party_name(document.party_id)
                    .unwrap_or_else(|e| {
                        warn!(key = %key, error = %e, "party lookup failed");
                        None
                    })
                    .unwrap_or_default()
            } else {
                String::new()
            };
            DocumentSummary::from_transaction(&document, party_name)
        }
        Err(e) => {
            warn!(key = %key, error = %e, "failed to load listed document; returning identity only");
            DocumentSummary::partial(key, snapshot.base_currency.id.clone(), today)
        }
    }
}
