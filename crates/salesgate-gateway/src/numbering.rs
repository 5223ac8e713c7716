//! # Document Numbering
//!
//! Next-number allocation and the bounded reverse scan.
//!
//! The engine exposes no enumeration of documents, only "last number" and
//! "does this key exist". Recent documents are found by walking down from
//! the last number and probing each one.
//!
//! ## Reverse Scan
//! ```text
//! start = 120, window_size = 20, max_results = 3
//!
//!   probe:  120  119  118  117  116  ...  100
//!           hit  miss ERR  hit  hit       (never reached)
//!                      │              │
//!                      └ logged,      └ stop: 3 hits
//!                        counted as a miss
//!
//! hits (descending): [120, 117, 116]
//! ```
//!
//! Numbers are `f64` because the engine models them that way. The walk is
//! driven by an integer step count, so it always ends after at most
//! `window_size + 1` checks and never visits the same number twice.

use std::fmt::Display;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use salesgate_core::validation::{validate_code, validate_scan_start};
use salesgate_core::{DocumentKey, DocumentKind};
use salesgate_engine::SalesEngine;

use crate::error::{GatewayError, GatewayResult};
use crate::session::SessionManager;

// =============================================================================
// Pure Numbering Rules
// =============================================================================

/// The number a new document receives: one past the last, never below 1.
///
/// ```rust
/// use salesgate_gateway::numbering::next_after;
///
/// assert_eq!(next_after(41.0), 42.0);
/// assert_eq!(next_after(0.0), 1.0);
/// assert_eq!(next_after(-3.0), 1.0);
/// ```
pub fn next_after(last: f64) -> f64 {
    last.max(0.0) + 1.0
}

/// Bounds of one reverse scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanWindow {
    pub start: f64,
    pub window_size: u32,
    pub max_results: u32,
}

impl ScanWindow {
    pub fn new(start: f64, window_size: u32, max_results: u32) -> Self {
        ScanWindow {
            start,
            window_size,
            max_results,
        }
    }

    /// Lowest number probed, inclusive.
    pub fn lower_bound(&self) -> f64 {
        (self.start - f64::from(self.window_size)).max(1.0)
    }
}

/// What a scan did, for the caller and the logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub start_number: f64,
    pub lower_bound: f64,
    pub window_size: u32,
    pub max_results: u32,
    pub probed: u32,
    pub probe_failures: u32,
}

/// Hits in descending order, plus the report.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOutcome {
    pub hits: Vec<f64>,
    pub report: ScanReport,
}

/// Walks down from `window.start` to `window.lower_bound()` and collects
/// the numbers `probe` says exist.
///
/// A probe error is logged and counted, then treated as "does not exist";
/// the scan continues. Stops early after `max_results` hits.
///
/// Very large starts where `n - 1.0 == n` still terminate: the number
/// repeats, is skipped, and the step count runs out.
pub fn reverse_scan_with<E, P>(window: &ScanWindow, mut probe: P) -> ScanOutcome
where
    E: Display,
    P: FnMut(f64) -> Result<bool, E>,
{
    let lower_bound = window.lower_bound();
    let limit = window.max_results as usize;
    let mut hits = Vec::new();
    let mut probed = 0u32;
    let mut probe_failures = 0u32;

    let steps = if window.start >= lower_bound {
        (window.start - lower_bound) as u64 + 1
    } else {
        0
    };

    let mut previous = None;
    for step in 0..steps {
        if hits.len() >= limit {
            break;
        }
        let number = window.start - step as f64;
        if previous == Some(number) {
            continue;
        }
        previous = Some(number);

        probed += 1;
        match probe(number) {
            Ok(true) => hits.push(number),
            Ok(false) => {}
            Err(e) => {
                probe_failures += 1;
                warn!(number, error = %e, "existence probe failed; treating as missing");
            }
        }
    }

    debug!(
        start = window.start,
        lower_bound,
        probed,
        hits = hits.len(),
        "reverse scan finished"
    );

    ScanOutcome {
        hits,
        report: ScanReport {
            start_number: window.start,
            lower_bound,
            window_size: window.window_size,
            max_results: window.max_results,
            probed,
            probe_failures,
        },
    }
}

/// Runs a reverse scan against the engine for `base`'s series and type.
pub(crate) fn scan_engine(
    engine: &mut dyn SalesEngine,
    kind: DocumentKind,
    base: &DocumentKey,
    window: &ScanWindow,
) -> ScanOutcome {
    reverse_scan_with(window, |number| engine.exists(kind, &base.with_number(number)))
}

// =============================================================================
// Numbering Service
// =============================================================================

/// Keys found by a reverse scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub keys: Vec<DocumentKey>,
    pub report: ScanReport,
}

/// Numbering operations over the session's engine.
pub struct NumberingService {
    session: Arc<SessionManager>,
}

impl NumberingService {
    pub fn new(session: Arc<SessionManager>) -> Self {
        NumberingService { session }
    }

    /// `last number + 1` for the series and type. Advisory: another writer
    /// may take the number before it is used.
    pub async fn next_number(&self, document_type: &str, series: &str) -> GatewayResult<f64> {
        validate_code("documentType", document_type)?;
        validate_code("series", series)?;

        let document_type = document_type.to_string();
        let series = series.to_string();
        self.session
            .execute("next_number", move |engine, _| {
                let kind = engine.document_kind(&document_type);
                engine
                    .last_number(kind, &series, &document_type)
                    .map(next_after)
                    .map_err(|e| GatewayError::from_engine("next_number", None, e))
            })
            .await?
    }

    /// Probes `start` downwards; one worker submission for the whole walk.
    pub async fn reverse_scan(
        &self,
        document_type: &str,
        series: &str,
        window: ScanWindow,
    ) -> GatewayResult<ScanResult> {
        validate_code("documentType", document_type)?;
        validate_code("series", series)?;
        validate_scan_start(window.start)?;

        let base = DocumentKey::new(series, document_type, window.start);
        self.session
            .execute("reverse_scan", move |engine, _| {
                let kind = engine.document_kind(&base.document_type);
                let outcome = scan_engine(engine, kind, &base, &window);
                ScanResult {
                    keys: outcome.hits.iter().map(|n| base.with_number(*n)).collect(),
                    report: outcome.report,
                }
            })
            .await
    }
}
