//! Numbering, listing and document operations end-to-end.

use std::sync::Arc;

use chrono::Utc;
use salesgate_core::{
    DeletionOutcome, DocumentKey, LineDraft, LoadStatus, Money, TransactionDraft,
    MAX_LINE_PRICE_CENTS, MAX_LINE_QUANTITY,
};
use salesgate_engine::{FaultPlan, MemoryStore};
use salesgate_gateway::{
    ErrorCode, GatewayConfig, GatewayError, ListQuery, SalesGateway, SessionState,
};

async fn ready(store: &MemoryStore) -> SalesGateway {
    let gw = SalesGateway::new(GatewayConfig::default(), Arc::new(store.clone()));
    gw.initialize("Sage50c", "DEMO", false).await.unwrap();
    gw
}

fn draft(lines: Vec<LineDraft>) -> TransactionDraft {
    TransactionDraft {
        series: Some("A".into()),
        document_type: "FS".into(),
        lines,
        ..TransactionDraft::default()
    }
}

fn x1_line() -> LineDraft {
    LineDraft::new("X1", 2.0, Money::from_cents(5000))
}

// =============================================================================
// Numbering
// =============================================================================

#[tokio::test]
async fn next_number_is_last_plus_one() {
    let store = MemoryStore::new();
    let gw = ready(&store).await;

    assert_eq!(gw.next_number("FS", "A").await.unwrap(), 1.0);

    store.seed("A", "FS", 12);
    assert_eq!(store.last_number("A", "FS"), 12.0);
    assert_eq!(gw.next_number("FS", "A").await.unwrap(), 13.0);

    // Other series are counted separately
    assert_eq!(gw.next_number("FS", "B").await.unwrap(), 1.0);

    gw.terminate().await.unwrap();
}

#[tokio::test]
async fn reverse_scan_is_bounded_and_descending() {
    let store = MemoryStore::new();
    store.seed("A", "FS", 30);
    let gw = ready(&store).await;

    let result = gw.reverse_scan("FS", "A", 30.0, 20, 5).await.unwrap();
    let numbers: Vec<f64> = result.keys.iter().map(|k| k.number).collect();
    assert_eq!(numbers, vec![30.0, 29.0, 28.0, 27.0, 26.0]);
    assert_eq!(result.report.probed, 5);

    let result = gw.reverse_scan("FS", "A", 30.0, 3, 10).await.unwrap();
    let numbers: Vec<f64> = result.keys.iter().map(|k| k.number).collect();
    assert_eq!(numbers, vec![30.0, 29.0, 28.0, 27.0]);
    assert_eq!(result.report.lower_bound, 27.0);

    let result = gw.reverse_scan("FS", "A", 2.0, 20, 10).await.unwrap();
    assert_eq!(result.report.lower_bound, 1.0);
    assert_eq!(result.keys.len(), 2);

    gw.terminate().await.unwrap();
}

#[tokio::test]
async fn reverse_scan_skips_failed_probes() {
    let store = MemoryStore::new();
    store.seed("A", "FS", 30);
    let gw = ready(&store).await;
    store.update_faults(|f| f.failing_probes = vec![29.0]);

    let probes_before = store.stats().probes;
    let result = gw.reverse_scan("FS", "A", 30.0, 20, 5).await.unwrap();
    let numbers: Vec<f64> = result.keys.iter().map(|k| k.number).collect();

    assert_eq!(numbers, vec![30.0, 28.0, 27.0, 26.0, 25.0]);
    assert_eq!(result.report.probe_failures, 1);
    assert_eq!(result.report.probed, 6);
    assert_eq!(store.stats().probes - probes_before, 6);

    gw.terminate().await.unwrap();
}

#[tokio::test]
async fn oversized_numbers_are_rejected() {
    let store = MemoryStore::new();
    store.seed("A", "FS", 3);
    let gw = ready(&store).await;
    let calls_before = store.stats().calls;

    let mut request = draft(vec![x1_line()]);
    request.number = 1e17;
    assert!(matches!(
        gw.create(request).await,
        Err(GatewayError::Validation(_))
    ));

    for start in [1e17, f64::INFINITY, f64::NAN, -5.0] {
        assert!(matches!(
            gw.reverse_scan("FS", "A", start, 20, 5).await,
            Err(GatewayError::Validation(_))
        ));
    }
    assert!(matches!(
        gw.get("A", "FS", 1e17, false).await,
        Err(GatewayError::Validation(_))
    ));

    assert_eq!(store.stats().calls, calls_before);
    assert_eq!(store.document_count(), 3);

    // The engine still answers promptly afterwards
    let result = gw.reverse_scan("FS", "A", 3.0, 20, 5).await.unwrap();
    assert_eq!(result.keys.len(), 3);

    gw.terminate().await.unwrap();
}

// =============================================================================
// Create / Get / Delete
// =============================================================================

#[tokio::test]
async fn create_get_delete_round() {
    let store = MemoryStore::new();
    store.seed("A", "FS", 3);
    let gw = ready(&store).await;

    let expected_number = gw.next_number("FS", "A").await.unwrap();
    let created = gw.create(draft(vec![x1_line()])).await.unwrap();

    assert_eq!(created.key, DocumentKey::new("A", "FS", expected_number));
    assert_eq!(created.transaction_id, "A-FS-4");
    assert_eq!(created.totals.net, Money::from_cents(10000));
    assert_eq!(created.comments, "Created via gateway");
    assert_eq!(created.currency_id, "EUR");
    assert_eq!(created.create_date, Utc::now().date_naive());
    assert_eq!(created.line_count, 1);

    let fetched = gw.get("A", "FS", expected_number, false).await.unwrap();
    assert_eq!(fetched.status, LoadStatus::Loaded);
    assert_eq!(fetched.document.totals, created.totals);
    assert_eq!(fetched.document.lines.len(), 1);
    assert_eq!(fetched.document.lines[0].item_id, "X1");

    let report = gw.delete("A", "FS", expected_number).await.unwrap();
    assert_eq!(report.outcome, DeletionOutcome::SimulatedDeletion);
    assert!(store.document(&created.key).is_some());

    gw.terminate().await.unwrap();
}

#[tokio::test]
async fn create_uses_engine_default_series() {
    let store = MemoryStore::new();
    store.set_default_series(Some("B"));
    let gw = ready(&store).await;

    let mut request = draft(vec![x1_line()]);
    request.series = None;
    let created = gw.create(request).await.unwrap();
    assert_eq!(created.key.series, "B");

    gw.terminate().await.unwrap();
}

#[tokio::test]
async fn invalid_drafts_never_reach_the_engine() {
    let store = MemoryStore::new();
    let gw = ready(&store).await;
    let calls_before = store.stats().calls;

    let err = gw.create(draft(Vec::new())).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::ValidationError);

    let mut ambiguous = x1_line();
    ambiguous.tax_included_price = Money::from_cents(6150);
    let err = gw.create(draft(vec![ambiguous])).await.unwrap_err();
    assert!(matches!(err, GatewayError::Validation(_)));

    assert_eq!(store.stats().calls, calls_before);
    gw.terminate().await.unwrap();
}

#[tokio::test]
async fn unknown_currency_is_rejected() {
    let store = MemoryStore::new();
    let gw = ready(&store).await;

    let mut request = draft(vec![x1_line()]);
    request.currency_id = Some("JPY".into());
    let err = gw.create(request).await.unwrap_err();
    assert!(matches!(err, GatewayError::CurrencyNotFound { ref currency_id } if currency_id == "JPY"));
    assert_eq!(store.document_count(), 0);

    let mut request = draft(vec![x1_line()]);
    request.currency_id = Some("USD".into());
    assert_eq!(gw.create(request).await.unwrap().currency_id, "USD");

    gw.terminate().await.unwrap();
}

#[tokio::test]
async fn huge_amounts_fail_the_request_not_the_session() {
    let store = MemoryStore::new();
    let gw = ready(&store).await;

    let mut line = x1_line();
    line.quantity = 1e17;
    let err = gw.create(draft(vec![line])).await.unwrap_err();
    assert!(matches!(err, GatewayError::Validation(_)));

    // Every line within bounds, but their sum does not fit
    let max_line = LineDraft::new("X1", MAX_LINE_QUANTITY, Money::from_cents(MAX_LINE_PRICE_CENTS));
    let err = gw.create(draft(vec![max_line; 100])).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::EngineFault);
    assert_eq!(store.stats().discards, 1);
    assert_eq!(store.document_count(), 0);

    assert_eq!(gw.status().await.state, SessionState::Ready);
    let created = gw.create(draft(vec![x1_line()])).await.unwrap();
    assert_eq!(created.totals.net, Money::from_cents(10000));

    gw.terminate().await.unwrap();
}

#[tokio::test]
async fn json_prices_are_decimal_amounts() {
    let store = MemoryStore::new();
    let gw = ready(&store).await;

    let request: TransactionDraft = serde_json::from_str(
        r#"{"series":"A","lines":[{"itemId":"X1","quantity":2,"unitPrice":50}]}"#,
    )
    .unwrap();
    let created = gw.create(request).await.unwrap();
    assert_eq!(created.totals.net, Money::from_cents(10000));

    let json = serde_json::to_value(&created).unwrap();
    assert_eq!(json["totals"]["net"], 100.0);
    assert_eq!(json["totals"]["gross"], 100.0);

    gw.terminate().await.unwrap();
}

#[tokio::test]
async fn declined_save_discards_the_draft() {
    let store = MemoryStore::new();
    let gw = ready(&store).await;
    store.update_faults(|f| f.reject_save = true);

    let err = gw.create(draft(vec![x1_line()])).await.unwrap_err();
    assert!(matches!(err, GatewayError::PersistFailure { .. }));
    assert_eq!(store.stats().discards, 1);
    assert_eq!(store.document_count(), 0);

    gw.terminate().await.unwrap();
}

#[tokio::test]
async fn taken_number_is_a_retryable_conflict() {
    let store = MemoryStore::new();
    store.seed("A", "FS", 3);
    let gw = ready(&store).await;

    let mut request = draft(vec![x1_line()]);
    request.number = 2.0;
    let err = gw.create(request).await.unwrap_err();
    assert!(matches!(err, GatewayError::NumberConflict { ref key } if key.number == 2.0));
    assert!(err.is_retryable());
    assert_eq!(store.stats().discards, 1);

    // Retrying without an explicit number allocates a fresh one
    let created = gw.create(draft(vec![x1_line()])).await.unwrap();
    assert_eq!(created.key.number, 4.0);

    gw.terminate().await.unwrap();
}

#[tokio::test]
async fn missing_document_is_not_loaded() {
    let store = MemoryStore::new();
    store.seed("A", "FS", 2);
    let gw = ready(&store).await;
    let loads_before = store.stats().loads;

    let err = gw.get("A", "FS", 99.0, false).await.unwrap_err();
    assert!(matches!(err, GatewayError::NotFound { .. }));
    assert_eq!(store.stats().loads, loads_before);

    assert!(matches!(
        gw.delete("A", "FS", 99.0).await,
        Err(GatewayError::NotFound { .. })
    ));
    assert!(matches!(
        gw.get("A", "FS", 0.0, false).await,
        Err(GatewayError::Validation(_))
    ));

    gw.terminate().await.unwrap();
}

#[tokio::test]
async fn failed_load_returns_partial_document() {
    let store = MemoryStore::new();
    store.seed("A", "FS", 2);
    let gw = ready(&store).await;
    store.update_faults(|f| f.failing_loads = vec![2.0]);

    let fetched = gw.get("A", "FS", 2.0, false).await.unwrap();
    assert_eq!(fetched.status, LoadStatus::Partial);
    assert_eq!(fetched.document.transaction_id, "A-FS-2");
    assert_eq!(fetched.document.currency_id, "EUR");
    assert!(fetched.document.lines.is_empty());

    let fetched = gw.get("A", "FS", 1.0, false).await.unwrap();
    assert_eq!(fetched.status, LoadStatus::Loaded);

    gw.terminate().await.unwrap();
}

// =============================================================================
// Listing
// =============================================================================

#[tokio::test]
async fn list_recent_returns_newest_first() {
    let store = MemoryStore::new();
    store.seed("A", "FS", 12);
    let gw = ready(&store).await;

    let page = gw
        .list_recent(ListQuery::new("FS", "A").page(1, 5))
        .await
        .unwrap();
    assert!(page.entries.len() <= 5);
    assert_eq!(page.total_collected, 5);
    assert!(page
        .entries
        .windows(2)
        .all(|pair| pair[0].create_date >= pair[1].create_date));
    assert_eq!(page.entries[0].key.number, 12.0);
    assert_eq!(page.entries[0].status, LoadStatus::Loaded);
    assert!(!page.entries[0].party_name.is_empty());

    let scan = page.scan.unwrap();
    assert_eq!(scan.start_number, 12.0);
    assert_eq!(scan.probed, 5);

    // The view is bounded: nothing beyond the collected set
    let second = gw
        .list_recent(ListQuery::new("FS", "A").page(2, 5))
        .await
        .unwrap();
    assert!(second.entries.is_empty());

    gw.terminate().await.unwrap();
}

#[tokio::test]
async fn list_recent_keeps_unloadable_hits() {
    let store = MemoryStore::new();
    store.seed("A", "FS", 4);
    let gw = ready(&store).await;
    store.update_faults(|f| f.failing_loads = vec![3.0]);

    let page = gw.list_recent(ListQuery::default()).await.unwrap();
    assert_eq!(page.entries.len(), 4);

    let partial: Vec<_> = page
        .entries
        .iter()
        .filter(|e| e.status == LoadStatus::Partial)
        .collect();
    assert_eq!(partial.len(), 1);
    assert_eq!(partial[0].key.number, 3.0);
    assert_eq!(partial[0].create_date, Utc::now().date_naive());

    gw.terminate().await.unwrap();
}

#[tokio::test]
async fn list_recent_unknown_type_is_empty() {
    let store = MemoryStore::new();
    store.seed("A", "FS", 4);
    let gw = ready(&store).await;

    let page = gw.list_recent(ListQuery::new("ZZ", "A")).await.unwrap();
    assert!(page.entries.is_empty());
    assert!(page.scan.is_none());

    let err = gw
        .list_recent(ListQuery::new("FS", "A").page(0, 5))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Validation(_)));

    gw.terminate().await.unwrap();
}
