//! Session lifecycle against the in-process engine.

use std::sync::Arc;
use std::time::Duration;

use salesgate_engine::{FaultPlan, MemoryStore};
use salesgate_gateway::{
    GatewayConfig, GatewayError, InitOutcome, SalesGateway, SessionState, TerminateOutcome,
};

fn gateway(store: &MemoryStore) -> SalesGateway {
    SalesGateway::new(GatewayConfig::default(), Arc::new(store.clone()))
}

#[tokio::test]
async fn initialize_twice_keeps_the_session() {
    let store = MemoryStore::new();
    let gw = gateway(&store);

    let first = gw.initialize("Sage50c", "DEMO", false).await.unwrap();
    assert!(matches!(first, InitOutcome::Initialized(_)));
    let session_id = gw.status().await.session_id;
    assert!(session_id.is_some());

    let second = gw.initialize("Sage50c", "DEMO", false).await.unwrap();
    assert!(matches!(second, InitOutcome::AlreadyInitialized(ref s) if s.company_id == "DEMO"));
    assert_eq!(gw.status().await.session_id, session_id);
    assert_eq!(store.stats().initializations, 1);
    assert_eq!(store.stats().opened, 1);

    gw.terminate().await.unwrap();
}

#[tokio::test]
async fn status_follows_initialize_and_terminate() {
    let store = MemoryStore::new();
    let gw = gateway(&store);

    gw.initialize("Sage50c", "ACME", false).await.unwrap();
    let status = gw.status().await;
    assert!(status.initialized);
    assert_eq!(status.state, SessionState::Ready);
    assert_eq!(status.company_id.as_deref(), Some("ACME"));
    assert_eq!(status.user_name.as_deref(), Some("admin"));

    assert_eq!(gw.terminate().await.unwrap(), TerminateOutcome::Terminated);
    let status = gw.status().await;
    assert!(!status.initialized);
    assert_eq!(status.company_id, None);
    assert_eq!(status.company_name, None);

    assert_eq!(
        gw.terminate().await.unwrap(),
        TerminateOutcome::AlreadyTerminated
    );
}

#[tokio::test]
async fn operations_require_a_session() {
    let store = MemoryStore::new();
    let gw = gateway(&store);

    assert!(matches!(
        gw.next_number("FS", "A").await,
        Err(GatewayError::NotInitialized)
    ));
    assert!(matches!(
        gw.get("A", "FS", 1.0, false).await,
        Err(GatewayError::NotInitialized)
    ));
    assert!(matches!(gw.company_info().await, Err(GatewayError::NotInitialized)));
    assert_eq!(store.stats().calls, 0);
}

#[tokio::test]
async fn initialize_from_config_uses_engine_section() {
    let store = MemoryStore::new();
    let mut config = GatewayConfig::default();
    config.engine.company_id = "NORTH".into();
    let gw = SalesGateway::new(config, Arc::new(store.clone()));

    gw.initialize_from_config().await.unwrap();
    assert_eq!(gw.company_info().await.unwrap().id, "NORTH");
    gw.terminate().await.unwrap();
}

#[tokio::test]
async fn worker_panic_degrades_until_terminate() {
    let store = MemoryStore::new();
    let gw = gateway(&store);
    gw.initialize("Sage50c", "DEMO", false).await.unwrap();

    store.update_faults(|f| f.panic_on = Some("last_number".into()));
    let err = gw.next_number("FS", "A").await.unwrap_err();
    assert!(matches!(err, GatewayError::Degraded { .. }));

    let status = gw.status().await;
    assert_eq!(status.state, SessionState::Degraded);
    assert!(!status.initialized);

    // Everything but terminate is refused now
    assert!(matches!(
        gw.get("A", "FS", 1.0, false).await,
        Err(GatewayError::Degraded { .. })
    ));
    assert!(matches!(
        gw.initialize("Sage50c", "DEMO", false).await,
        Err(GatewayError::Degraded { .. })
    ));

    store.set_faults(FaultPlan::default());
    assert_eq!(gw.terminate().await.unwrap(), TerminateOutcome::Terminated);
    assert!(matches!(
        gw.initialize("Sage50c", "DEMO", false).await.unwrap(),
        InitOutcome::Initialized(_)
    ));
    assert_eq!(gw.next_number("FS", "A").await.unwrap(), 1.0);
    gw.terminate().await.unwrap();
}

#[tokio::test]
async fn open_failure_degrades_without_engine() {
    let store = MemoryStore::new().with_faults(FaultPlan {
        fail_open: Some("licence server unreachable".into()),
        ..FaultPlan::default()
    });
    let gw = gateway(&store);

    let err = gw.initialize("Sage50c", "DEMO", false).await.unwrap_err();
    assert!(err.to_string().contains("licence server unreachable"));
    assert_eq!(gw.status().await.state, SessionState::Degraded);
    assert_eq!(store.stats().initializations, 0);

    assert_eq!(gw.terminate().await.unwrap(), TerminateOutcome::Terminated);
    assert_eq!(gw.status().await.state, SessionState::Uninitialized);
}

#[tokio::test]
async fn caller_timeout_reports_unknown_outcome() {
    let store = MemoryStore::new();
    let mut config = GatewayConfig::default();
    config.worker.submit_timeout_ms = 20;
    let gw = SalesGateway::new(config, Arc::new(store.clone()));
    gw.initialize("Sage50c", "DEMO", false).await.unwrap();

    store.update_faults(|f| f.call_delay = Some(Duration::from_millis(100)));
    let err = gw.next_number("FS", "A").await.unwrap_err();
    assert!(matches!(err, GatewayError::OutcomeUnknown { ref operation } if operation == "next_number"));
    assert!(!err.is_retryable());

    // A timeout does not degrade the session
    assert_eq!(gw.status().await.state, SessionState::Ready);

    store.set_faults(FaultPlan::default());
    gw.terminate().await.unwrap();
    assert_eq!(store.stats().last_number_calls, 1);
}

#[tokio::test]
async fn empty_product_code_is_a_validation_error() {
    let store = MemoryStore::new();
    let gw = gateway(&store);

    let err = gw.initialize("", "DEMO", false).await.unwrap_err();
    assert!(matches!(err, GatewayError::Validation(_)));
    assert_eq!(store.stats().opened, 0);
    assert_eq!(gw.available_products().len(), 5);
}

#[tokio::test]
async fn dropped_terminate_does_not_wedge_the_session() {
    let store = MemoryStore::new();
    let gw = gateway(&store);
    gw.initialize("Sage50c", "DEMO", false).await.unwrap();

    store.update_faults(|f| f.call_delay = Some(Duration::from_millis(200)));
    let dropped = tokio::time::timeout(Duration::from_millis(50), gw.terminate()).await;
    assert!(dropped.is_err());

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(gw.status().await.state, SessionState::Uninitialized);

    store.set_faults(FaultPlan::default());
    let reopened = gw.initialize("Sage50c", "DEMO", false).await.unwrap();
    assert!(matches!(reopened, InitOutcome::Initialized(_)));
    assert_eq!(gw.terminate().await.unwrap(), TerminateOutcome::Terminated);
}

#[tokio::test]
async fn dropped_initialize_still_opens_the_session() {
    let store = MemoryStore::new();
    let gw = gateway(&store);

    store.update_faults(|f| f.call_delay = Some(Duration::from_millis(200)));
    let opening = gw.initialize("Sage50c", "DEMO", false);
    let dropped = tokio::time::timeout(Duration::from_millis(20), opening).await;
    assert!(dropped.is_err());

    tokio::time::sleep(Duration::from_millis(500)).await;
    let status = gw.status().await;
    assert_eq!(status.state, SessionState::Ready);
    assert_eq!(status.company_id.as_deref(), Some("DEMO"));

    store.set_faults(FaultPlan::default());
    assert!(matches!(
        gw.initialize("Sage50c", "DEMO", false).await.unwrap(),
        InitOutcome::AlreadyInitialized(_)
    ));
    gw.terminate().await.unwrap();
}
