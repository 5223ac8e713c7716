//! # Session Manager
//!
//! Owns the one engine session of the process and gates every operation on
//! its state.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   ┌───────────────┐  initialize   ┌──────────────┐   ok   ┌─────────┐  │
//! │   │ Uninitialized │──────────────►│ Initializing │───────►│  Ready  │  │
//! │   └───────────────┘               └──────┬───────┘        └────┬────┘  │
//! │           ▲                              │ engine fault        │       │
//! │           │                              ▼                     │       │
//! │           │                        ┌──────────┐  worker crash  │       │
//! │           │                        │ Degraded │◄───────────────┤       │
//! │           │                        └────┬─────┘                │       │
//! │           │         terminate           │ terminate            │       │
//! │           │   ┌─────────────┐◄──────────┘                      │       │
//! │           └───│ Terminating │◄─────────────────────────────────┘       │
//! │   always      └─────────────┘           terminate                      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Locking
//! State lives behind a `tokio::sync::RwLock` that is only held for
//! transitions and snapshot copies, never across a worker submission. That
//! keeps `status()` from ever waiting on the engine.
//!
//! ## Cancellation
//! The slow half of `initialize` and `terminate` runs in a spawned task. A
//! caller that stops waiting (client disconnect, `timeout`) does not stop
//! the transition, so the state always moves on to `Ready`, `Degraded` or
//! `Uninitialized`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use salesgate_core::validation::validate_product_code;
use salesgate_core::{CompanyInfo, SessionSettings, SystemSnapshot};
use salesgate_engine::{EngineFactory, SalesEngine};

use crate::config::WorkerSettings;
use crate::error::{GatewayError, GatewayResult};
use crate::worker::{AffinityWorker, WorkerError, WorkerHandle};

// =============================================================================
// Public Records
// =============================================================================

/// Lifecycle state of the engine session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    #[default]
    Uninitialized,
    Initializing,
    Ready,
    Terminating,
    Degraded,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Uninitialized => write!(f, "uninitialized"),
            SessionState::Initializing => write!(f, "initializing"),
            SessionState::Ready => write!(f, "ready"),
            SessionState::Terminating => write!(f, "terminating"),
            SessionState::Degraded => write!(f, "degraded"),
        }
    }
}

/// Result of `initialize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "outcome", content = "settings")]
pub enum InitOutcome {
    /// A session was already open; carries the settings it was opened with.
    AlreadyInitialized(SessionSettings),
    Initialized(SessionSettings),
}

impl InitOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            InitOutcome::AlreadyInitialized(_) => "Already initialized",
            InitOutcome::Initialized(_) => "Initialized",
        }
    }
}

/// Result of `terminate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TerminateOutcome {
    AlreadyTerminated,
    Terminated,
}

impl TerminateOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            TerminateOutcome::AlreadyTerminated => "Already terminated",
            TerminateOutcome::Terminated => "Terminated",
        }
    }
}

/// Read-only view of the session. Optional fields are `None` (unavailable)
/// unless the session is `Ready`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub initialized: bool,
    pub state: SessionState,
    pub company_name: Option<String>,
    pub company_id: Option<String>,
    pub user_name: Option<String>,
    pub session_id: Option<Uuid>,
    pub initialized_at: Option<DateTime<Utc>>,
    pub degraded_reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

// =============================================================================
// Internal State
// =============================================================================

struct LiveSession {
    id: Uuid,
    settings: SessionSettings,
    snapshot: SystemSnapshot,
    initialized_at: DateTime<Utc>,
}

#[derive(Default)]
struct SessionInner {
    state: SessionState,
    live: Option<LiveSession>,
    worker: Option<WorkerHandle>,
    degraded_reason: Option<String>,
}

impl SessionInner {
    fn degraded_error(&self) -> GatewayError {
        GatewayError::Degraded {
            reason: self
                .degraded_reason
                .clone()
                .unwrap_or_else(|| "unknown engine fault".to_string()),
        }
    }

    /// Error for any state other than `Ready`.
    fn not_ready_error(&self) -> GatewayError {
        match self.state {
            SessionState::Degraded => self.degraded_error(),
            SessionState::Initializing => {
                GatewayError::SessionBusy("initialization in progress".into())
            }
            SessionState::Terminating => GatewayError::SessionBusy("session is terminating".into()),
            SessionState::Uninitialized | SessionState::Ready => GatewayError::NotInitialized,
        }
    }
}

// =============================================================================
// Session Manager
// =============================================================================

/// Lifecycle owner of the engine session and its affinity worker.
pub struct SessionManager {
    factory: Arc<dyn EngineFactory>,
    worker_settings: WorkerSettings,
    inner: Arc<RwLock<SessionInner>>,
}

impl SessionManager {
    pub fn new(factory: Arc<dyn EngineFactory>, worker_settings: WorkerSettings) -> Self {
        SessionManager {
            factory,
            worker_settings,
            inner: Arc::new(RwLock::new(SessionInner::default())),
        }
    }

    pub async fn state(&self) -> SessionState {
        self.inner.read().await.state
    }

    // =========================================================================
    // Initialize
    // =========================================================================

    /// Opens the session. Idempotent while `Ready`.
    ///
    /// ## Flow
    /// 1. Validate the product code (no engine involved)
    /// 2. `Uninitialized → Initializing` under the write lock
    /// 3. Spawn the affinity worker, which opens the engine on its thread
    /// 4. Submit `initialize`; on success cache the snapshot and go `Ready`
    /// 5. On any failure go `Degraded`; there is no automatic retry
    ///
    /// Steps 3 to 5 run in their own task and finish even if this future is
    /// dropped.
    pub async fn initialize(&self, settings: SessionSettings) -> GatewayResult<InitOutcome> {
        validate_product_code(&settings.product_code)?;

        {
            let mut inner = self.inner.write().await;
            match inner.state {
                SessionState::Ready => {
                    let current = inner
                        .live
                        .as_ref()
                        .map(|live| live.settings.clone())
                        .unwrap_or_else(|| settings.clone());
                    if current != settings {
                        warn!(
                            requested_company = %settings.company_id,
                            open_company = %current.company_id,
                            "initialize called with different settings; keeping the open session"
                        );
                    }
                    debug!("initialize called on an open session");
                    return Ok(InitOutcome::AlreadyInitialized(current));
                }
                SessionState::Initializing => return Err(GatewayError::AlreadyInitializing),
                SessionState::Terminating => {
                    return Err(GatewayError::SessionBusy("session is terminating".into()))
                }
                SessionState::Degraded => return Err(inner.degraded_error()),
                SessionState::Uninitialized => inner.state = SessionState::Initializing,
            }
        }

        let opening = tokio::spawn(open_session(
            Arc::clone(&self.factory),
            self.worker_settings.clone(),
            Arc::clone(&self.inner),
            settings,
        ));
        match opening.await {
            Ok(result) => result,
            Err(e) => {
                let reason = format!("initialize task failed: {}", e);
                Err(fail_initialize(&self.inner, None, reason).await)
            }
        }
    }

    // =========================================================================
    // Terminate
    // =========================================================================

    /// Closes the session. Always ends `Uninitialized`, even when the engine's
    /// own terminate fails.
    ///
    /// The terminate call is queued behind whatever is already in the worker
    /// queue; it does not preempt a running operation. Like `initialize`, the
    /// closing half runs in its own task.
    pub async fn terminate(&self) -> GatewayResult<TerminateOutcome> {
        let worker = {
            let mut inner = self.inner.write().await;
            match inner.state {
                SessionState::Uninitialized | SessionState::Terminating => {
                    debug!(state = %inner.state, "terminate: nothing to close");
                    return Ok(TerminateOutcome::AlreadyTerminated);
                }
                SessionState::Initializing => return Err(GatewayError::AlreadyInitializing),
                SessionState::Ready | SessionState::Degraded => {
                    inner.state = SessionState::Terminating;
                    inner.worker.clone()
                }
            }
        };

        let closing = tokio::spawn(close_session(Arc::clone(&self.inner), worker));
        if let Err(e) = closing.await {
            warn!(error = %e, "terminate task failed; releasing session anyway");
            *self.inner.write().await = SessionInner::default();
        }
        Ok(TerminateOutcome::Terminated)
    }

    // =========================================================================
    // Reads (never touch the worker)
    // =========================================================================

    pub async fn status(&self) -> SessionStatus {
        let inner = self.inner.read().await;
        let live = match inner.state {
            SessionState::Ready => inner.live.as_ref(),
            _ => None,
        };

        SessionStatus {
            initialized: live.is_some(),
            state: inner.state,
            company_name: live.map(|l| l.snapshot.company.name.clone()),
            company_id: live.map(|l| l.snapshot.company.id.clone()),
            user_name: live.map(|l| l.snapshot.user_name.clone()),
            session_id: live.map(|l| l.id),
            initialized_at: live.map(|l| l.initialized_at),
            degraded_reason: inner.degraded_reason.clone(),
            timestamp: Utc::now(),
        }
    }

    /// Company details cached at initialize time.
    pub async fn company_info(&self) -> GatewayResult<CompanyInfo> {
        let inner = self.inner.read().await;
        match (&inner.state, &inner.live) {
            (SessionState::Ready, Some(live)) => Ok(live.snapshot.company.clone()),
            _ => Err(inner.not_ready_error()),
        }
    }

    // =========================================================================
    // Gated Execution
    // =========================================================================

    /// Runs `f` on the engine thread if, and only if, the session is `Ready`.
    ///
    /// `f` also receives the snapshot cached at initialize time (base
    /// currency, default series). Worker failures are mapped here:
    ///
    /// ```text
    /// WorkerError::Crashed   → session forced Degraded, GatewayError::Degraded
    /// WorkerError::TimedOut  → GatewayError::OutcomeUnknown
    /// WorkerError::Stopped   → GatewayError::NotInitialized (terminated meanwhile)
    /// ```
    pub async fn execute<T, F>(&self, operation: &'static str, f: F) -> GatewayResult<T>
    where
        F: FnOnce(&mut dyn SalesEngine, &SystemSnapshot) -> T + Send + 'static,
        T: Send + 'static,
    {
        let (worker, snapshot) = self.gate().await?;

        match worker.submit(operation, move |engine| f(engine, &snapshot)).await {
            Ok(value) => Ok(value),
            Err(e) => Err(self.worker_failure(&worker, e).await),
        }
    }

    async fn gate(&self) -> GatewayResult<(WorkerHandle, SystemSnapshot)> {
        let (worker, snapshot) = {
            let inner = self.inner.read().await;
            match (&inner.state, &inner.worker, &inner.live) {
                (SessionState::Ready, Some(worker), Some(live)) => {
                    (worker.clone(), live.snapshot.clone())
                }
                _ => return Err(inner.not_ready_error()),
            }
        };

        if let Some(crash) = worker.crash() {
            return Err(self.mark_degraded(&worker, crash.to_string()).await);
        }
        Ok((worker, snapshot))
    }

    async fn worker_failure(&self, worker: &WorkerHandle, err: WorkerError) -> GatewayError {
        match err {
            WorkerError::Crashed { .. } | WorkerError::Startup(_) => {
                self.mark_degraded(worker, err.to_string()).await
            }
            WorkerError::TimedOut { operation } => GatewayError::OutcomeUnknown { operation },
            WorkerError::Stopped => GatewayError::NotInitialized,
        }
    }

    /// Forces `Ready → Degraded` if `worker` is still the session's worker.
    async fn mark_degraded(&self, worker: &WorkerHandle, reason: String) -> GatewayError {
        let mut inner = self.inner.write().await;
        let current = inner
            .worker
            .as_ref()
            .map(|w| w.same_worker(worker))
            .unwrap_or(false);

        if current && inner.state == SessionState::Ready {
            error!(reason = %reason, "engine worker crashed; session degraded");
            inner.state = SessionState::Degraded;
            inner.degraded_reason = Some(reason.clone());
        }

        if inner.state == SessionState::Degraded {
            inner.degraded_error()
        } else {
            GatewayError::Degraded { reason }
        }
    }
}

// =============================================================================
// Transitions
// =============================================================================

/// `Initializing → Ready | Degraded`. Runs detached from the caller.
async fn open_session(
    factory: Arc<dyn EngineFactory>,
    worker_settings: WorkerSettings,
    inner: Arc<RwLock<SessionInner>>,
    settings: SessionSettings,
) -> GatewayResult<InitOutcome> {
    info!(
        product = %settings.product_code,
        company_id = %settings.company_id,
        debug_mode = settings.debug_mode,
        "initializing engine session"
    );

    let worker = match AffinityWorker::spawn(factory, &worker_settings).await {
        Ok(worker) => worker,
        Err(e) => return Err(fail_initialize(&inner, None, e.to_string()).await),
    };

    let engine_settings = settings.clone();
    let result = worker
        .submit("initialize", move |engine| engine.initialize(&engine_settings))
        .await;

    let snapshot = match result {
        Ok(Ok(snapshot)) => snapshot,
        Ok(Err(e)) => return Err(fail_initialize(&inner, Some(worker), e.to_string()).await),
        Err(e) => return Err(fail_initialize(&inner, Some(worker), e.to_string()).await),
    };

    let id = Uuid::new_v4();
    {
        let mut inner = inner.write().await;
        inner.state = SessionState::Ready;
        inner.worker = Some(worker);
        inner.degraded_reason = None;
        inner.live = Some(LiveSession {
            id,
            settings: settings.clone(),
            snapshot,
            initialized_at: Utc::now(),
        });
    }

    info!(session_id = %id, company_id = %settings.company_id, "engine session ready");
    Ok(InitOutcome::Initialized(settings))
}

async fn fail_initialize(
    inner: &RwLock<SessionInner>,
    worker: Option<WorkerHandle>,
    reason: String,
) -> GatewayError {
    error!(reason = %reason, "engine initialization failed; session degraded");
    let mut inner = inner.write().await;
    inner.state = SessionState::Degraded;
    inner.worker = worker;
    inner.live = None;
    inner.degraded_reason = Some(reason);
    inner.degraded_error()
}

/// `Terminating → Uninitialized`. Runs detached from the caller.
async fn close_session(inner: Arc<RwLock<SessionInner>>, worker: Option<WorkerHandle>) {
    info!("terminating engine session");

    if let Some(worker) = worker {
        if !worker.is_crashed() {
            match worker.submit("terminate", |engine| engine.terminate()).await {
                Ok(Ok(())) => debug!("engine session closed"),
                Ok(Err(e)) => warn!(error = %e, "engine terminate failed; releasing session anyway"),
                Err(e) => warn!(error = %e, "terminate did not complete; releasing session anyway"),
            }
        }
        worker.shutdown().await;
    }

    *inner.write().await = SessionInner::default();
    info!("engine session terminated");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use salesgate_engine::{FaultPlan, MemoryStore};

    fn manager(store: &MemoryStore) -> SessionManager {
        SessionManager::new(Arc::new(store.clone()), WorkerSettings::default())
    }

    fn demo() -> SessionSettings {
        SessionSettings::new("Sage50c", "DEMO", false)
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let store = MemoryStore::new();
        let session = manager(&store);

        assert_eq!(
            session.initialize(demo()).await.unwrap(),
            InitOutcome::Initialized(demo())
        );
        let first = session.status().await.session_id;

        assert_eq!(
            session.initialize(demo()).await.unwrap(),
            InitOutcome::AlreadyInitialized(demo())
        );
        assert_eq!(session.status().await.session_id, first);
        assert_eq!(store.stats().initializations, 1);

        session.terminate().await.unwrap();
    }

    #[tokio::test]
    async fn test_status_unavailable_when_not_ready() {
        let store = MemoryStore::new();
        let session = manager(&store);

        let status = session.status().await;
        assert!(!status.initialized);
        assert_eq!(status.state, SessionState::Uninitialized);
        assert_eq!(status.company_id, None);
        assert_eq!(status.user_name, None);
    }

    #[tokio::test]
    async fn test_empty_product_code_rejected_without_engine() {
        let store = MemoryStore::new();
        let session = manager(&store);
        let err = session
            .initialize(SessionSettings::new("", "DEMO", false))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
        assert_eq!(store.stats().opened, 0);
        assert_eq!(session.state().await, SessionState::Uninitialized);
    }

    #[tokio::test]
    async fn test_engine_init_failure_degrades() {
        let store = MemoryStore::new().with_faults(FaultPlan {
            fail_initialize: Some("company locked".into()),
            ..FaultPlan::default()
        });
        let session = manager(&store);

        let err = session.initialize(demo()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Degraded { ref reason } if reason.contains("company locked")));
        assert_eq!(session.state().await, SessionState::Degraded);

        // Only terminate leaves Degraded
        assert!(matches!(
            session.initialize(demo()).await,
            Err(GatewayError::Degraded { .. })
        ));
        assert_eq!(session.terminate().await.unwrap(), TerminateOutcome::Terminated);
        assert_eq!(session.state().await, SessionState::Uninitialized);

        store.set_faults(FaultPlan::default());
        assert!(session.initialize(demo()).await.is_ok());
        session.terminate().await.unwrap();
    }

    #[tokio::test]
    async fn test_terminate_survives_engine_failure() {
        let store = MemoryStore::new().with_faults(FaultPlan {
            fail_terminate: true,
            ..FaultPlan::default()
        });
        let session = manager(&store);
        session.initialize(demo()).await.unwrap();

        assert_eq!(session.terminate().await.unwrap(), TerminateOutcome::Terminated);
        assert_eq!(session.state().await, SessionState::Uninitialized);
        assert_eq!(store.stats().terminations, 1);

        assert_eq!(
            session.terminate().await.unwrap(),
            TerminateOutcome::AlreadyTerminated
        );
    }

    #[tokio::test]
    async fn test_execute_requires_ready() {
        let store = MemoryStore::new();
        let session = manager(&store);
        let result = session.execute("noop", |_, _| ()).await;
        assert!(matches!(result, Err(GatewayError::NotInitialized)));
    }

    #[tokio::test]
    async fn test_crash_forces_degraded() {
        let store = MemoryStore::new();
        let session = manager(&store);
        session.initialize(demo()).await.unwrap();

        store.update_faults(|f| f.panic_on = Some("exists".into()));
        let result = session
            .execute("exists", |engine, _| {
                let key = salesgate_core::DocumentKey::new("A", "FS", 1.0);
                engine.exists(salesgate_core::DocumentKind::Sale, &key)
            })
            .await;

        assert!(matches!(result, Err(GatewayError::Degraded { .. })));
        assert_eq!(session.state().await, SessionState::Degraded);
        assert!(session.status().await.degraded_reason.is_some());
        assert!(matches!(
            session.company_info().await,
            Err(GatewayError::Degraded { .. })
        ));

        store.set_faults(FaultPlan::default());
        session.terminate().await.unwrap();
        assert!(session.initialize(demo()).await.is_ok());
        session.terminate().await.unwrap();
    }

    #[tokio::test]
    async fn test_company_info_from_snapshot() {
        let store = MemoryStore::new();
        let session = manager(&store);
        assert!(matches!(
            session.company_info().await,
            Err(GatewayError::NotInitialized)
        ));

        session
            .initialize(SessionSettings::new("Sage50c", "ACME", false))
            .await
            .unwrap();
        let calls_before = store.stats().calls;
        let company = session.company_info().await.unwrap();
        assert_eq!(company.id, "ACME");
        assert_eq!(store.stats().calls, calls_before);

        session.terminate().await.unwrap();
    }

    #[tokio::test]
    async fn test_abandoned_initialize_still_finishes() {
        let store = MemoryStore::new();
        store.update_faults(|f| f.call_delay = Some(Duration::from_millis(200)));
        let session = manager(&store);

        let abandoned = tokio::time::timeout(Duration::from_millis(20), session.initialize(demo())).await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(session.state().await, SessionState::Ready);
        assert!(session.status().await.initialized);

        store.update_faults(|f| f.call_delay = None);
        session.terminate().await.unwrap();
    }

    #[tokio::test]
    async fn test_abandoned_terminate_still_finishes() {
        let store = MemoryStore::new();
        let session = manager(&store);
        session.initialize(demo()).await.unwrap();

        store.update_faults(|f| f.call_delay = Some(Duration::from_millis(200)));
        let abandoned = tokio::time::timeout(Duration::from_millis(50), session.terminate()).await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(session.state().await, SessionState::Uninitialized);
        assert_eq!(store.stats().terminations, 1);

        store.update_faults(|f| f.call_delay = None);
        assert_eq!(
            session.initialize(demo()).await.unwrap(),
            InitOutcome::Initialized(demo())
        );
        session.terminate().await.unwrap();
    }
}
