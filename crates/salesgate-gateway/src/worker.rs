//! # Affinity Worker
//!
//! Runs every engine call on one dedicated OS thread, one at a time, in
//! submission order.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Affinity Worker                                 │
//! │                                                                         │
//! │  caller A ─┐                                                            │
//! │  caller B ─┼─► WorkerHandle::submit                                     │
//! │  caller C ─┘        │  seq assigned under the submit lock               │
//! │                     ▼                                                   │
//! │            ┌──────────────────────┐                                     │
//! │            │ bounded mpsc (FIFO)  │  WorkItem { seq, operation, job }   │
//! │            └──────────┬───────────┘                                     │
//! │                       ▼                                                 │
//! │   "salesgate-engine" thread                                             │
//! │   ┌──────────────────────────────────────────────────────────────┐     │
//! │   │ factory.open() → Box<dyn SalesEngine>   (never leaves here)  │     │
//! │   │ loop { blocking_recv → catch_unwind(job(engine)) → reply }   │     │
//! │   └──────────────────────────────────────────────────────────────┘     │
//! │                       │                                                 │
//! │                       ▼ oneshot per item                                │
//! │                 caller's result                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Failure Modes
//! - A job that panics is a crashed worker: the loop stops, the crash is
//!   recorded, and every later submission fails with `Crashed` instead of
//!   queueing against a dead thread.
//! - A caller-side timeout abandons the wait only. The job still runs.
//! - `shutdown` closes the queue; items already queued still run, then the
//!   engine is dropped on its own thread and the thread is joined.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, error, info, warn};

use salesgate_engine::{EngineFactory, SalesEngine};

use crate::config::WorkerSettings;

/// Name of the thread that owns the engine.
pub const ENGINE_THREAD_NAME: &str = "salesgate-engine";

// =============================================================================
// Errors
// =============================================================================

/// Why a submission produced no result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkerError {
    /// The worker was shut down.
    #[error("engine worker is stopped")]
    Stopped,

    /// The worker loop died while running `operation`.
    #[error("engine worker crashed during {operation}: {message}")]
    Crashed { operation: String, message: String },

    /// The caller stopped waiting; the job may still run.
    #[error("timed out waiting for {operation}")]
    TimedOut { operation: String },

    /// The engine thread could not be started or the engine not opened.
    #[error("engine worker failed to start: {0}")]
    Startup(String),
}

pub type WorkerResult<T> = Result<T, WorkerError>;

// =============================================================================
// Work Items
// =============================================================================

enum JobOutcome {
    Completed,
    Panicked,
}

type Job = Box<dyn FnOnce(&mut dyn SalesEngine) -> JobOutcome + Send>;

struct WorkItem {
    seq: u64,
    operation: &'static str,
    job: Job,
}

/// Crash record shared between the engine thread and every handle.
#[derive(Default)]
struct CrashState {
    crashed: AtomicBool,
    detail: StdMutex<Option<(String, String)>>,
}

impl CrashState {
    fn mark(&self, operation: &str, message: &str) {
        *self.detail.lock().unwrap_or_else(PoisonError::into_inner) =
            Some((operation.to_string(), message.to_string()));
        self.crashed.store(true, Ordering::SeqCst);
    }

    fn error(&self) -> Option<WorkerError> {
        if !self.crashed.load(Ordering::SeqCst) {
            return None;
        }
        let (operation, message) = self
            .detail
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_default();
        Some(WorkerError::Crashed { operation, message })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// =============================================================================
// Worker Handle
// =============================================================================

struct Submitter {
    next_seq: u64,
    tx: Option<mpsc::Sender<WorkItem>>,
}

struct Shared {
    submitter: Mutex<Submitter>,
    crash: Arc<CrashState>,
    thread: StdMutex<Option<JoinHandle<()>>>,
    timeout: Option<Duration>,
}

/// Cloneable handle for submitting work to the engine thread.
#[derive(Clone)]
pub struct WorkerHandle {
    shared: Arc<Shared>,
}

impl WorkerHandle {
    /// Runs `f` against the engine and returns its result.
    ///
    /// Safe to call from any number of tasks. Items run strictly one at a
    /// time, in the order their submissions were accepted.
    pub async fn submit<T, F>(&self, operation: &'static str, f: F) -> WorkerResult<T>
    where
        F: FnOnce(&mut dyn SalesEngine) -> T + Send + 'static,
        T: Send + 'static,
    {
        if let Some(err) = self.shared.crash.error() {
            return Err(err);
        }

        let (result_tx, result_rx) = oneshot::channel::<WorkerResult<T>>();
        let crash = Arc::clone(&self.shared.crash);
        let job: Job = Box::new(move |engine: &mut dyn SalesEngine| {
            match catch_unwind(AssertUnwindSafe(|| f(engine))) {
                Ok(value) => {
                    let _ = result_tx.send(Ok(value));
                    JobOutcome::Completed
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    crash.mark(operation, &message);
                    let _ = result_tx.send(Err(WorkerError::Crashed {
                        operation: operation.to_string(),
                        message,
                    }));
                    JobOutcome::Panicked
                }
            }
        });

        let seq = {
            let mut submitter = self.shared.submitter.lock().await;
            let seq = submitter.next_seq;
            let tx = submitter.tx.as_ref().ok_or(WorkerError::Stopped)?;
            tx.send(WorkItem { seq, operation, job })
                .await
                .map_err(|_| self.stopped_or_crashed())?;
            submitter.next_seq += 1;
            seq
        };
        debug!(seq, operation, "work item queued");

        let reply = match self.shared.timeout {
            Some(limit) => match tokio::time::timeout(limit, result_rx).await {
                Ok(reply) => reply,
                Err(_) => {
                    warn!(seq, operation, ?limit, "caller stopped waiting for engine");
                    return Err(WorkerError::TimedOut {
                        operation: operation.to_string(),
                    });
                }
            },
            None => result_rx.await,
        };

        reply.unwrap_or_else(|_| Err(self.stopped_or_crashed()))
    }

    fn stopped_or_crashed(&self) -> WorkerError {
        self.shared.crash.error().unwrap_or(WorkerError::Stopped)
    }

    /// True once a job has panicked on the engine thread.
    pub fn is_crashed(&self) -> bool {
        self.shared.crash.crashed.load(Ordering::SeqCst)
    }

    /// The crash, if any, as the error later submissions will get.
    pub fn crash(&self) -> Option<WorkerError> {
        self.shared.crash.error()
    }

    /// True if both handles drive the same engine thread.
    pub fn same_worker(&self, other: &WorkerHandle) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Closes the queue, lets queued items finish, and joins the thread.
    pub async fn shutdown(&self) {
        self.shared.submitter.lock().await.tx = None;

        let thread = self
            .shared
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(thread) = thread else {
            return;
        };

        match tokio::task::spawn_blocking(move || thread.join()).await {
            Ok(Ok(())) => debug!("engine thread joined"),
            Ok(Err(_)) => warn!("engine thread ended with a panic"),
            Err(e) => warn!(error = %e, "failed to join engine thread"),
        }
    }
}

// =============================================================================
// Worker Startup and Loop
// =============================================================================

/// Spawns engine threads.
pub struct AffinityWorker;

impl AffinityWorker {
    /// Starts the engine thread and opens an engine on it.
    ///
    /// Returns once the engine is open, or with `Startup` if it could not be.
    pub async fn spawn(
        factory: Arc<dyn EngineFactory>,
        settings: &WorkerSettings,
    ) -> WorkerResult<WorkerHandle> {
        let (tx, rx) = mpsc::channel::<WorkItem>(settings.queue_capacity.max(1));
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), String>>();
        let crash = Arc::new(CrashState::default());

        let thread = std::thread::Builder::new()
            .name(ENGINE_THREAD_NAME.to_string())
            .spawn(move || {
                let mut engine = match factory.open() {
                    Ok(engine) => engine,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                run(engine.as_mut(), rx);
            })
            .map_err(|e| WorkerError::Startup(e.to_string()))?;

        match ready_rx.await {
            Ok(Ok(())) => {}
            Ok(Err(message)) => {
                // The thread returns right after reporting; join off the runtime.
                if let Err(e) = tokio::task::spawn_blocking(move || thread.join()).await {
                    warn!(error = %e, "failed to join engine thread after startup failure");
                }
                return Err(WorkerError::Startup(message));
            }
            Err(_) => {
                return Err(WorkerError::Startup(
                    "engine thread exited during startup".to_string(),
                ))
            }
        }

        info!(
            queue_capacity = settings.queue_capacity,
            timeout_ms = settings.submit_timeout_ms,
            "engine worker started"
        );

        Ok(WorkerHandle {
            shared: Arc::new(Shared {
                submitter: Mutex::new(Submitter {
                    next_seq: 1,
                    tx: Some(tx),
                }),
                crash,
                thread: StdMutex::new(Some(thread)),
                timeout: settings.submit_timeout(),
            }),
        })
    }
}

/// The worker loop. Owns nothing but borrows the engine for its lifetime.
fn run(engine: &mut dyn SalesEngine, mut rx: mpsc::Receiver<WorkItem>) {
    while let Some(item) = rx.blocking_recv() {
        debug!(seq = item.seq, operation = item.operation, "executing work item");
        match (item.job)(&mut *engine) {
            JobOutcome::Completed => {}
            JobOutcome::Panicked => {
                error!(
                    seq = item.seq,
                    operation = item.operation,
                    "engine call panicked; worker loop stopped"
                );
                break;
            }
        }
    }
    debug!("engine worker loop finished");
}
