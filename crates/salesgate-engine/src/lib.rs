//! # salesgate-engine: The Engine Boundary
//!
//! Defines what the gateway may ask of the external sales engine, and ships
//! an in-process engine that honours the same contract.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Salesgate Data Flow                              │
//! │                                                                         │
//! │  Affinity worker thread (salesgate-gateway)                            │
//! │       │  &mut dyn SalesEngine                                           │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 salesgate-engine (THIS CRATE)                   │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │  SalesEngine  │    │ EngineFactory │    │ MemoryEngine │  │   │
//! │  │   │  (engine.rs)  │    │  (engine.rs)  │    │  (memory/)   │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ probe / load  │    │ opens one     │◄───│ MemoryStore  │  │   │
//! │  │   │ draft / save  │    │ engine per    │    │ stats+faults │  │   │
//! │  │   │               │    │ worker thread │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Thread Affinity
//!
//! `SalesEngine` is deliberately **not** `Send`. The factory is called on the
//! worker thread that will own the engine, so the handle is created, used and
//! dropped on one thread. The compiler, not a comment, keeps it there.
//!
//! ## Module Organization
//!
//! - [`engine`] - `SalesEngine`, `EngineFactory`, `DraftHeader`
//! - [`error`] - Engine error types
//! - [`memory`] - In-process engine with instrumentation and fault injection

// =============================================================================
// Module Declarations
// =============================================================================

pub mod engine;
pub mod error;
pub mod memory;

// =============================================================================
// Re-exports
// =============================================================================

pub use engine::{DraftHeader, EngineFactory, SalesEngine};
pub use error::{EngineError, EngineResult};
pub use memory::{EngineStats, FaultPlan, MemoryEngine, MemoryStore};
