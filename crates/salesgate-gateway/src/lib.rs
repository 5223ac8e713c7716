//! # salesgate-gateway: Session and Scheduling Layer
//!
//! Turns a single-threaded, stateful sales engine into something many async
//! callers can share safely.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Salesgate Data Flow                              │
//! │                                                                         │
//! │  HTTP handler / CLI                                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 salesgate-gateway (THIS CRATE)                  │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │ SalesGateway  │    │SessionManager │    │AffinityWorker│  │   │
//! │  │   │ (gateway.rs)  │───►│ (session.rs)  │───►│ (worker.rs)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ numbering     │    │ state machine │    │ one OS thread│  │   │
//! │  │   │ listing       │    │ Ready gate    │    │ FIFO queue   │  │   │
//! │  │   │ assembler     │    │ snapshot      │    │ crash latch  │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────┬───────┘  │   │
//! │  │                                                    │          │   │
//! │  └────────────────────────────────────────────────────┼──────────┘   │
//! │                                                       ▼              │
//! │                                      salesgate-engine (SalesEngine)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - `GatewayConfig` (defaults → TOML → environment)
//! - [`error`] - `GatewayError` and `ErrorCode`
//! - [`worker`] - The affinity worker
//! - [`session`] - Session lifecycle and gated execution
//! - [`numbering`] - Next number and reverse scan
//! - [`listing`] - Recent-documents listing
//! - [`assembler`] - Create / get / delete
//! - [`gateway`] - The facade
//! - [`response`] - `ApiResponse` envelope
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use salesgate_engine::MemoryStore;
//! use salesgate_gateway::{GatewayConfig, SalesGateway};
//!
//! let gateway = SalesGateway::new(GatewayConfig::default(), Arc::new(MemoryStore::new()));
//! gateway.initialize("Sage50c", "DEMO", false).await?;
//! let next = gateway.next_number("FS", "A").await?;
//! gateway.terminate().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod assembler;
pub mod config;
pub mod error;
pub mod gateway;
pub mod listing;
pub mod numbering;
pub mod response;
pub mod session;
pub mod worker;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{EngineSettings, GatewayConfig, ListingSettings, WorkerSettings};
pub use error::{ErrorCode, GatewayError, GatewayResult};
pub use gateway::SalesGateway;
pub use listing::{ListQuery, RecentDocuments};
pub use numbering::{ScanReport, ScanResult, ScanWindow};
pub use response::{ApiError, ApiResponse};
pub use session::{InitOutcome, SessionState, SessionStatus, TerminateOutcome};
pub use worker::{WorkerError, ENGINE_THREAD_NAME};
