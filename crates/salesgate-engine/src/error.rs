//! # Engine Error Types
//!
//! Faults reported by the engine, before the gateway attaches operation
//! context to them.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  Engine call fails inside a worker submission                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  EngineError (this module)                                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  GatewayError (salesgate-gateway) ← operation name + document key      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ApiResponse { success: false, error: { code, message } }              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Engine operation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A call was made before `initialize` or after `terminate`.
    #[error("Engine session is not open")]
    NotInitialized,

    /// The engine refused to open a session.
    ///
    /// ## When This Occurs
    /// - Unknown company
    /// - Licence / product code rejected
    /// - Company database locked by another process
    #[error("Engine initialization failed: {0}")]
    InitFailed(String),

    /// The engine could not be opened on the worker thread at all.
    #[error("Engine could not be opened: {0}")]
    OpenFailed(String),

    /// A load targeted a document that does not exist.
    #[error("Document not found: {0}")]
    NotFound(String),

    /// Save rejected: another document already has this key.
    #[error("Document already exists: {0}")]
    DuplicateKey(String),

    /// A draft-building call was made with no draft open.
    #[error("No draft transaction is open")]
    NoOpenDraft,

    /// Anything else the engine threw.
    #[error("Engine fault: {0}")]
    Fault(String),
}

impl EngineError {
    /// Creates a Fault error from any message.
    pub fn fault(message: impl Into<String>) -> Self {
        EngineError::Fault(message.into())
    }

    /// Creates a DuplicateKey error for a document id.
    pub fn duplicate(id: impl Into<String>) -> Self {
        EngineError::DuplicateKey(id.into())
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
