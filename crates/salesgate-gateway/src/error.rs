//! # Gateway Error Types
//!
//! The error taxonomy every facade operation reports.
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Gateway Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │    Session      │  │    Request      │  │       Engine            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  NotInitialized │  │  Validation     │  │  NumberConflict  (retry)│ │
//! │  │  AlreadyInit... │  │  NotFound       │  │  CurrencyNotFound       │ │
//! │  │  SessionBusy    │  │                 │  │  PersistFailure         │ │
//! │  │  Degraded       │  │                 │  │  EngineFault            │ │
//! │  │                 │  │                 │  │  OutcomeUnknown         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐                                                   │
//! │  │  Configuration  │  InvalidConfig, ConfigLoadFailed,                 │
//! │  │                 │  ConfigSaveFailed                                 │
//! │  └─────────────────┘                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use salesgate_core::{DocumentKey, ValidationError};
use salesgate_engine::EngineError;

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Gateway error type covering every failure a caller can observe.
#[derive(Debug, Error)]
pub enum GatewayError {
    // =========================================================================
    // Session Errors
    // =========================================================================
    /// No session is open.
    #[error("Gateway is not initialized")]
    NotInitialized,

    /// Another initialize (or a terminate racing it) is in progress.
    #[error("Initialization already in progress")]
    AlreadyInitializing,

    /// The session is terminating.
    #[error("Session is busy: {0}")]
    SessionBusy(String),

    /// The session hit an unrecoverable engine fault. Only `terminate` helps.
    #[error("Session degraded: {reason}. Terminate and initialize again.")]
    Degraded { reason: String },

    // =========================================================================
    // Request Errors
    // =========================================================================
    /// The request failed validation; nothing was submitted to the engine.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The key does not exist.
    #[error("Document {key} not found")]
    NotFound { key: DocumentKey },

    // =========================================================================
    // Engine Errors
    // =========================================================================
    /// The engine rejected the save because the number is already taken.
    #[error("Document number {key} is already taken; retry to allocate a new one")]
    NumberConflict { key: DocumentKey },

    #[error("Currency '{currency_id}' not found")]
    CurrencyNotFound { currency_id: String },

    /// The engine declined the commit. The draft was discarded.
    #[error("Engine declined to save document {key}")]
    PersistFailure { key: DocumentKey },

    /// The engine raised during an operation.
    #[error("Engine fault during {operation}{}: {message}", key_suffix(.key))]
    EngineFault {
        operation: String,
        key: Option<DocumentKey>,
        message: String,
    },

    /// The caller stopped waiting. The operation may still complete.
    #[error("Timed out waiting for {operation}; its outcome is unknown")]
    OutcomeUnknown { operation: String },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid gateway configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),
}

fn key_suffix(key: &Option<DocumentKey>) -> String {
    key.as_ref().map(|k| format!(" on {}", k)).unwrap_or_default()
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        GatewayError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for GatewayError {
    fn from(err: toml::de::Error) -> Self {
        GatewayError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for GatewayError {
    fn from(err: toml::ser::Error) -> Self {
        GatewayError::ConfigSaveFailed(err.to_string())
    }
}

impl GatewayError {
    /// Wraps an engine error with the operation (and key) it happened in,
    /// and logs it.
    ///
    /// ## Mapping
    /// ```text
    /// EngineError::NotInitialized  → NotInitialized
    /// EngineError::DuplicateKey    → NumberConflict   (needs a key)
    /// EngineError::NotFound        → NotFound         (needs a key)
    /// anything else                → EngineFault
    /// ```
    pub fn from_engine(operation: &str, key: Option<&DocumentKey>, err: EngineError) -> Self {
        match (err, key) {
            (EngineError::NotInitialized, _) => GatewayError::NotInitialized,
            (EngineError::DuplicateKey(_), Some(key)) => GatewayError::NumberConflict { key: key.clone() },
            (EngineError::NotFound(_), Some(key)) => GatewayError::NotFound { key: key.clone() },
            (err, key) => {
                error!(operation, key = ?key.map(|k| k.to_string()), error = %err, "engine fault");
                GatewayError::EngineFault {
                    operation: operation.to_string(),
                    key: key.cloned(),
                    message: err.to_string(),
                }
            }
        }
    }

    /// Returns true if the same request may succeed when simply retried.
    ///
    /// Only numbering collisions qualify: a retry allocates a fresh number.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::NumberConflict { .. })
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            GatewayError::InvalidConfig(_)
                | GatewayError::ConfigLoadFailed(_)
                | GatewayError::ConfigSaveFailed(_)
        )
    }

    /// Machine-readable code for the response envelope.
    pub fn code(&self) -> ErrorCode {
        match self {
            GatewayError::NotInitialized => ErrorCode::NotInitialized,
            GatewayError::AlreadyInitializing => ErrorCode::AlreadyInitializing,
            GatewayError::SessionBusy(_) => ErrorCode::SessionBusy,
            GatewayError::Degraded { .. } => ErrorCode::Degraded,
            GatewayError::Validation(_) => ErrorCode::ValidationError,
            GatewayError::NotFound { .. } => ErrorCode::NotFound,
            GatewayError::NumberConflict { .. } => ErrorCode::NumberConflict,
            GatewayError::CurrencyNotFound { .. } => ErrorCode::CurrencyNotFound,
            GatewayError::PersistFailure { .. } => ErrorCode::PersistFailure,
            GatewayError::EngineFault { .. } => ErrorCode::EngineFault,
            GatewayError::OutcomeUnknown { .. } => ErrorCode::OutcomeUnknown,
            GatewayError::InvalidConfig(_)
            | GatewayError::ConfigLoadFailed(_)
            | GatewayError::ConfigSaveFailed(_) => ErrorCode::ConfigError,
        }
    }
}

/// Error codes for programmatic handling by the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotInitialized,
    AlreadyInitializing,
    SessionBusy,
    Degraded,
    ValidationError,
    NotFound,
    NumberConflict,
    CurrencyNotFound,
    PersistFailure,
    EngineFault,
    OutcomeUnknown,
    ConfigError,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> DocumentKey {
        DocumentKey::new("A", "FS", 9.0)
    }

    #[test]
    fn test_retryable_errors() {
        assert!(GatewayError::NumberConflict { key: key() }.is_retryable());

        assert!(!GatewayError::PersistFailure { key: key() }.is_retryable());
        assert!(!GatewayError::NotInitialized.is_retryable());
        assert!(!GatewayError::OutcomeUnknown { operation: "create".into() }.is_retryable());
    }

    #[test]
    fn test_engine_mapping() {
        let k = key();
        assert!(matches!(
            GatewayError::from_engine("create", Some(&k), EngineError::duplicate("A-FS-9")),
            GatewayError::NumberConflict { .. }
        ));
        assert!(matches!(
            GatewayError::from_engine("get", Some(&k), EngineError::NotFound("A-FS-9".into())),
            GatewayError::NotFound { .. }
        ));
        assert!(matches!(
            GatewayError::from_engine("status", None, EngineError::NotInitialized),
            GatewayError::NotInitialized
        ));

        let err = GatewayError::from_engine("get", Some(&k), EngineError::fault("COM error"));
        assert_eq!(err.code(), ErrorCode::EngineFault);
        assert_eq!(err.to_string(), "Engine fault during get on A-FS-9: Engine fault: COM error");
    }

    #[test]
    fn test_error_code_wire_format() {
        let json = serde_json::to_string(&ErrorCode::NumberConflict).unwrap();
        assert_eq!(json, "\"NUMBER_CONFLICT\"");
        assert_eq!(
            GatewayError::from(ValidationError::EmptyDocument).code(),
            ErrorCode::ValidationError
        );
    }
}
