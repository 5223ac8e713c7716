//! # Response Envelope
//!
//! The shape every facade result takes on the wire.
//!
//! ```json
//! { "success": true,  "message": "Initialized", "data": { ... } }
//! { "success": false, "message": "Document A-FS-9 not found",
//!   "error": { "code": "NOT_FOUND", "message": "Document A-FS-9 not found", "retryable": false } }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, GatewayError, GatewayResult};

/// Error half of the envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,

    pub retryable: bool,
}

impl From<&GatewayError> for ApiError {
    fn from(err: &GatewayError) -> Self {
        ApiError {
            code: err.code(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

/// Uniform success/failure wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        ApiResponse {
            success: true,
            message: message.into(),
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(err: &GatewayError) -> Self {
        let error = ApiError::from(err);
        ApiResponse {
            success: false,
            message: error.message.clone(),
            data: None,
            error: Some(error),
        }
    }

    /// Wraps a facade result; `message` is used on success only.
    pub fn from_result(result: GatewayResult<T>, message: impl Into<String>) -> Self {
        match result {
            Ok(data) => ApiResponse::ok(data, message),
            Err(err) => ApiResponse::failure(&err),
        }
    }
}
