//! Shared API response types

use serde::{Deserialize, Serialize};

/// Error body returned by every failing admin endpoint
///
/// ```json
/// {"error": {"code": "NOT_FOUND", "message": "Person not found: p-9"}}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
        }
    }
}
