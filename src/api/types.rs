//! API request and response types
//!
//! The ruling request body itself is [`crate::ruling::RulingRequest`].

use serde::{Deserialize, Serialize};

/// SSE event name carrying a cumulative ruling snapshot
pub const PARTIAL_EVENT: &str = "partial";

/// SSE event name carrying an [`ErrorResponse`]; always the last event
pub const ERROR_EVENT: &str = "error";

/// Model information with metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub provider: String,
    pub description: String,
}

/// Response for model list
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelInfo>,
    pub default: String,
}

/// Error response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
