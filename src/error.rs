//! Error types for Skyquery
//!
//! Centralized error handling using thiserror. Component-level errors
//! (`BackendError`, `RegistryError`, `LlmError`) live next to the code that
//! raises them and convert into `SkyqueryError` at the crate boundary.

use thiserror::Error;

use crate::backend::BackendError;
use crate::llm::LlmError;
use crate::tools::RegistryError;

/// All error types that can escape a Skyquery operation
#[derive(Debug, Error)]
pub enum SkyqueryError {
    /// Missing credential or invalid configuration, fatal at startup
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Environment activation failed
    #[error("Environment error: {0}")]
    Environment(String),

    /// Reasoning engine transport failure
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Tool registry misuse (duplicate registration)
    #[error("Tool error: {0}")]
    Tool(#[from] RegistryError),

    /// Backend failure outside the tool boundary
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for Skyquery operations
pub type Result<T> = std::result::Result<T, SkyqueryError>;
