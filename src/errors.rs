//! Error types for the counselbot advisory core.
//!
//! Turn orchestration never lets a single stage abort the whole turn:
//! classification, extraction, retrieval, and generation failures all
//! degrade locally. Configuration errors are the one exception; they
//! indicate a deployment problem and are raised at the boundary.

use thiserror::Error;

/// Main error type for the advisory core
#[derive(Error, Debug)]
pub enum AdvisorError {
    /// Generative-model invocation failed (HTTP, timeout, bad payload)
    #[error("Model call failed: {0}")]
    ModelError(String),

    /// A structured-output response could not be parsed into its schema
    #[error("Structured output parse error: {0}")]
    StructuredOutputError(String),

    /// Named prompt template is not registered
    #[error("Prompt not found: {0}")]
    PromptNotFound(String),

    /// Vector-index or embedding failure during retrieval
    #[error("Retrieval error: {0}")]
    RetrievalError(String),

    /// Streaming errors
    #[error("Streaming error: {0}")]
    StreamingError(String),

    /// Missing or invalid deployment configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type alias for advisory operations
pub type Result<T> = std::result::Result<T, AdvisorError>;

/// Convert anyhow errors from resource-loading code
impl From<anyhow::Error> for AdvisorError {
    fn from(err: anyhow::Error) -> Self {
        AdvisorError::RetrievalError(err.to_string())
    }
}

impl AdvisorError {
    /// Configuration-class errors are the only ones allowed to abort a turn.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AdvisorError::ConfigError(_))
    }
}
