use thiserror::Error;

/// Top-level error type for worker operations.
#[derive(Debug, Error)]
pub enum BrandwatchError {
    #[error("store error: {0}")]
    Store(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("JSON decode error: {0}")]
    JsonDecode(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("{0}")]
    Internal(String),
}

/// Result type alias for worker operations.
pub type Result<T> = std::result::Result<T, BrandwatchError>;
