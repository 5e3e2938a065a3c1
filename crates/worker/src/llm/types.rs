use thiserror::Error;

/// Errors from LLM provider calls.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM HTTP error: {0}")]
    Http(String),

    #[error("LLM auth error: {0}")]
    Auth(String),

    #[error("LLM response parse error: {0}")]
    Parse(String),

    #[error("LLM call timed out after {0}s")]
    Timeout(u64),
}

impl From<LlmError> for brandwatch_common::error::BrandwatchError {
    fn from(e: LlmError) -> Self {
        brandwatch_common::error::BrandwatchError::Llm(e.to_string())
    }
}
