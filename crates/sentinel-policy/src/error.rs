use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("policy not found: {0}")]
    NotFound(String),

    #[error("parameter store error: {0}")]
    Source(String),

    #[error("malformed policy document: {0}")]
    Parse(#[from] serde_json::Error),
}
