use thiserror::Error;

#[derive(Debug, Error)]
pub enum StsError {
    #[error("invalid issue request: {0}")]
    Validation(String),

    #[error("identity error: {0}")]
    Identity(#[from] sentinel_core::error::CoreError),

    #[error("STS AssumeRole failed: {0}")]
    AssumeRole(String),

    #[error("malformed STS response: {0}")]
    MalformedResponse(String),
}
