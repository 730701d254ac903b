use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid user: {0}")]
    InvalidUser(String),

    #[error("invalid request id: {0}")]
    InvalidRequestId(String),

    #[error("invalid approval id: {0}")]
    InvalidApprovalId(String),

    #[error("malformed source identity: {0}")]
    MalformedSourceIdentity(String),

    #[error("invalid justification: {0}")]
    InvalidJustification(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
