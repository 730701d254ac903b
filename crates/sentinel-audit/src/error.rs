use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("signing key too short: {0} bytes, need at least 32")]
    KeyTooShort(usize),

    #[error("signing error: {0}")]
    Signing(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("log file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CloudWatch Logs error: {0}")]
    CloudWatch(String),
}
