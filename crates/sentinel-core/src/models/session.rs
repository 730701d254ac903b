use serde::{Deserialize, Serialize};

/// Server-side record of an interactive credential-serving relationship,
/// independently revocable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSession {
    pub id: String,
    pub user: String,
    pub profile: String,
    pub server_instance_id: String,
    pub status: SessionStatus,
    pub started_at: jiff::Timestamp,
    pub last_access_at: jiff::Timestamp,
    pub expires_at: jiff::Timestamp,
    pub request_count: u64,
    pub created_at: jiff::Timestamp,
    pub updated_at: jiff::Timestamp,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub revoked_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub revoked_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Revoked,
    Expired,
}

impl SessionStatus {
    /// Revoked and expired are terminal; no transition leaves them.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Revoked | SessionStatus::Expired)
    }
}
