use serde::{Deserialize, Serialize};

/// A pre-approved access request.
///
/// An approval turns a policy deny into an allow for a bounded window. Only
/// `status = approved` with `expires_at` in the future makes it usable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRecord {
    /// 16 lowercase hex characters.
    pub id: String,
    pub requester: String,
    pub profile: String,
    pub status: ApprovalStatus,
    /// Credential lifetime granted by this approval, in seconds.
    pub duration_secs: u64,
    pub created_at: jiff::Timestamp,
    pub expires_at: jiff::Timestamp,
    pub justification: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub approver: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub approver_comment: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Denied,
    Expired,
    Cancelled,
}

impl ApprovalRecord {
    /// Whether this approval can override a deny at `now`.
    pub fn is_usable(&self, now: jiff::Timestamp) -> bool {
        self.status == ApprovalStatus::Approved && self.expires_at > now
    }
}
