//! Typed audit entries.
//!
//! One entry per line in the audit log. Field names are snake_case and
//! optional fields are omitted when empty, so a decision line without an
//! override carries no `approved_request_id` / `break_glass_event_id` keys.

use serde::{Deserialize, Serialize};

use sentinel_core::models::breakglass::{BreakGlassStatus, ReasonCode};
use sentinel_core::policy::Effect;

/// One policy decision, optionally with the credential-issuance context
/// when the decision led to an STS call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionEntry {
    /// ISO8601 UTC.
    pub timestamp: String,
    pub user: String,
    pub profile: String,
    pub effect: Effect,
    /// Matched rule name, empty for default-deny.
    pub rule: String,
    pub rule_index: i32,
    pub reason: String,
    pub policy_path: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub source_identity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub role_arn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub session_duration_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub approved_request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub break_glass_event_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub device_posture: Option<String>,
}

/// Approval lifecycle event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalEntry {
    pub timestamp: String,
    pub event: ApprovalEventKind,
    /// The approval's 16-hex id.
    pub request_id: String,
    pub requester: String,
    pub profile: String,
    pub status: String,
    /// Who performed the transition (requester, approver, or `system`).
    pub actor: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub justification: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub duration_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub approver: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub approver_comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub auto_approved: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalEventKind {
    #[serde(rename = "request.created")]
    Created,
    #[serde(rename = "request.approved")]
    Approved,
    #[serde(rename = "request.denied")]
    Denied,
    #[serde(rename = "request.expired")]
    Expired,
    #[serde(rename = "request.cancelled")]
    Cancelled,
}

/// Break-glass lifecycle event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakGlassEntry {
    pub timestamp: String,
    pub event: BreakGlassEventKind,
    /// The event's 16-hex id.
    pub event_id: String,
    /// The 8-hex id correlating with CloudTrail.
    pub request_id: String,
    pub invoker: String,
    pub profile: String,
    pub reason_code: ReasonCode,
    pub justification: String,
    pub status: BreakGlassStatus,
    pub duration_seconds: u64,
    /// ISO8601 UTC.
    pub expires_at: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub closed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub closed_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakGlassEventKind {
    #[serde(rename = "breakglass.invoked")]
    Invoked,
    #[serde(rename = "breakglass.closed")]
    Closed,
    #[serde(rename = "breakglass.expired")]
    Expired,
}

/// Sum over the known entry kinds, with an opaque arm so a verifier built
/// today can still check envelopes around entry kinds added later.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuditEntry {
    Decision(DecisionEntry),
    Approval(ApprovalEntry),
    BreakGlass(BreakGlassEntry),
    Opaque(serde_json::Value),
}

impl From<DecisionEntry> for AuditEntry {
    fn from(entry: DecisionEntry) -> Self {
        AuditEntry::Decision(entry)
    }
}

impl From<ApprovalEntry> for AuditEntry {
    fn from(entry: ApprovalEntry) -> Self {
        AuditEntry::Approval(entry)
    }
}

impl From<BreakGlassEntry> for AuditEntry {
    fn from(entry: BreakGlassEntry) -> Self {
        AuditEntry::BreakGlass(entry)
    }
}
