use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub const MIN_JUSTIFICATION_LEN: usize = 20;
pub const MAX_JUSTIFICATION_LEN: usize = 1000;

/// A time-boxed emergency access event outside normal policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakGlassEvent {
    /// 16 lowercase hex characters, distinct from the request id.
    pub id: String,
    pub invoker: String,
    pub profile: String,
    pub reason_code: ReasonCode,
    pub justification: String,
    /// Requested emergency window, in seconds.
    pub duration_secs: u64,
    pub status: BreakGlassStatus,
    pub created_at: jiff::Timestamp,
    pub expires_at: jiff::Timestamp,
    /// 8-hex id correlating the event with CloudTrail.
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub closed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub closed_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    Incident,
    Maintenance,
    Security,
    Recovery,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakGlassStatus {
    Active,
    Closed,
    Expired,
}

impl BreakGlassEvent {
    /// Time left in the emergency window: `max(0, expires_at - now)`.
    pub fn remaining_duration(&self, now: jiff::Timestamp) -> Duration {
        if now >= self.expires_at {
            return Duration::ZERO;
        }
        self.expires_at
            .duration_since(now)
            .unsigned_abs()
    }

    pub fn is_active(&self, now: jiff::Timestamp) -> bool {
        self.status == BreakGlassStatus::Active && self.expires_at > now
    }
}

/// Enforce the 20–1000 character justification bound.
pub fn validate_justification(justification: &str) -> Result<(), CoreError> {
    let len = justification.chars().count();
    if len < MIN_JUSTIFICATION_LEN {
        return Err(CoreError::InvalidJustification(format!(
            "{len} characters; at least {MIN_JUSTIFICATION_LEN} required"
        )));
    }
    if len > MAX_JUSTIFICATION_LEN {
        return Err(CoreError::InvalidJustification(format!(
            "{len} characters; at most {MAX_JUSTIFICATION_LEN} allowed"
        )));
    }
    Ok(())
}
