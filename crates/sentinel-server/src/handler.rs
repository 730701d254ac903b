//! The credential request pipeline.
//!
//! Transport-independent: the local TCP server, the Unix-socket server,
//! and the Lambda front-end all funnel into [`handle_credential_request`].
//!
//! ```text
//! AUTH → RATE_LIMIT → POLICY_LOAD → POLICY_EVAL
//!      ├─ allow → REVOCATION → CAP → ISSUE → LOG → TOUCH → 200
//!      ├─ deny  → APPROVAL_LOOKUP → BREAKGLASS_LOOKUP
//!      │         ├─ override found → REVOCATION → CAP → ISSUE → LOG → TOUCH → 200
//!      │         └─ none → LOG → 403
//!      └─ other non-allow → LOG → 403
//! ```

use std::time::Duration;

use jiff::Timestamp;
use serde::Serialize;

use sentinel_audit::entries::DecisionEntry;
use sentinel_core::identity;
use sentinel_core::models::approval::ApprovalRecord;
use sentinel_core::models::breakglass::BreakGlassEvent;
use sentinel_core::policy::{evaluate, AccessMode, Decision, Effect, EvalRequest};
use sentinel_core::time;
use sentinel_store::approval as approval_store;
use sentinel_store::breakglass as breakglass_store;
use sentinel_store::session::is_session_revoked;
use sentinel_sts::IssueRequest;

use crate::auth::token_matches;
use crate::error::ApiError;
use crate::ratelimit::RateDecision;
use crate::state::ServerState;

/// Success body: the AWS credential_process JSON contract. Field names
/// are load-bearing; do not rename.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialsBody {
    #[serde(rename = "AccessKeyId")]
    pub access_key_id: String,
    #[serde(rename = "SecretAccessKey")]
    pub secret_access_key: String,
    #[serde(rename = "Token")]
    pub token: String,
    /// ISO8601 UTC.
    #[serde(rename = "Expiration")]
    pub expiration: String,
}

enum Override {
    None,
    Approval(ApprovalRecord),
    BreakGlass(BreakGlassEvent),
}

/// Run one request through the full decision pipeline.
pub async fn handle_credential_request(
    state: &ServerState,
    auth_header: Option<&str>,
    rate_key: &str,
) -> Result<CredentialsBody, ApiError> {
    if !token_matches(auth_header, &state.auth_token) {
        return Err(ApiError::InvalidToken);
    }

    let rate = state.limiter.check(rate_key);
    if let RateDecision::Limited { .. } = rate {
        return Err(ApiError::RateLimited {
            retry_after_secs: rate.retry_after_secs(),
        });
    }

    let now = Timestamp::now();

    let policy = state.policies.load(&state.policy_name).await.map_err(|e| {
        tracing::error!(policy = %state.policy_name, error = %e, "policy load failed");
        ApiError::PolicyLoad
    })?;

    let decision = evaluate(
        &policy,
        &EvalRequest {
            user: state.user.clone(),
            profile: state.profile.clone(),
            time: now,
            mode: AccessMode::Server,
        },
    );

    let active_override = if decision.effect == Effect::Allow {
        Override::None
    } else {
        match lookup_override(state, now).await {
            Some(found) => found,
            None => {
                log_denied(state, &decision).await;
                return Err(ApiError::PolicyDenied);
            }
        }
    };

    check_revocation(state).await?;

    let duration = final_duration(state, &decision, &active_override, now)
        .ok_or(ApiError::PolicyDenied)?;

    let request_id = identity::new_request_id();
    let approval_id = match &active_override {
        Override::Approval(record) => Some(record.id.clone()),
        _ => None,
    };

    let issued = state
        .issuer
        .issue(IssueRequest {
            role_arn: state.role_arn.clone(),
            user: state.user.clone(),
            session_duration: duration,
            external_id: state.external_id.clone(),
            request_id: Some(request_id.clone()),
            approval_id: approval_id.clone(),
        })
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "credential issuance failed");
            ApiError::Issuance
        })?;

    let mut entry = decision_entry(state, &decision);
    entry.request_id = Some(request_id);
    entry.source_identity = Some(issued.source_identity.clone());
    entry.role_arn = Some(state.role_arn.clone());
    entry.session_duration_seconds = Some(duration.as_secs());
    entry.approved_request_id = approval_id;
    if let Override::BreakGlass(event) = &active_override {
        entry.break_glass_event_id = Some(event.id.clone());
    }
    state.audit.log_decision(entry).await;

    touch_session(state).await;

    Ok(CredentialsBody {
        access_key_id: issued.access_key_id,
        secret_access_key: issued.secret_access_key,
        token: issued.session_token,
        expiration: time::format_iso8601(issued.expiration),
    })
}

/// On a non-allow decision: an approved request is checked first,
/// break-glass only if no approval exists. Neither re-evaluates the rule.
async fn lookup_override(state: &ServerState, now: Timestamp) -> Option<Override> {
    match approval_store::find_usable(
        state.approvals.as_ref(),
        &state.user,
        &state.profile,
        now,
    )
    .await
    {
        Ok(Some(record)) => return Some(Override::Approval(record)),
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(error = %e, "approval lookup failed");
        }
    }

    match breakglass_store::find_active(
        state.break_glass.as_ref(),
        &state.user,
        &state.profile,
        now,
    )
    .await
    {
        Ok(Some(event)) => Some(Override::BreakGlass(event)),
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(error = %e, "break-glass lookup failed");
            None
        }
    }
}

/// A revoked or expired session is fail-closed; a store error is
/// fail-open — availability wins over strict closure on a transient
/// outage.
async fn check_revocation(state: &ServerState) -> Result<(), ApiError> {
    let Some(session) = &state.session else {
        return Ok(());
    };

    match is_session_revoked(session.store.as_ref(), &session.id).await {
        Ok(true) => {
            tracing::warn!(session_id = %session.id, "refusing revoked session");
            Err(ApiError::SessionRevoked)
        }
        Ok(false) => Ok(()),
        Err(e) => {
            tracing::warn!(session_id = %session.id, error = %e, "revocation check failed, continuing");
            Ok(())
        }
    }
}

/// Smallest-wins duration capping: requested → rule cap (if any) →
/// break-glass remaining time (override path). `None` means nothing
/// positive is left to issue.
fn final_duration(
    state: &ServerState,
    decision: &Decision,
    active_override: &Override,
    now: Timestamp,
) -> Option<Duration> {
    let mut duration = state.session_duration;

    if decision.max_server_duration > 0 {
        duration = duration.min(Duration::from_secs(decision.max_server_duration));
    }

    if let Override::BreakGlass(event) = active_override {
        duration = duration.min(event.remaining_duration(now));
    }

    (!duration.is_zero()).then_some(duration)
}

fn decision_entry(state: &ServerState, decision: &Decision) -> DecisionEntry {
    DecisionEntry {
        timestamp: time::now_iso8601(),
        user: state.user.clone(),
        profile: state.profile.clone(),
        effect: decision.effect,
        rule: decision.matched_rule.clone(),
        rule_index: decision.rule_index,
        reason: decision.reason.clone(),
        policy_path: state.policy_path.clone(),
        request_id: None,
        source_identity: None,
        role_arn: None,
        session_duration_seconds: None,
        approved_request_id: None,
        break_glass_event_id: None,
        device_posture: None,
    }
}

async fn log_denied(state: &ServerState, decision: &Decision) {
    state.audit.log_decision(decision_entry(state, decision)).await;
}

/// Best-effort issuance bookkeeping; failures never block the response.
async fn touch_session(state: &ServerState) {
    let Some(session) = &state.session else {
        return;
    };
    if let Err(e) = session.store.touch(&session.id).await {
        tracing::warn!(session_id = %session.id, error = %e, "session touch failed");
    }
}
