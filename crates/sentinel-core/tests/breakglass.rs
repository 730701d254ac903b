use std::time::Duration;

use jiff::Timestamp;
use sentinel_core::models::breakglass::{
    validate_justification, BreakGlassEvent, BreakGlassStatus, ReasonCode,
};

fn event(expires_at: Timestamp) -> BreakGlassEvent {
    BreakGlassEvent {
        id: "00112233445566aa".to_string(),
        invoker: "alice".to_string(),
        profile: "production".to_string(),
        reason_code: ReasonCode::Incident,
        justification: "database failover requires manual intervention".to_string(),
        duration_secs: 900,
        status: BreakGlassStatus::Active,
        created_at: "2026-01-14T10:00:00Z".parse().unwrap(),
        expires_at,
        request_id: "deadbeef".to_string(),
        closed_by: None,
        closed_reason: None,
    }
}

#[test]
fn remaining_duration_before_expiry() {
    let e = event("2026-01-14T10:15:00Z".parse().unwrap());
    let now: Timestamp = "2026-01-14T10:10:00Z".parse().unwrap();
    assert_eq!(e.remaining_duration(now), Duration::from_secs(300));
}

#[test]
fn remaining_duration_is_zero_after_expiry() {
    let e = event("2026-01-14T10:15:00Z".parse().unwrap());

    let at_expiry: Timestamp = "2026-01-14T10:15:00Z".parse().unwrap();
    assert_eq!(e.remaining_duration(at_expiry), Duration::ZERO);

    let after: Timestamp = "2026-01-14T11:00:00Z".parse().unwrap();
    assert_eq!(e.remaining_duration(after), Duration::ZERO);
}

#[test]
fn active_requires_status_and_unexpired() {
    let now: Timestamp = "2026-01-14T10:10:00Z".parse().unwrap();

    let live = event("2026-01-14T10:15:00Z".parse().unwrap());
    assert!(live.is_active(now));

    let expired = event("2026-01-14T10:05:00Z".parse().unwrap());
    assert!(!expired.is_active(now));

    let mut closed = event("2026-01-14T10:15:00Z".parse().unwrap());
    closed.status = BreakGlassStatus::Closed;
    assert!(!closed.is_active(now));
}

#[test]
fn justification_length_bounds() {
    assert!(validate_justification(&"x".repeat(19)).is_err());
    assert!(validate_justification(&"x".repeat(20)).is_ok());
    assert!(validate_justification(&"x".repeat(1000)).is_ok());
    assert!(validate_justification(&"x".repeat(1001)).is_err());
}

#[test]
fn reason_codes_serialize_snake_case() {
    assert_eq!(
        serde_json::to_string(&ReasonCode::Incident).unwrap(),
        "\"incident\""
    );
    assert_eq!(
        serde_json::to_string(&ReasonCode::Recovery).unwrap(),
        "\"recovery\""
    );
}
