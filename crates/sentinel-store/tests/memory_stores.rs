use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use jiff::Timestamp;
use sentinel_audit::writer::{AuditWriter, JsonLinesWriter, NoopWriter};
use sentinel_core::models::approval::{ApprovalRecord, ApprovalStatus};
use sentinel_core::models::breakglass::ReasonCode;
use sentinel_core::models::session::SessionStatus;
use sentinel_store::error::StoreError;
use sentinel_store::session::{
    expire, is_session_revoked, new_session, revoke, MemorySessionStore, SessionStore,
};
use sentinel_store::approval::ApprovalStore;
use sentinel_store::{approval, breakglass};

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    fn lines(&self) -> Vec<serde_json::Value> {
        String::from_utf8(self.0.lock().unwrap().clone())
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn touch_bumps_count_and_last_access() {
    let store = MemorySessionStore::new();
    let session = new_session("alice", "production", "srv-1", Duration::from_secs(900));
    let id = session.id.clone();
    store.create(session).await.unwrap();

    store.touch(&id).await.unwrap();
    store.touch(&id).await.unwrap();
    store.touch(&id).await.unwrap();

    let touched = store.get(&id).await.unwrap().unwrap();
    assert_eq!(touched.request_count, 3);
    assert!(touched.last_access_at >= touched.started_at);
    assert_eq!(touched.status, SessionStatus::Active);
}

#[tokio::test]
async fn revoked_is_terminal() {
    let store = MemorySessionStore::new();
    let session = new_session("alice", "production", "srv-1", Duration::from_secs(900));
    let id = session.id.clone();
    store.create(session).await.unwrap();

    assert!(!is_session_revoked(&store, &id).await.unwrap());

    revoke(&store, &id, "secops", "incident cleanup").await.unwrap();
    assert!(is_session_revoked(&store, &id).await.unwrap());

    let revoked = store.get(&id).await.unwrap().unwrap();
    assert_eq!(revoked.status, SessionStatus::Revoked);
    assert_eq!(revoked.revoked_by.as_deref(), Some("secops"));

    // No transition out of a terminal state.
    let mut resurrect = revoked.clone();
    resurrect.status = SessionStatus::Active;
    let err = store.update(resurrect).await.unwrap_err();
    assert!(matches!(err, StoreError::TerminalState { .. }));
}

#[tokio::test]
async fn expire_is_idempotent_and_respects_revocation() {
    let store = MemorySessionStore::new();
    let session = new_session("alice", "production", "srv-1", Duration::from_secs(900));
    let id = session.id.clone();
    store.create(session).await.unwrap();

    expire(&store, &id).await.unwrap();
    assert_eq!(
        store.get(&id).await.unwrap().unwrap().status,
        SessionStatus::Expired
    );

    // Already terminal: expire again is a no-op, not an error.
    expire(&store, &id).await.unwrap();

    // Missing session: also a no-op.
    expire(&store, "0000000000000000").await.unwrap();
}

#[tokio::test]
async fn touch_on_terminal_session_is_ignored() {
    let store = MemorySessionStore::new();
    let session = new_session("alice", "production", "srv-1", Duration::from_secs(900));
    let id = session.id.clone();
    store.create(session).await.unwrap();
    revoke(&store, &id, "secops", "test").await.unwrap();

    store.touch(&id).await.unwrap();
    assert_eq!(store.get(&id).await.unwrap().unwrap().request_count, 0);
}

#[tokio::test]
async fn missing_session_is_not_revoked() {
    let store = MemorySessionStore::new();
    assert!(!is_session_revoked(&store, "0000000000000000").await.unwrap());
}

#[tokio::test]
async fn find_active_by_server_instance_skips_terminal() {
    let store = MemorySessionStore::new();
    let session = new_session("alice", "production", "srv-1", Duration::from_secs(900));
    let id = session.id.clone();
    store.create(session).await.unwrap();

    let found = store.find_active_by_server_instance("srv-1").await.unwrap();
    assert_eq!(found.map(|s| s.id), Some(id.clone()));

    revoke(&store, &id, "secops", "test").await.unwrap();
    assert!(store
        .find_active_by_server_instance("srv-1")
        .await
        .unwrap()
        .is_none());
}

// ---------------------------------------------------------------------------
// Approvals
// ---------------------------------------------------------------------------

#[tokio::test]
async fn approval_lifecycle_is_audited() {
    let store = approval::MemoryApprovalStore::new();
    let buf = SharedBuf::default();
    let audit = JsonLinesWriter::new(buf.clone());

    let record = approval::create_request(
        &store,
        &audit,
        "alice",
        "production",
        "deploy hotfix for the payments incident",
        Duration::from_secs(3600),
        Duration::from_secs(7200),
    )
    .await
    .unwrap();
    assert_eq!(record.status, ApprovalStatus::Pending);
    assert_eq!(record.id.len(), 16);

    let approved = approval::approve(&store, &audit, &record.id, "bob", Some("ok"))
        .await
        .unwrap();
    assert_eq!(approved.status, ApprovalStatus::Approved);
    assert_eq!(approved.approver.as_deref(), Some("bob"));

    let lines = buf.lines();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["event"], "request.created");
    assert_eq!(lines[0]["actor"], "alice");
    assert_eq!(lines[1]["event"], "request.approved");
    assert_eq!(lines[1]["approver"], "bob");
}

#[tokio::test]
async fn only_approved_and_unexpired_is_usable() {
    let store = approval::MemoryApprovalStore::new();
    let now = Timestamp::now();

    let record = approval::create_request(
        &store,
        &NoopWriter,
        "alice",
        "production",
        "routine maintenance window access",
        Duration::from_secs(3600),
        Duration::from_secs(7200),
    )
    .await
    .unwrap();

    // Pending is not usable.
    assert!(approval::find_usable(&store, "alice", "production", now)
        .await
        .unwrap()
        .is_none());

    approval::approve(&store, &NoopWriter, &record.id, "bob", None)
        .await
        .unwrap();
    let found = approval::find_usable(&store, "alice", "production", now)
        .await
        .unwrap();
    assert_eq!(found.map(|r| r.id), Some(record.id.clone()));

    // Different profile: not usable.
    assert!(approval::find_usable(&store, "alice", "staging", now)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn earliest_expiring_approval_wins() {
    let store = approval::MemoryApprovalStore::new();
    let now = Timestamp::now();

    let mut long = ApprovalRecord {
        id: "aaaaaaaaaaaaaaaa".to_string(),
        requester: "alice".to_string(),
        profile: "production".to_string(),
        status: ApprovalStatus::Approved,
        duration_secs: 3600,
        created_at: now,
        expires_at: now.saturating_add(Duration::from_secs(7200)).unwrap(),
        justification: "first approval with a long window".to_string(),
        approver: Some("bob".to_string()),
        approver_comment: None,
    };
    store.put(long.clone()).await.unwrap();

    long.id = "bbbbbbbbbbbbbbbb".to_string();
    long.expires_at = now.saturating_add(Duration::from_secs(600)).unwrap();
    store.put(long).await.unwrap();

    let found = approval::find_usable(&store, "alice", "production", now)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, "bbbbbbbbbbbbbbbb");
}

#[tokio::test]
async fn expire_overdue_approvals_sweeps_and_audits() {
    let store = approval::MemoryApprovalStore::new();
    let buf = SharedBuf::default();
    let audit = JsonLinesWriter::new(buf.clone());
    let now = Timestamp::now();

    let record = ApprovalRecord {
        id: "cccccccccccccccc".to_string(),
        requester: "alice".to_string(),
        profile: "production".to_string(),
        status: ApprovalStatus::Approved,
        duration_secs: 3600,
        created_at: now,
        expires_at: now,
        justification: "already past its expiry stamp".to_string(),
        approver: Some("bob".to_string()),
        approver_comment: None,
    };
    store.put(record).await.unwrap();

    let swept = approval::expire_overdue(&store, &audit, "alice", "production", now)
        .await
        .unwrap();
    assert_eq!(swept, 1);

    let lines = buf.lines();
    assert_eq!(lines[0]["event"], "request.expired");
    assert_eq!(lines[0]["actor"], "system");
    assert_eq!(
        store.get("cccccccccccccccc").await.unwrap().unwrap().status,
        ApprovalStatus::Expired
    );
}

// ---------------------------------------------------------------------------
// Break-glass
// ---------------------------------------------------------------------------

#[tokio::test]
async fn break_glass_invoke_assigns_ids_and_audits() {
    let store = breakglass::MemoryBreakGlassStore::new();
    let buf = SharedBuf::default();
    let audit = JsonLinesWriter::new(buf.clone());

    let event = breakglass::invoke(
        &store,
        &audit,
        "Alice",
        "production",
        ReasonCode::Incident,
        "database failover requires manual intervention",
        Duration::from_secs(900),
    )
    .await
    .unwrap();

    assert_eq!(event.invoker, "alice");
    assert_eq!(event.id.len(), 16);
    assert_eq!(event.request_id.len(), 8);
    assert_ne!(event.id, event.request_id);

    let lines = buf.lines();
    assert_eq!(lines[0]["event"], "breakglass.invoked");
    assert_eq!(lines[0]["event_id"], event.id.as_str());
    assert_eq!(lines[0]["request_id"], event.request_id.as_str());
    assert_eq!(lines[0]["reason_code"], "incident");
}

#[tokio::test]
async fn break_glass_rejects_short_justification() {
    let store = breakglass::MemoryBreakGlassStore::new();
    let err = breakglass::invoke(
        &store,
        &NoopWriter,
        "alice",
        "production",
        ReasonCode::Other,
        "too short",
        Duration::from_secs(900),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
}

#[tokio::test]
async fn close_records_who_and_why() {
    let store = breakglass::MemoryBreakGlassStore::new();
    let buf = SharedBuf::default();
    let audit = JsonLinesWriter::new(buf.clone());

    let event = breakglass::invoke(
        &store,
        &audit,
        "alice",
        "production",
        ReasonCode::Maintenance,
        "rotating the primary database credentials",
        Duration::from_secs(900),
    )
    .await
    .unwrap();

    let closed = breakglass::close(&store, &audit, &event.id, "alice", "work complete")
        .await
        .unwrap();
    assert_eq!(closed.closed_by.as_deref(), Some("alice"));

    let lines = buf.lines();
    assert_eq!(lines[1]["event"], "breakglass.closed");
    assert_eq!(lines[1]["closed_reason"], "work complete");

    // A closed event is no longer active.
    assert!(breakglass::find_active(&store, "alice", "production", Timestamp::now())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn find_active_prefers_soonest_expiry() {
    let store = breakglass::MemoryBreakGlassStore::new();

    let long = breakglass::invoke(
        &store,
        &NoopWriter,
        "alice",
        "production",
        ReasonCode::Incident,
        "first responder window for the outage",
        Duration::from_secs(3600),
    )
    .await
    .unwrap();
    let short = breakglass::invoke(
        &store,
        &NoopWriter,
        "alice",
        "production",
        ReasonCode::Incident,
        "second responder window for the outage",
        Duration::from_secs(300),
    )
    .await
    .unwrap();

    let found = breakglass::find_active(&store, "alice", "production", Timestamp::now())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, short.id);
    assert_ne!(found.id, long.id);
}
