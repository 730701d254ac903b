//! Approved-request store and lifecycle.
//!
//! An approval can turn a policy deny into an allow for a bounded window.
//! Every lifecycle transition is recorded in the audit log.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use aws_sdk_s3::Client;
use jiff::Timestamp;

use sentinel_audit::entries::{ApprovalEntry, ApprovalEventKind};
use sentinel_audit::writer::AuditWriter;
use sentinel_core::identity;
use sentinel_core::models::approval::{ApprovalRecord, ApprovalStatus};
use sentinel_core::time;

use crate::error::StoreError;
use crate::{keys, objects};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Persistence contract for approval records.
pub trait ApprovalStore: Send + Sync {
    fn get(&self, id: &str) -> BoxFuture<'_, Result<Option<ApprovalRecord>, StoreError>>;

    fn put(&self, record: ApprovalRecord) -> BoxFuture<'_, Result<(), StoreError>>;

    /// All records for a (requester, profile) pair, any status.
    fn list_for(
        &self,
        requester: &str,
        profile: &str,
    ) -> BoxFuture<'_, Result<Vec<ApprovalRecord>, StoreError>>;
}

/// The approval in effect for (user, profile) at `now`, if any.
///
/// Exactly one approval may be in effect at a time; when several usable
/// records exist the earliest-expiring one is selected.
pub async fn find_usable(
    store: &dyn ApprovalStore,
    user: &str,
    profile: &str,
    now: Timestamp,
) -> Result<Option<ApprovalRecord>, StoreError> {
    let mut usable: Vec<ApprovalRecord> = store
        .list_for(user, profile)
        .await?
        .into_iter()
        .filter(|r| r.is_usable(now))
        .collect();

    usable.sort_by_key(|r| r.expires_at);
    Ok(usable.into_iter().next())
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

fn entry(record: &ApprovalRecord, event: ApprovalEventKind, actor: &str) -> ApprovalEntry {
    ApprovalEntry {
        timestamp: time::now_iso8601(),
        event,
        request_id: record.id.clone(),
        requester: record.requester.clone(),
        profile: record.profile.clone(),
        status: status_str(record.status).to_string(),
        actor: actor.to_string(),
        justification: Some(record.justification.clone()),
        duration_seconds: Some(record.duration_secs),
        approver: record.approver.clone(),
        approver_comment: record.approver_comment.clone(),
        auto_approved: None,
    }
}

fn status_str(status: ApprovalStatus) -> &'static str {
    match status {
        ApprovalStatus::Pending => "pending",
        ApprovalStatus::Approved => "approved",
        ApprovalStatus::Denied => "denied",
        ApprovalStatus::Expired => "expired",
        ApprovalStatus::Cancelled => "cancelled",
    }
}

/// Create a pending request. `valid_for` bounds how long the request (and
/// a subsequent approval) can be used.
pub async fn create_request(
    store: &dyn ApprovalStore,
    audit: &dyn AuditWriter,
    requester: &str,
    profile: &str,
    justification: &str,
    duration: Duration,
    valid_for: Duration,
) -> Result<ApprovalRecord, StoreError> {
    let now = Timestamp::now();
    let record = ApprovalRecord {
        id: identity::new_event_id(),
        requester: requester.to_string(),
        profile: profile.to_string(),
        status: ApprovalStatus::Pending,
        duration_secs: duration.as_secs(),
        created_at: now,
        expires_at: now.saturating_add(valid_for).expect("std::time::Duration cannot overflow jiff Timestamp arithmetic"),
        justification: justification.to_string(),
        approver: None,
        approver_comment: None,
    };

    store.put(record.clone()).await?;
    audit
        .log_approval(entry(&record, ApprovalEventKind::Created, requester))
        .await;
    Ok(record)
}

async fn transition(
    store: &dyn ApprovalStore,
    audit: &dyn AuditWriter,
    id: &str,
    next: ApprovalStatus,
    event: ApprovalEventKind,
    actor: &str,
    approver_comment: Option<&str>,
) -> Result<ApprovalRecord, StoreError> {
    let Some(mut record) = store.get(id).await? else {
        return Err(StoreError::NotFound {
            key: keys::approval(id),
        });
    };

    record.status = next;
    if matches!(event, ApprovalEventKind::Approved | ApprovalEventKind::Denied) {
        record.approver = Some(actor.to_string());
        record.approver_comment = approver_comment.map(str::to_string);
    }

    store.put(record.clone()).await?;
    audit.log_approval(entry(&record, event, actor)).await;
    Ok(record)
}

pub async fn approve(
    store: &dyn ApprovalStore,
    audit: &dyn AuditWriter,
    id: &str,
    approver: &str,
    comment: Option<&str>,
) -> Result<ApprovalRecord, StoreError> {
    transition(
        store,
        audit,
        id,
        ApprovalStatus::Approved,
        ApprovalEventKind::Approved,
        approver,
        comment,
    )
    .await
}

pub async fn deny(
    store: &dyn ApprovalStore,
    audit: &dyn AuditWriter,
    id: &str,
    approver: &str,
    comment: Option<&str>,
) -> Result<ApprovalRecord, StoreError> {
    transition(
        store,
        audit,
        id,
        ApprovalStatus::Denied,
        ApprovalEventKind::Denied,
        approver,
        comment,
    )
    .await
}

pub async fn cancel(
    store: &dyn ApprovalStore,
    audit: &dyn AuditWriter,
    id: &str,
    actor: &str,
) -> Result<ApprovalRecord, StoreError> {
    transition(
        store,
        audit,
        id,
        ApprovalStatus::Cancelled,
        ApprovalEventKind::Cancelled,
        actor,
        None,
    )
    .await
}

/// Sweep: mark overdue pending/approved records expired. Returns how many
/// records were transitioned.
pub async fn expire_overdue(
    store: &dyn ApprovalStore,
    audit: &dyn AuditWriter,
    requester: &str,
    profile: &str,
    now: Timestamp,
) -> Result<usize, StoreError> {
    let records = store.list_for(requester, profile).await?;
    let mut expired = 0;

    for mut record in records {
        let overdue = matches!(
            record.status,
            ApprovalStatus::Pending | ApprovalStatus::Approved
        ) && record.expires_at <= now;
        if !overdue {
            continue;
        }

        record.status = ApprovalStatus::Expired;
        store.put(record.clone()).await?;
        audit
            .log_approval(entry(&record, ApprovalEventKind::Expired, "system"))
            .await;
        expired += 1;
    }

    Ok(expired)
}

// ---------------------------------------------------------------------------
// Implementations
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryApprovalStore {
    records: Mutex<HashMap<String, ApprovalRecord>>,
}

impl MemoryApprovalStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, ApprovalRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ApprovalStore for MemoryApprovalStore {
    fn get(&self, id: &str) -> BoxFuture<'_, Result<Option<ApprovalRecord>, StoreError>> {
        let record = self.lock().get(id).cloned();
        Box::pin(std::future::ready(Ok(record)))
    }

    fn put(&self, record: ApprovalRecord) -> BoxFuture<'_, Result<(), StoreError>> {
        self.lock().insert(record.id.clone(), record);
        Box::pin(std::future::ready(Ok(())))
    }

    fn list_for(
        &self,
        requester: &str,
        profile: &str,
    ) -> BoxFuture<'_, Result<Vec<ApprovalRecord>, StoreError>> {
        let records = self
            .lock()
            .values()
            .filter(|r| r.requester == requester && r.profile == profile)
            .cloned()
            .collect();
        Box::pin(std::future::ready(Ok(records)))
    }
}

pub struct S3ApprovalStore {
    client: Client,
    bucket: String,
}

impl S3ApprovalStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

impl ApprovalStore for S3ApprovalStore {
    fn get(&self, id: &str) -> BoxFuture<'_, Result<Option<ApprovalRecord>, StoreError>> {
        let key = keys::approval(id);
        Box::pin(async move {
            let loaded =
                objects::load_json::<ApprovalRecord>(&self.client, &self.bucket, &key).await?;
            Ok(loaded.map(|(record, _)| record))
        })
    }

    fn put(&self, record: ApprovalRecord) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            let key = keys::approval(&record.id);
            objects::save_json(&self.client, &self.bucket, &key, &record).await?;
            Ok(())
        })
    }

    fn list_for(
        &self,
        requester: &str,
        profile: &str,
    ) -> BoxFuture<'_, Result<Vec<ApprovalRecord>, StoreError>> {
        let requester = requester.to_string();
        let profile = profile.to_string();
        Box::pin(async move {
            let mut records: Vec<ApprovalRecord> =
                objects::load_all(&self.client, &self.bucket, keys::APPROVALS_PREFIX).await?;
            records.retain(|r| r.requester == requester && r.profile == profile);
            Ok(records)
        })
    }
}
