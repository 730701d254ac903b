//! Break-glass store and lifecycle.
//!
//! Break-glass is time-boxed emergency access outside normal policy. It
//! requires a reason code and a real justification, and every transition
//! is audited distinctly from normal decisions.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use aws_sdk_s3::Client;
use jiff::Timestamp;

use sentinel_audit::entries::{BreakGlassEntry, BreakGlassEventKind};
use sentinel_audit::writer::AuditWriter;
use sentinel_core::identity;
use sentinel_core::models::breakglass::{
    validate_justification, BreakGlassEvent, BreakGlassStatus, ReasonCode,
};
use sentinel_core::time;

use crate::error::StoreError;
use crate::{keys, objects};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Persistence contract for break-glass events.
pub trait BreakGlassStore: Send + Sync {
    fn get(&self, id: &str) -> BoxFuture<'_, Result<Option<BreakGlassEvent>, StoreError>>;

    fn put(&self, event: BreakGlassEvent) -> BoxFuture<'_, Result<(), StoreError>>;

    /// All events invoked by (invoker, profile), any status.
    fn list_for(
        &self,
        invoker: &str,
        profile: &str,
    ) -> BoxFuture<'_, Result<Vec<BreakGlassEvent>, StoreError>>;
}

/// The active break-glass event for (user, profile) at `now`, if any.
/// When several are active the one expiring soonest is returned.
pub async fn find_active(
    store: &dyn BreakGlassStore,
    invoker: &str,
    profile: &str,
    now: Timestamp,
) -> Result<Option<BreakGlassEvent>, StoreError> {
    let mut active: Vec<BreakGlassEvent> = store
        .list_for(invoker, profile)
        .await?
        .into_iter()
        .filter(|e| e.is_active(now))
        .collect();

    active.sort_by_key(|e| e.expires_at);
    Ok(active.into_iter().next())
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

fn entry(event: &BreakGlassEvent, kind: BreakGlassEventKind) -> BreakGlassEntry {
    BreakGlassEntry {
        timestamp: time::now_iso8601(),
        event: kind,
        event_id: event.id.clone(),
        request_id: event.request_id.clone(),
        invoker: event.invoker.clone(),
        profile: event.profile.clone(),
        reason_code: event.reason_code,
        justification: event.justification.clone(),
        status: event.status,
        duration_seconds: event.duration_secs,
        expires_at: time::format_iso8601(event.expires_at),
        closed_by: event.closed_by.clone(),
        closed_reason: event.closed_reason.clone(),
    }
}

/// Open an emergency window. The justification must be 20–1000 characters.
/// The event carries its own 8-hex request id for CloudTrail correlation.
pub async fn invoke(
    store: &dyn BreakGlassStore,
    audit: &dyn AuditWriter,
    invoker: &str,
    profile: &str,
    reason_code: ReasonCode,
    justification: &str,
    duration: Duration,
) -> Result<BreakGlassEvent, StoreError> {
    validate_justification(justification)?;
    let invoker = identity::sanitize_user(invoker)?;

    let now = Timestamp::now();
    let event = BreakGlassEvent {
        id: identity::new_event_id(),
        invoker,
        profile: profile.to_string(),
        reason_code,
        justification: justification.to_string(),
        duration_secs: duration.as_secs(),
        status: BreakGlassStatus::Active,
        created_at: now,
        expires_at: now.saturating_add(duration).expect("std::time::Duration cannot overflow jiff Timestamp arithmetic"),
        request_id: identity::new_request_id(),
        closed_by: None,
        closed_reason: None,
    };

    store.put(event.clone()).await?;
    audit
        .log_break_glass(entry(&event, BreakGlassEventKind::Invoked))
        .await;

    tracing::warn!(
        event_id = %event.id,
        invoker = %event.invoker,
        profile = %event.profile,
        reason_code = ?event.reason_code,
        "break-glass invoked"
    );
    Ok(event)
}

/// Close an active event before its window ends.
pub async fn close(
    store: &dyn BreakGlassStore,
    audit: &dyn AuditWriter,
    id: &str,
    closed_by: &str,
    closed_reason: &str,
) -> Result<BreakGlassEvent, StoreError> {
    let Some(mut event) = store.get(id).await? else {
        return Err(StoreError::NotFound {
            key: keys::break_glass(id),
        });
    };

    event.status = BreakGlassStatus::Closed;
    event.closed_by = Some(closed_by.to_string());
    event.closed_reason = Some(closed_reason.to_string());

    store.put(event.clone()).await?;
    audit
        .log_break_glass(entry(&event, BreakGlassEventKind::Closed))
        .await;
    Ok(event)
}

/// Sweep: mark overdue active events expired. Returns how many events
/// were transitioned.
pub async fn expire_overdue(
    store: &dyn BreakGlassStore,
    audit: &dyn AuditWriter,
    invoker: &str,
    profile: &str,
    now: Timestamp,
) -> Result<usize, StoreError> {
    let events = store.list_for(invoker, profile).await?;
    let mut expired = 0;

    for mut event in events {
        if event.status != BreakGlassStatus::Active || event.expires_at > now {
            continue;
        }

        event.status = BreakGlassStatus::Expired;
        store.put(event.clone()).await?;
        audit
            .log_break_glass(entry(&event, BreakGlassEventKind::Expired))
            .await;
        expired += 1;
    }

    Ok(expired)
}

// ---------------------------------------------------------------------------
// Implementations
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryBreakGlassStore {
    events: Mutex<HashMap<String, BreakGlassEvent>>,
}

impl MemoryBreakGlassStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, BreakGlassEvent>> {
        self.events.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl BreakGlassStore for MemoryBreakGlassStore {
    fn get(&self, id: &str) -> BoxFuture<'_, Result<Option<BreakGlassEvent>, StoreError>> {
        let event = self.lock().get(id).cloned();
        Box::pin(std::future::ready(Ok(event)))
    }

    fn put(&self, event: BreakGlassEvent) -> BoxFuture<'_, Result<(), StoreError>> {
        self.lock().insert(event.id.clone(), event);
        Box::pin(std::future::ready(Ok(())))
    }

    fn list_for(
        &self,
        invoker: &str,
        profile: &str,
    ) -> BoxFuture<'_, Result<Vec<BreakGlassEvent>, StoreError>> {
        let events = self
            .lock()
            .values()
            .filter(|e| e.invoker == invoker && e.profile == profile)
            .cloned()
            .collect();
        Box::pin(std::future::ready(Ok(events)))
    }
}

pub struct S3BreakGlassStore {
    client: Client,
    bucket: String,
}

impl S3BreakGlassStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

impl BreakGlassStore for S3BreakGlassStore {
    fn get(&self, id: &str) -> BoxFuture<'_, Result<Option<BreakGlassEvent>, StoreError>> {
        let key = keys::break_glass(id);
        Box::pin(async move {
            let loaded =
                objects::load_json::<BreakGlassEvent>(&self.client, &self.bucket, &key).await?;
            Ok(loaded.map(|(event, _)| event))
        })
    }

    fn put(&self, event: BreakGlassEvent) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            let key = keys::break_glass(&event.id);
            objects::save_json(&self.client, &self.bucket, &key, &event).await?;
            Ok(())
        })
    }

    fn list_for(
        &self,
        invoker: &str,
        profile: &str,
    ) -> BoxFuture<'_, Result<Vec<BreakGlassEvent>, StoreError>> {
        let invoker = invoker.to_string();
        let profile = profile.to_string();
        Box::pin(async move {
            let mut events: Vec<BreakGlassEvent> =
                objects::load_all(&self.client, &self.bucket, keys::BREAK_GLASS_PREFIX).await?;
            events.retain(|e| e.invoker == invoker && e.profile == profile);
            Ok(events)
        })
    }
}
