//! Server session tracking and revocation.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use aws_sdk_s3::Client;
use jiff::Timestamp;

use sentinel_core::identity;
use sentinel_core::models::session::{ServerSession, SessionStatus};

use crate::error::StoreError;
use crate::{keys, objects};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Persistence contract for server sessions.
///
/// Implementations must expose linearizable single-key updates so the
/// revocation check in the credential path can be trusted. Methods return
/// boxed futures for dyn compatibility.
pub trait SessionStore: Send + Sync {
    fn create(&self, session: ServerSession) -> BoxFuture<'_, Result<(), StoreError>>;

    fn get(&self, id: &str) -> BoxFuture<'_, Result<Option<ServerSession>, StoreError>>;

    /// Persist a modified session. Fails with `TerminalState` if the stored
    /// session is already revoked or expired and the update would change
    /// its status.
    fn update(&self, session: ServerSession) -> BoxFuture<'_, Result<(), StoreError>>;

    fn delete(&self, id: &str) -> BoxFuture<'_, Result<(), StoreError>>;

    fn list_by_user(&self, user: &str) -> BoxFuture<'_, Result<Vec<ServerSession>, StoreError>>;

    fn list_by_status(
        &self,
        status: SessionStatus,
    ) -> BoxFuture<'_, Result<Vec<ServerSession>, StoreError>>;

    fn list_by_profile(
        &self,
        profile: &str,
    ) -> BoxFuture<'_, Result<Vec<ServerSession>, StoreError>>;

    fn find_active_by_server_instance(
        &self,
        server_instance_id: &str,
    ) -> BoxFuture<'_, Result<Option<ServerSession>, StoreError>>;

    /// Record one credential issuance: bump `request_count`, refresh
    /// `last_access_at`. Best-effort; terminal sessions are left untouched.
    fn touch(&self, id: &str) -> BoxFuture<'_, Result<(), StoreError>>;
}

/// Build a fresh active session record.
pub fn new_session(
    user: &str,
    profile: &str,
    server_instance_id: &str,
    expires_in: Duration,
) -> ServerSession {
    let now = Timestamp::now();
    ServerSession {
        id: identity::new_event_id(),
        user: user.to_string(),
        profile: profile.to_string(),
        server_instance_id: server_instance_id.to_string(),
        status: SessionStatus::Active,
        started_at: now,
        last_access_at: now,
        expires_at: now.saturating_add(expires_in).expect("std::time::Duration cannot overflow jiff Timestamp arithmetic"),
        request_count: 0,
        created_at: now,
        updated_at: now,
        revoked_by: None,
        revoked_reason: None,
    }
}

/// Convenience predicate used in the credential path: does the store
/// report this session as revoked or expired? A missing session is not
/// revoked.
pub async fn is_session_revoked(
    store: &dyn SessionStore,
    id: &str,
) -> Result<bool, StoreError> {
    let session = store.get(id).await?;
    Ok(session.is_some_and(|s| s.status.is_terminal()))
}

/// Transition a session to `revoked`. Fails if already terminal.
pub async fn revoke(
    store: &dyn SessionStore,
    id: &str,
    revoked_by: &str,
    reason: &str,
) -> Result<(), StoreError> {
    let Some(mut session) = store.get(id).await? else {
        return Err(StoreError::NotFound {
            key: keys::session(id),
        });
    };

    session.status = SessionStatus::Revoked;
    session.revoked_by = Some(revoked_by.to_string());
    session.revoked_reason = Some(reason.to_string());
    session.updated_at = Timestamp::now();
    store.update(session).await
}

/// Transition a session to `expired` unless it is already terminal.
/// Used on orderly server shutdown.
pub async fn expire(store: &dyn SessionStore, id: &str) -> Result<(), StoreError> {
    let Some(mut session) = store.get(id).await? else {
        return Ok(());
    };
    if session.status.is_terminal() {
        return Ok(());
    }

    session.status = SessionStatus::Expired;
    session.updated_at = Timestamp::now();
    store.update(session).await
}

fn check_transition(
    current: &ServerSession,
    next: &ServerSession,
) -> Result<(), StoreError> {
    if current.status.is_terminal() && next.status != current.status {
        return Err(StoreError::TerminalState {
            id: current.id.clone(),
            status: format!("{:?}", current.status).to_lowercase(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Used by local mode and tests.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, ServerSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, ServerSession>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SessionStore for MemorySessionStore {
    fn create(&self, session: ServerSession) -> BoxFuture<'_, Result<(), StoreError>> {
        self.lock().insert(session.id.clone(), session);
        Box::pin(std::future::ready(Ok(())))
    }

    fn get(&self, id: &str) -> BoxFuture<'_, Result<Option<ServerSession>, StoreError>> {
        let session = self.lock().get(id).cloned();
        Box::pin(std::future::ready(Ok(session)))
    }

    fn update(&self, session: ServerSession) -> BoxFuture<'_, Result<(), StoreError>> {
        let result = (|| {
            let mut sessions = self.lock();
            if let Some(current) = sessions.get(&session.id) {
                check_transition(current, &session)?;
            }
            sessions.insert(session.id.clone(), session);
            Ok(())
        })();
        Box::pin(std::future::ready(result))
    }

    fn delete(&self, id: &str) -> BoxFuture<'_, Result<(), StoreError>> {
        self.lock().remove(id);
        Box::pin(std::future::ready(Ok(())))
    }

    fn list_by_user(&self, user: &str) -> BoxFuture<'_, Result<Vec<ServerSession>, StoreError>> {
        let sessions = self
            .lock()
            .values()
            .filter(|s| s.user == user)
            .cloned()
            .collect();
        Box::pin(std::future::ready(Ok(sessions)))
    }

    fn list_by_status(
        &self,
        status: SessionStatus,
    ) -> BoxFuture<'_, Result<Vec<ServerSession>, StoreError>> {
        let sessions = self
            .lock()
            .values()
            .filter(|s| s.status == status)
            .cloned()
            .collect();
        Box::pin(std::future::ready(Ok(sessions)))
    }

    fn list_by_profile(
        &self,
        profile: &str,
    ) -> BoxFuture<'_, Result<Vec<ServerSession>, StoreError>> {
        let sessions = self
            .lock()
            .values()
            .filter(|s| s.profile == profile)
            .cloned()
            .collect();
        Box::pin(std::future::ready(Ok(sessions)))
    }

    fn find_active_by_server_instance(
        &self,
        server_instance_id: &str,
    ) -> BoxFuture<'_, Result<Option<ServerSession>, StoreError>> {
        let session = self
            .lock()
            .values()
            .find(|s| {
                s.server_instance_id == server_instance_id && s.status == SessionStatus::Active
            })
            .cloned();
        Box::pin(std::future::ready(Ok(session)))
    }

    fn touch(&self, id: &str) -> BoxFuture<'_, Result<(), StoreError>> {
        let mut sessions = self.lock();
        if let Some(session) = sessions.get_mut(id)
            && !session.status.is_terminal()
        {
            let now = Timestamp::now();
            session.request_count += 1;
            session.last_access_at = now;
            session.updated_at = now;
        }
        Box::pin(std::future::ready(Ok(())))
    }
}

// ---------------------------------------------------------------------------
// S3-backed store
// ---------------------------------------------------------------------------

const TOUCH_RETRIES: usize = 3;

pub struct S3SessionStore {
    client: Client,
    bucket: String,
}

impl S3SessionStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    async fn load_all(&self) -> Result<Vec<ServerSession>, StoreError> {
        objects::load_all(&self.client, &self.bucket, keys::SESSIONS_PREFIX).await
    }
}

impl SessionStore for S3SessionStore {
    fn create(&self, session: ServerSession) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            let key = keys::session(&session.id);
            objects::save_json(&self.client, &self.bucket, &key, &session).await?;
            Ok(())
        })
    }

    fn get(&self, id: &str) -> BoxFuture<'_, Result<Option<ServerSession>, StoreError>> {
        let key = keys::session(id);
        Box::pin(async move {
            let loaded =
                objects::load_json::<ServerSession>(&self.client, &self.bucket, &key).await?;
            Ok(loaded.map(|(session, _)| session))
        })
    }

    fn update(&self, session: ServerSession) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            let key = keys::session(&session.id);
            match objects::load_json::<ServerSession>(&self.client, &self.bucket, &key).await? {
                Some((current, etag)) => {
                    check_transition(&current, &session)?;
                    objects::save_json_if_match(
                        &self.client,
                        &self.bucket,
                        &key,
                        &session,
                        &etag,
                    )
                    .await?;
                }
                None => {
                    objects::save_json(&self.client, &self.bucket, &key, &session).await?;
                }
            }
            Ok(())
        })
    }

    fn delete(&self, id: &str) -> BoxFuture<'_, Result<(), StoreError>> {
        let key = keys::session(id);
        Box::pin(async move { objects::delete_object(&self.client, &self.bucket, &key).await })
    }

    fn list_by_user(&self, user: &str) -> BoxFuture<'_, Result<Vec<ServerSession>, StoreError>> {
        let user = user.to_string();
        Box::pin(async move {
            let mut sessions = self.load_all().await?;
            sessions.retain(|s| s.user == user);
            Ok(sessions)
        })
    }

    fn list_by_status(
        &self,
        status: SessionStatus,
    ) -> BoxFuture<'_, Result<Vec<ServerSession>, StoreError>> {
        Box::pin(async move {
            let mut sessions = self.load_all().await?;
            sessions.retain(|s| s.status == status);
            Ok(sessions)
        })
    }

    fn list_by_profile(
        &self,
        profile: &str,
    ) -> BoxFuture<'_, Result<Vec<ServerSession>, StoreError>> {
        let profile = profile.to_string();
        Box::pin(async move {
            let mut sessions = self.load_all().await?;
            sessions.retain(|s| s.profile == profile);
            Ok(sessions)
        })
    }

    fn find_active_by_server_instance(
        &self,
        server_instance_id: &str,
    ) -> BoxFuture<'_, Result<Option<ServerSession>, StoreError>> {
        let server_instance_id = server_instance_id.to_string();
        Box::pin(async move {
            let sessions = self.load_all().await?;
            Ok(sessions.into_iter().find(|s| {
                s.server_instance_id == server_instance_id && s.status == SessionStatus::Active
            }))
        })
    }

    fn touch(&self, id: &str) -> BoxFuture<'_, Result<(), StoreError>> {
        let key = keys::session(id);
        Box::pin(async move {
            for _ in 0..TOUCH_RETRIES {
                let Some((mut session, etag)) =
                    objects::load_json::<ServerSession>(&self.client, &self.bucket, &key).await?
                else {
                    return Ok(());
                };
                if session.status.is_terminal() {
                    return Ok(());
                }

                let now = Timestamp::now();
                session.request_count += 1;
                session.last_access_at = now;
                session.updated_at = now;

                match objects::save_json_if_match(
                    &self.client,
                    &self.bucket,
                    &key,
                    &session,
                    &etag,
                )
                .await
                {
                    Ok(_) => return Ok(()),
                    Err(StoreError::PreconditionFailed { .. }) => continue,
                    Err(e) => return Err(e),
                }
            }

            Err(StoreError::PreconditionFailed { key })
        })
    }
}
