//! Shared per-process state injected into every request handler.

use std::sync::Arc;
use std::time::Duration;

use sentinel_audit::writer::AuditWriter;
use sentinel_policy::cache::PolicyCache;
use sentinel_store::approval::ApprovalStore;
use sentinel_store::breakglass::BreakGlassStore;
use sentinel_store::session::SessionStore;
use sentinel_sts::CredentialIssuer;

use crate::ratelimit::SlidingWindowLimiter;

/// Sessions live at least this long regardless of the configured
/// credential duration.
pub const MIN_SESSION_TTL: Duration = Duration::from_secs(900);

/// The session record this server instance owns, if a session store is
/// configured.
#[derive(Clone)]
pub struct SessionHandle {
    pub store: Arc<dyn SessionStore>,
    pub id: String,
}

/// Everything a request handler needs. Built once at startup; all shared
/// pieces are concurrency-safe.
pub struct ServerState {
    /// Principal this server vends credentials for.
    pub user: String,
    pub profile: String,
    /// Opaque bearer token clients must present.
    pub auth_token: String,
    /// Logical policy name resolved through the cache.
    pub policy_name: String,
    /// Full parameter path, recorded in decision log entries.
    pub policy_path: String,
    pub role_arn: String,
    pub external_id: Option<String>,
    /// Requested credential lifetime; capped per decision.
    pub session_duration: Duration,
    pub policies: Arc<PolicyCache>,
    pub issuer: Arc<dyn CredentialIssuer>,
    pub approvals: Arc<dyn ApprovalStore>,
    pub break_glass: Arc<dyn BreakGlassStore>,
    pub audit: Arc<dyn AuditWriter>,
    pub limiter: Arc<SlidingWindowLimiter>,
    pub session: Option<SessionHandle>,
}

impl ServerState {
    /// Session expiry for this server: the configured duration, floored at
    /// [`MIN_SESSION_TTL`].
    pub fn session_ttl(&self) -> Duration {
        self.session_duration.max(MIN_SESSION_TTL)
    }
}
