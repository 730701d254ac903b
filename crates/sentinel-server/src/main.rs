use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use sentinel_audit::signing::Signer;
use sentinel_audit::writer::{AuditWriter, JsonLinesWriter, NoopWriter};
use sentinel_policy::cache::PolicyCache;
use sentinel_policy::source::SsmParameterSource;
use sentinel_server::auth::generate_token;
use sentinel_server::ratelimit::{spawn_sweeper, RateLimitConfig, SlidingWindowLimiter};
use sentinel_server::router::serve_tcp;
use sentinel_server::state::{ServerState, SessionHandle};
use sentinel_server::uds;
use sentinel_store::approval::{ApprovalStore, MemoryApprovalStore, S3ApprovalStore};
use sentinel_store::breakglass::{BreakGlassStore, MemoryBreakGlassStore, S3BreakGlassStore};
use sentinel_store::session::{self, MemorySessionStore, S3SessionStore, SessionStore};
use sentinel_sts::StsIssuer;

fn require_env(name: &str) -> eyre::Result<String> {
    env::var(name).map_err(|_| eyre::eyre!("missing required environment variable {name}"))
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_secs(name: &str, default: u64) -> eyre::Result<Duration> {
    match env::var(name) {
        Ok(raw) => {
            let secs: u64 = raw
                .parse()
                .map_err(|_| eyre::eyre!("{name} must be an integer number of seconds"))?;
            Ok(Duration::from_secs(secs))
        }
        Err(_) => Ok(Duration::from_secs(default)),
    }
}

fn build_signer() -> eyre::Result<Option<Signer>> {
    let Ok(hex_key) = env::var("SENTINEL_SIGNING_KEY") else {
        return Ok(None);
    };
    let key = hex::decode(hex_key.trim())
        .map_err(|_| eyre::eyre!("SENTINEL_SIGNING_KEY must be hex"))?;
    let key_id = env_or("SENTINEL_SIGNING_KEY_ID", "default");
    Ok(Some(Signer::new(key, key_id)?))
}

fn build_audit_writer() -> eyre::Result<Arc<dyn AuditWriter>> {
    let Ok(path) = env::var("SENTINEL_AUDIT_LOG") else {
        return Ok(Arc::new(NoopWriter));
    };

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| eyre::eyre!("cannot open audit log {path}: {e}"))?;

    Ok(match build_signer()? {
        Some(signer) => Arc::new(JsonLinesWriter::signed(file, signer)),
        None => Arc::new(JsonLinesWriter::new(file)),
    })
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Structured JSON logging; the audit trail is a separate pipeline.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let user = require_env("SENTINEL_USER")?;
    let profile = require_env("SENTINEL_PROFILE")?;
    let role_arn = require_env("SENTINEL_ROLE_ARN")?;
    let policy_root = env_or("SENTINEL_POLICY_ROOT", "/sentinel/policies");
    let policy_name = env_or("SENTINEL_POLICY_NAME", "default");
    let session_duration = env_secs("SENTINEL_SESSION_DURATION_SECS", 3600)?;
    let policy_ttl = env_secs("SENTINEL_POLICY_TTL_SECS", 60)?;
    let rate_window = env_secs("SENTINEL_RATE_WINDOW_SECS", 60)?;
    let rate_limit: usize = env_or("SENTINEL_RATE_LIMIT", "60")
        .parse()
        .map_err(|_| eyre::eyre!("SENTINEL_RATE_LIMIT must be an integer"))?;

    let auth_token = match env::var("SENTINEL_AUTH_TOKEN") {
        Ok(token) => token,
        Err(_) => {
            let token = generate_token();
            // Printed once so a local client can pick it up; never logged.
            println!("{token}");
            token
        }
    };

    let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .load()
        .await;

    let policies = Arc::new(PolicyCache::new(
        Arc::new(SsmParameterSource::from_config(&aws_config, &policy_root)),
        policy_ttl,
    ));
    let issuer = Arc::new(StsIssuer::new(&aws_config));
    let audit = build_audit_writer()?;

    let limiter = Arc::new(SlidingWindowLimiter::new(RateLimitConfig {
        requests_per_window: rate_limit,
        window: rate_window,
    }));
    spawn_sweeper(limiter.clone(), rate_window);

    let (sessions, approvals, break_glass): (
        Arc<dyn SessionStore>,
        Arc<dyn ApprovalStore>,
        Arc<dyn BreakGlassStore>,
    ) = match env::var("SENTINEL_STATE_BUCKET") {
        Ok(bucket) => {
            let s3 = sentinel_store::client::build_client().await;
            (
                Arc::new(S3SessionStore::new(s3.clone(), bucket.clone())),
                Arc::new(S3ApprovalStore::new(s3.clone(), bucket.clone())),
                Arc::new(S3BreakGlassStore::new(s3, bucket)),
            )
        }
        Err(_) => (
            Arc::new(MemorySessionStore::new()),
            Arc::new(MemoryApprovalStore::new()),
            Arc::new(MemoryBreakGlassStore::new()),
        ),
    };

    let mut state = ServerState {
        user,
        profile,
        auth_token,
        policy_name: policy_name.clone(),
        policy_path: format!("{}/{policy_name}", policy_root.trim_end_matches('/')),
        role_arn,
        external_id: env::var("SENTINEL_EXTERNAL_ID").ok(),
        session_duration,
        policies,
        issuer,
        approvals,
        break_glass,
        audit,
        limiter,
        session: None,
    };

    let instance_id = env_or("SENTINEL_INSTANCE_ID", &uuid::Uuid::new_v4().to_string());
    let record = session::new_session(
        &state.user,
        &state.profile,
        &instance_id,
        state.session_ttl(),
    );
    let session_id = record.id.clone();
    sessions.create(record).await?;
    state.session = Some(SessionHandle {
        store: sessions.clone(),
        id: session_id.clone(),
    });
    tracing::info!(session_id = %session_id, instance_id = %instance_id, "server session created");

    let state = Arc::new(state);
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
    };

    match env::var("SENTINEL_SOCKET") {
        Ok(path) => {
            let path = PathBuf::from(path);
            uds::serve(&path, state.clone(), shutdown).await?;
        }
        Err(_) => {
            let addr: SocketAddr = env_or("SENTINEL_LISTEN", "127.0.0.1:7156")
                .parse()
                .map_err(|_| eyre::eyre!("SENTINEL_LISTEN must be host:port"))?;
            serve_tcp(addr, state.clone(), shutdown).await?;
        }
    }

    // Orderly shutdown: the session ends with the server unless an
    // operator already revoked it.
    if let Err(e) = session::expire(sessions.as_ref(), &session_id).await {
        tracing::warn!(session_id = %session_id, error = %e, "could not expire session on shutdown");
    }

    Ok(())
}
