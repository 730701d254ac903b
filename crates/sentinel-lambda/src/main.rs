//! Lambda token-vending front-end.
//!
//! API Gateway HTTP v2 invocations are marshalled by `lambda_http` into the
//! same axum router the local server uses; the decision pipeline is
//! identical, only the transport differs. If the environment is incomplete
//! the handler stays up and answers every request with the generic
//! initialization failure.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tracing_subscriber::EnvFilter;

use sentinel_audit::cloudwatch::CloudWatchWriter;
use sentinel_audit::signing::Signer;
use sentinel_audit::writer::{AuditWriter, NoopWriter};
use sentinel_policy::cache::PolicyCache;
use sentinel_policy::source::SsmParameterSource;
use sentinel_server::error::ApiError;
use sentinel_server::ratelimit::{RateLimitConfig, SlidingWindowLimiter};
use sentinel_server::router::build_router;
use sentinel_server::state::ServerState;
use sentinel_store::approval::{ApprovalStore, MemoryApprovalStore, S3ApprovalStore};
use sentinel_store::breakglass::{BreakGlassStore, MemoryBreakGlassStore, S3BreakGlassStore};
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

fn build_audit_writer(config: &aws_config::SdkConfig) -> eyre::Result<Arc<dyn AuditWriter>> {
    let (Ok(group), Ok(stream)) = (
        env::var("SENTINEL_LOG_GROUP"),
        env::var("SENTINEL_LOG_STREAM"),
    ) else {
        return Ok(Arc::new(NoopWriter));
    };

    let writer = CloudWatchWriter::from_config(config, group, stream);
    Ok(match build_signer()? {
        Some(signer) => Arc::new(writer.with_signer(signer)),
        None => Arc::new(writer),
    })
}

async fn init() -> eyre::Result<Arc<ServerState>> {
    let user = require_env("SENTINEL_USER")?;
    let profile = require_env("SENTINEL_PROFILE")?;
    let role_arn = require_env("SENTINEL_ROLE_ARN")?;
    let auth_token = require_env("SENTINEL_AUTH_TOKEN")?;
    let policy_root = require_env("SENTINEL_POLICY_ROOT")?;
    let policy_name = env_or("SENTINEL_POLICY_NAME", "default");
    let session_duration = env_secs("SENTINEL_SESSION_DURATION_SECS", 3600)?;
    let policy_ttl = env_secs("SENTINEL_POLICY_TTL_SECS", 60)?;
    let rate_window = env_secs("SENTINEL_RATE_WINDOW_SECS", 60)?;
    let rate_limit: usize = env_or("SENTINEL_RATE_LIMIT", "60")
        .parse()
        .map_err(|_| eyre::eyre!("SENTINEL_RATE_LIMIT must be an integer"))?;

    let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .load()
        .await;

    let (approvals, break_glass): (Arc<dyn ApprovalStore>, Arc<dyn BreakGlassStore>) =
        match env::var("SENTINEL_STATE_BUCKET") {
            Ok(bucket) => {
                let s3 = sentinel_store::client::build_client().await;
                (
                    Arc::new(S3ApprovalStore::new(s3.clone(), bucket.clone())),
                    Arc::new(S3BreakGlassStore::new(s3, bucket)),
                )
            }
            Err(_) => (
                Arc::new(MemoryApprovalStore::new()),
                Arc::new(MemoryBreakGlassStore::new()),
            ),
        };

    Ok(Arc::new(ServerState {
        user,
        profile,
        auth_token,
        policy_name: policy_name.clone(),
        policy_path: format!("{}/{policy_name}", policy_root.trim_end_matches('/')),
        role_arn,
        external_id: env::var("SENTINEL_EXTERNAL_ID").ok(),
        session_duration,
        policies: Arc::new(PolicyCache::new(
            Arc::new(SsmParameterSource::from_config(&aws_config, &policy_root)),
            policy_ttl,
        )),
        issuer: Arc::new(StsIssuer::new(&aws_config)),
        approvals,
        break_glass,
        audit: build_audit_writer(&aws_config)?,
        limiter: Arc::new(SlidingWindowLimiter::new(RateLimitConfig {
            requests_per_window: rate_limit,
            window: rate_window,
        })),
        // Lambda invocations are not an interactive server session.
        session: None,
    }))
}

async fn init_failed() -> ApiError {
    ApiError::Init
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Structured JSON logging for CloudWatch
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let app = match init().await {
        Ok(state) => build_router(state),
        Err(e) => {
            tracing::error!(error = %e, "handler initialization failed");
            Router::new().fallback(init_failed)
        }
    };

    lambda_http::run(app).await.map_err(|e| eyre::eyre!(e))
}
