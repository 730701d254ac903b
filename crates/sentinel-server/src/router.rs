//! HTTP glue shared by the local server and the Lambda front-end.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum::Router;

use crate::handler::handle_credential_request;
use crate::state::ServerState;

/// Any path serves credentials; there is exactly one resource.
pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .fallback(serve_credentials)
        .with_state(state)
}

/// Serve the credential endpoint over TCP until `shutdown` resolves.
pub async fn serve_tcp(
    addr: SocketAddr,
    state: Arc<ServerState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "serving on tcp");
    axum::serve(
        listener,
        build_router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
}

/// Rate-limit key: the remote address where the transport provides one,
/// else the first X-Forwarded-For hop (API Gateway), else a shared key.
fn rate_key(req: &Request) -> String {
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    req.headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

async fn serve_credentials(
    State(state): State<Arc<ServerState>>,
    req: Request,
) -> Response {
    let auth_header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let key = rate_key(&req);

    match handle_credential_request(&state, auth_header.as_deref(), &key).await {
        Ok(body) => Json(body).into_response(),
        Err(e) => e.into_response(),
    }
}
