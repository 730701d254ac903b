//! Deprecated local Unix-socket transport.
//!
//! The socket is created mode 0600 and the peer's UID must match the UID
//! that owns the socket (the server's own). A mismatched peer is rejected
//! before the token is even looked at. The socket file is removed on
//! shutdown.

use std::io;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::connect_info::Connected;
use axum::extract::{ConnectInfo, Request};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::serve::IncomingStream;
use tokio::net::UnixListener;

use crate::error::ApiError;
use crate::router::build_router;
use crate::state::ServerState;

/// Peer credentials captured at accept time.
#[derive(Clone, Copy, Debug)]
pub struct UdsPeer {
    pub uid: Option<u32>,
}

impl Connected<IncomingStream<'_, UnixListener>> for UdsPeer {
    fn connect_info(stream: IncomingStream<'_, UnixListener>) -> Self {
        Self {
            uid: stream.io().peer_cred().ok().map(|cred| cred.uid()),
        }
    }
}

/// Removes the socket file when the server winds down.
struct SocketGuard(PathBuf);

impl Drop for SocketGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

async fn require_same_uid(expected_uid: u32, req: Request, next: Next) -> Response {
    let peer_uid = req
        .extensions()
        .get::<ConnectInfo<UdsPeer>>()
        .and_then(|info| info.0.uid);

    if peer_uid == Some(expected_uid) {
        next.run(req).await
    } else {
        tracing::warn!(?peer_uid, expected_uid, "rejecting cross-UID socket peer");
        ApiError::InvalidToken.into_response()
    }
}

/// Serve the credential endpoint over a mode-0600 Unix socket until
/// `shutdown` resolves.
pub async fn serve(
    path: &Path,
    state: Arc<ServerState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> io::Result<()> {
    // A stale socket from a crashed predecessor would fail the bind.
    let _ = std::fs::remove_file(path);

    let listener = UnixListener::bind(path)?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    let server_uid = std::fs::metadata(path)?.uid();
    let _guard = SocketGuard(path.to_path_buf());

    let app = build_router(state).layer(middleware::from_fn(move |req, next| {
        require_same_uid(server_uid, req, next)
    }));

    tracing::info!(socket = %path.display(), "serving on unix socket");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<UdsPeer>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
}
