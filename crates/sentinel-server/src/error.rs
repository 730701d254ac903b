//! The client-visible error vocabulary.
//!
//! Internal errors carry detail into tracing; the wire only ever sees one
//! of the fixed phrases below. Anything with an ARN, parameter path, AWS
//! error code, username, or stack frame in it must not reach a response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Errors as the client sees them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    InvalidToken,
    RateLimited { retry_after_secs: u64 },
    PolicyLoad,
    PolicyDenied,
    SessionRevoked,
    Issuance,
    Init,
}

impl ApiError {
    /// The only place client-visible strings live.
    pub fn message(&self) -> &'static str {
        match self {
            ApiError::InvalidToken => "invalid Authorization token",
            ApiError::RateLimited { .. } => "Rate limit exceeded",
            ApiError::PolicyLoad => "Failed to load policy",
            ApiError::PolicyDenied => "Policy denied access",
            ApiError::SessionRevoked => "Session revoked",
            ApiError::Issuance => "Failed to retrieve credentials",
            ApiError::Init => "Failed to initialize handler",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidToken
            | ApiError::PolicyDenied
            | ApiError::SessionRevoked => StatusCode::FORBIDDEN,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::PolicyLoad | ApiError::Issuance | ApiError::Init => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    #[serde(rename = "Message")]
    message: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            message: self.message(),
        });

        match self {
            ApiError::RateLimited { retry_after_secs } => (
                self.status(),
                [("Retry-After", retry_after_secs.to_string())],
                body,
            )
                .into_response(),
            _ => (self.status(), body).into_response(),
        }
    }
}
