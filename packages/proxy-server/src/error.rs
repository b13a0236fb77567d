//! Maps `proxy_core::CoreError` onto the exact HTTP statuses §7 specifies.
//!
//! External clients see only the status; the denial reason is logged via
//! `tracing` first. Expiry, quota, MIME, and size rejections are folded into
//! a plain `401` on file routes, matching the spec's deliberate choice not
//! to leak policy shape to the client.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use proxy_core::CoreError;
use thiserror::Error;

/// The error type every handler in this crate converges on before returning
/// to axum.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Classifies a core rejection per §7. Logs the reason before folding it
    /// into the opaque status the client receives.
    pub fn from_core(err: CoreError) -> Self {
        match err {
            CoreError::InvalidChild(reason) => ApiError::BadRequest(reason),
            CoreError::KeyExpired
            | CoreError::QuotaExceeded
            | CoreError::MimeRejected
            | CoreError::SizeExceeded
            | CoreError::Unauthorized
            | CoreError::NotFound => {
                tracing::warn!(reason = %err, "request denied");
                ApiError::Unauthorized
            }
            CoreError::DuplicateKey => {
                tracing::error!("key generation collided with an existing key");
                ApiError::Internal(err.to_string())
            }
            CoreError::UpstreamError => {
                tracing::warn!("upstream returned a non-2xx status on a counter-gated method");
                ApiError::Internal(err.to_string())
            }
            CoreError::Internal(reason) => {
                tracing::error!(%reason, "internal error");
                ApiError::Internal(reason)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, "Basic realm=\"restricted\", charset=\"UTF-8\"")],
            )
                .into_response(),
            ApiError::BadRequest(reason) => {
                (StatusCode::BAD_REQUEST, format!("Invalid json body: {reason}")).into_response()
            }
            ApiError::Internal(reason) => {
                tracing::error!(%reason, "returning 500");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}
