//! The rejection type produced by the capability algebra.

use thiserror::Error;

/// A reason the capability algebra rejected an operation. The service crate
/// maps these onto HTTP statuses (`proxy_server::http_error`); this crate
/// only classifies the reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid child: {0}")]
    InvalidChild(String),

    #[error("key expired")]
    KeyExpired,

    #[error("quota exceeded")]
    QuotaExceeded,

    #[error("mime type rejected")]
    MimeRejected,

    #[error("put body exceeds configured size cap")]
    SizeExceeded,

    #[error("unauthorized")]
    Unauthorized,

    #[error("duplicate key")]
    DuplicateKey,

    #[error("key not found")]
    NotFound,

    #[error("upstream returned a non-2xx status on a counter-gated method")]
    UpstreamError,

    #[error("internal error: {0}")]
    Internal(String),
}
