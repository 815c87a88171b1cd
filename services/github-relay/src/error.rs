//! Request error taxonomy
//!
//! Every failure in the handshake or the authenticated endpoints aborts the
//! request and is converted here into an HTTP response. There is no local
//! recovery or retry.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::warn;

/// Per-request relay errors.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Missing {0}")]
    MissingParameter(&'static str),

    #[error("Invalid or expired state: session token expired")]
    Expired,

    #[error("Invalid or expired state: bad signature")]
    InvalidSignature,

    #[error("{0}")]
    StoreUnavailable(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Authorization header not found")]
    MissingCredential,

    #[error("GitHub access token fetch failed - {0}")]
    UpstreamExchangeFailed(String),

    #[error("GitHub repo fetch failed - {0}")]
    UpstreamFetchFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingParameter(_) => StatusCode::BAD_REQUEST,
            Self::Expired
            | Self::InvalidSignature
            | Self::Unauthorized(_)
            | Self::MissingCredential
            | Self::UpstreamExchangeFailed(_) => StatusCode::UNAUTHORIZED,
            Self::StoreUnavailable(_) | Self::UpstreamFetchFailed(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            Self::MissingParameter(_) => "missing_parameter",
            Self::Expired => "expired",
            Self::InvalidSignature => "invalid_signature",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::Unauthorized(_) => "unauthorized",
            Self::MissingCredential => "missing_credential",
            Self::UpstreamExchangeFailed(_) => "upstream_exchange_failed",
            Self::UpstreamFetchFailed(_) => "upstream_fetch_failed",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<session_token::Error> for RelayError {
    fn from(err: session_token::Error) -> Self {
        match err {
            session_token::Error::Expired { .. } => Self::Expired,
            session_token::Error::Invalid(_) => Self::InvalidSignature,
            session_token::Error::EmptySecret | session_token::Error::Encode(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

/// JSON error body: {"error":{"type":"...","message":"...","request_id":"req_..."}}
impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
        let message = self.to_string();

        warn!(
            request_id,
            status = status.as_u16(),
            error_type = self.error_type(),
            error = %message,
            "request failed"
        );

        let body = serde_json::json!({
            "error": {
                "type": self.error_type(),
                "message": message,
                "request_id": request_id,
            }
        });
        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}
