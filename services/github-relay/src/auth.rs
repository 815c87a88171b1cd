//! Session verification middleware
//!
//! Wraps every authenticated route. The bearer credential must be a session
//! token minted by this relay: its signature and age are checked the same way
//! the callback checks `state`, then the embedded identifier is resolved to a
//! completed session record. The access token is handed to the handler as a
//! request extension and never leaves the relay.

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use common::Secret;
use secret_store::SessionRecord;
use tracing::debug;

use crate::error::RelayError;
use crate::flow::{RelayState, short_id};

/// GitHub access token resolved for the current request.
#[derive(Clone)]
pub struct AccessToken(pub Secret<String>);

/// Extract the value of an `Authorization: Bearer <value>` header.
pub fn bearer_credential(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolve a bearer session token to the stored access token.
pub async fn verify_session(
    state: &RelayState,
    session_token: &str,
) -> Result<Secret<String>, RelayError> {
    let identifier = state.codec.verify(session_token, state.session_max_age)?;

    let record = state.store.get(&identifier).await.map_err(|e| {
        RelayError::Unauthorized(format!("Secret fetch failed - {e}"))
    })?;

    match record {
        SessionRecord::Authorized(access_token) => {
            debug!(session = short_id(&identifier), "session verified");
            Ok(access_token)
        }
        SessionRecord::Pending => Err(RelayError::Unauthorized(
            "access_token not found".into(),
        )),
    }
}

/// Middleware requiring a completed session.
///
/// Adds `AccessToken` to request extensions if valid.
///
/// # Usage
/// ```ignore
/// let protected = Router::new()
///     .route("/check-authorization", get(check_authorization))
///     .route_layer(middleware::from_fn_with_state(relay, require_session));
/// ```
pub async fn require_session(
    State(state): State<RelayState>,
    mut request: Request,
    next: Next,
) -> Result<Response, RelayError> {
    let session_token = bearer_credential(request.headers())
        .ok_or(RelayError::MissingCredential)?
        .to_owned();

    let access_token = verify_session(&state, &session_token).await?;
    request.extensions_mut().insert(AccessToken(access_token));

    Ok(next.run(request).await)
}

/// GET /check-authorization: succeeds once the handshake has completed.
pub async fn check_authorization() -> &'static str {
    "Success"
}
