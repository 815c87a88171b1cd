//! Consent URL construction

use url::Url;

use crate::constants::AUTHORIZE_PATH;
use crate::error::{Error, Result};

/// Build the GitHub consent URL the client opens in a browser.
///
/// `state` is the relay's signed session token. GitHub returns it unchanged
/// on the callback, which is how the callback finds the pending session.
pub fn build_authorization_url(
    oauth_base_url: &str,
    client_id: &str,
    redirect_uri: &str,
    scope: &str,
    state: &str,
) -> Result<String> {
    let base = format!("{}{}", oauth_base_url.trim_end_matches('/'), AUTHORIZE_PATH);
    let url = Url::parse_with_params(
        &base,
        &[
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("scope", scope),
            ("state", state),
        ],
    )
    .map_err(|e| Error::InvalidUrl(format!("{base}: {e}")))?;
    Ok(url.into())
}
