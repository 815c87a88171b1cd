//! OAuth authorization code exchange
//!
//! GitHub answers the exchange with HTTP 200 even when the code is bad; the
//! failure is reported through an `error` field in the JSON body. Both the
//! HTTP status and that field are checked here.

use common::Secret;
use serde::Deserialize;
use tracing::debug;

use crate::constants::{ACCESS_TOKEN_PATH, USER_AGENT};
use crate::error::{Error, Result};

/// Registered OAuth application credentials.
#[derive(Debug, Clone)]
pub struct OAuthApp {
    pub client_id: String,
    pub client_secret: Secret<String>,
}

/// Raw response body from the access token endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// A successfully issued access token.
#[derive(Debug)]
pub struct AccessGrant {
    pub access_token: Secret<String>,
    /// Scopes actually granted (may differ from those requested)
    pub scope: String,
}

impl TokenResponse {
    /// Turn the raw response into a grant, surfacing GitHub-reported errors.
    pub fn into_grant(self) -> Result<AccessGrant> {
        if let Some(error) = self.error {
            let description = self.error_description.unwrap_or_default();
            return Err(Error::TokenExchange(format!("{error}: {description}")));
        }
        match self.access_token {
            Some(token) if !token.is_empty() => Ok(AccessGrant {
                access_token: Secret::new(token),
                scope: self.scope.unwrap_or_default(),
            }),
            _ => Err(Error::TokenExchange(
                "response did not contain an access_token".into(),
            )),
        }
    }
}

/// Exchange an authorization code for an access token.
///
/// `redirect_uri` must match the one sent in the authorization URL.
pub async fn exchange_code(
    client: &reqwest::Client,
    oauth_base_url: &str,
    app: &OAuthApp,
    code: &str,
    redirect_uri: &str,
) -> Result<AccessGrant> {
    let endpoint = format!(
        "{}{}",
        oauth_base_url.trim_end_matches('/'),
        ACCESS_TOKEN_PATH
    );

    let response = client
        .post(&endpoint)
        .header(reqwest::header::ACCEPT, "application/json")
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .form(&[
            ("client_id", app.client_id.as_str()),
            ("client_secret", app.client_secret.expose().as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ])
        .send()
        .await
        .map_err(|e| Error::Http(format!("access token request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::TokenExchange(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    let token = response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid token response: {e}")))?;

    let grant = token.into_grant()?;
    debug!(scope = %grant.scope, "access token issued");
    Ok(grant)
}
