//! Session record value and its string encoding

use common::Secret;

/// Value encoding of a pending record inside the store.
const PENDING_VALUE: &str = "null";

/// Value held under a session identifier.
#[derive(Debug, Clone)]
pub enum SessionRecord {
    /// Handshake initiated, no access token issued yet
    Pending,
    /// Handshake completed; holds the GitHub access token
    Authorized(Secret<String>),
}

impl SessionRecord {
    pub fn authorized(access_token: impl Into<String>) -> Self {
        Self::Authorized(Secret::new(access_token.into()))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn access_token(&self) -> Option<&Secret<String>> {
        match self {
            Self::Pending => None,
            Self::Authorized(token) => Some(token),
        }
    }

    /// Encode for storage as an opaque secret string.
    pub fn encode(&self) -> String {
        match self {
            Self::Pending => PENDING_VALUE.to_string(),
            Self::Authorized(token) => token.expose().clone(),
        }
    }

    /// Decode a stored secret string. Blank values and the pending marker
    /// both decode as `Pending`.
    pub fn decode(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value == PENDING_VALUE {
            Self::Pending
        } else {
            Self::authorized(value)
        }
    }
}
