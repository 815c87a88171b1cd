//! Error types for GitHub operations

/// Errors from GitHub OAuth and REST calls.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("unexpected GitHub response: {0}")]
    UnexpectedResponse(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Result alias for GitHub operations.
pub type Result<T> = std::result::Result<T, Error>;
