//! Error types for session token operations

/// Errors from minting or verifying session tokens.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("signing secret must not be empty")]
    EmptySecret,

    #[error("invalid session token: {0}")]
    Invalid(&'static str),

    /// The signature is valid but the token is older than the allowed age.
    /// The identifier is trustworthy, so callers may use it for cleanup.
    #[error("session token expired ({age_secs}s old, max {max_age_secs}s)")]
    Expired {
        identifier: String,
        age_secs: u64,
        max_age_secs: u64,
    },

    #[error("failed to encode session token: {0}")]
    Encode(String),
}

/// Result alias for session token operations.
pub type Result<T> = std::result::Result<T, Error>;
