//! Error types for secret store operations

/// Errors from secret store operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("secret not found: {0}")]
    NotFound(String),

    #[error("secret store unavailable: {0}")]
    Unavailable(String),
}

/// Result alias for secret store operations.
pub type Result<T> = std::result::Result<T, Error>;
