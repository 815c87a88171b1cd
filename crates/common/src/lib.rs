//! Common types for the GitHub OAuth relay

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
