//! GitHub OAuth and REST client
//!
//! Covers the GitHub interactions the relay performs on a client's behalf.
//! This crate has no dependency on the relay binary and every base URL is a
//! parameter, so tests point it at local stub servers.
//!
//! Handshake and proxy flow:
//! 1. Relay builds the consent URL via `authorize::build_authorization_url()`
//! 2. GitHub redirects back with a code, exchanged via `token::exchange_code()`
//! 3. Authenticated calls use `repos::default_branch()` and `repos::branch_head_sha()`

pub mod authorize;
pub mod constants;
pub mod error;
pub mod repos;
pub mod token;

pub use authorize::build_authorization_url;
pub use constants::*;
pub use error::{Error, Result};
pub use repos::{branch_head_sha, default_branch};
pub use token::{AccessGrant, OAuthApp, TokenResponse, exchange_code};
