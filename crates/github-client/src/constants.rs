//! GitHub endpoint defaults
//!
//! Production values. The relay's config can override both base URLs, which
//! is how tests substitute stub servers.

/// Base URL serving the OAuth authorize and access token endpoints
pub const DEFAULT_OAUTH_BASE_URL: &str = "https://github.com";

/// Base URL of the REST API
pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";

/// Path of the user consent page, relative to the OAuth base
pub const AUTHORIZE_PATH: &str = "/login/oauth/authorize";

/// Path of the code exchange endpoint, relative to the OAuth base
pub const ACCESS_TOKEN_PATH: &str = "/login/oauth/access_token";

/// Scope requested by default: read/write access to public repositories
pub const DEFAULT_SCOPE: &str = "public_repo";

/// GitHub rejects REST requests without a User-Agent
pub const USER_AGENT: &str = concat!("github-relay/", env!("CARGO_PKG_VERSION"));

/// Media type for REST responses
pub const API_ACCEPT: &str = "application/vnd.github+json";
