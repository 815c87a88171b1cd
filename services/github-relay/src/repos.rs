//! Authenticated GitHub proxy endpoint
//!
//! Resolves a repository's default branch, then reads that branch's tip
//! commit with the session's access token. Upstream failures are returned
//! to the client with the underlying message.

use axum::Extension;
use axum::extract::{Path, State};
use tracing::{error, instrument};

use crate::auth::AccessToken;
use crate::error::RelayError;
use crate::flow::RelayState;
use crate::metrics;

/// GET /repos/{owner}/{repo}/files: tip commit SHA of the default branch.
#[instrument(skip(state, access_token))]
pub async fn head_commit(
    State(state): State<RelayState>,
    Extension(AccessToken(access_token)): Extension<AccessToken>,
    Path((owner, repo)): Path<(String, String)>,
) -> Result<String, RelayError> {
    let api_base = &state.github.api_base_url;

    let branch = github_client::default_branch(&state.http_client, api_base, &owner, &repo)
        .await
        .map_err(|e| fetch_failed("repository", e))?;

    github_client::branch_head_sha(
        &state.http_client,
        api_base,
        &owner,
        &repo,
        &branch,
        &access_token,
    )
    .await
    .map_err(|e| fetch_failed("branch", e))
}

fn fetch_failed(operation: &'static str, err: github_client::Error) -> RelayError {
    metrics::record_upstream_error(operation);
    error!(operation, error = %err, "GitHub fetch failed");
    RelayError::UpstreamFetchFailed(err.to_string())
}
