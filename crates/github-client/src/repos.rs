//! Repository and branch lookups

use common::Secret;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::constants::{API_ACCEPT, USER_AGENT};
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct RepositoryInfo {
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct BranchInfo {
    commit: CommitRef,
}

#[derive(Debug, Deserialize)]
struct CommitRef {
    sha: String,
}

/// Look up a repository's default branch. Unauthenticated.
pub async fn default_branch(
    client: &reqwest::Client,
    api_base_url: &str,
    owner: &str,
    repo: &str,
) -> Result<String> {
    let url = api_url(api_base_url, &["repos", owner, repo])?;
    let info: RepositoryInfo = get_json(client.get(url)).await?;
    Ok(info.default_branch)
}

/// Look up the tip commit SHA of `branch`, authenticated as the session's user.
pub async fn branch_head_sha(
    client: &reqwest::Client,
    api_base_url: &str,
    owner: &str,
    repo: &str,
    branch: &str,
    access_token: &Secret<String>,
) -> Result<String> {
    let url = api_url(api_base_url, &["repos", owner, repo, "branches", branch])?;
    let request = client.get(url).bearer_auth(access_token.expose());
    let info: BranchInfo = get_json(request).await?;
    Ok(info.commit.sha)
}

/// Join percent-encoded path segments onto the API base.
fn api_url(api_base_url: &str, segments: &[&str]) -> Result<Url> {
    let mut url =
        Url::parse(api_base_url).map_err(|e| Error::InvalidUrl(format!("{api_base_url}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| Error::InvalidUrl(format!("{api_base_url} cannot be a base")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

async fn get_json<T: DeserializeOwned>(request: reqwest::RequestBuilder) -> Result<T> {
    let response = request
        .header(reqwest::header::ACCEPT, API_ACCEPT)
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .send()
        .await
        .map_err(|e| Error::Http(e.to_string()))?;

    let status = response.status();
    let url = response.url().path().to_owned();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::UnexpectedResponse(format!(
            "{url} returned {status}: {body}"
        )));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| Error::Http(format!("reading {url}: {e}")))?;
    serde_json::from_slice(&body)
        .map_err(|e| Error::UnexpectedResponse(format!("{url}: {e}")))
}
