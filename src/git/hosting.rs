//! Hosting-provider REST contracts
//!
//! Opens a merge request (GitLab) or pull request (GitHub-compatible) from a
//! publish branch to trunk and returns its web URL.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::Serialize;
use tracing::{info, instrument};

use crate::config::HostingSettings;
use crate::error::{HostingError, Result};

/// A request to merge `source_branch` into `target_branch`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeProposal {
    pub title: String,
    pub body: String,
    pub source_branch: String,
    pub target_branch: String,
}

#[async_trait]
pub trait HostingApi: Send + Sync {
    /// `POST /api/v4/projects/{project}/merge_requests`, returns `web_url`
    async fn open_gitlab_merge_request(
        &self,
        project_path: &str,
        token: &str,
        proposal: &MergeProposal,
    ) -> Result<String>;

    /// `POST /repos/{owner}/{repo}/pulls`, returns `html_url`
    async fn open_github_pull_request(
        &self,
        owner_repo: &str,
        token: &str,
        proposal: &MergeProposal,
    ) -> Result<String>;
}

#[derive(Serialize)]
struct GitLabMergeRequestBody<'a> {
    title: &'a str,
    description: &'a str,
    source_branch: &'a str,
    target_branch: &'a str,
}

#[derive(Serialize)]
struct GitHubPullRequestBody<'a> {
    title: &'a str,
    body: &'a str,
    head: &'a str,
    base: &'a str,
}

/// [`HostingApi`] over HTTPS
pub struct HttpHostingApi {
    client: reqwest::Client,
    gitlab_base: String,
    github_base: String,
}

impl HttpHostingApi {
    pub fn new(settings: &HostingSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(HostingError::from)?;
        Ok(Self {
            client,
            gitlab_base: settings.gitlab_api_url.trim_end_matches('/').to_string(),
            github_base: settings.github_api_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl HostingApi for HttpHostingApi {
    #[instrument(skip(self, token, proposal), fields(source = %proposal.source_branch))]
    async fn open_gitlab_merge_request(
        &self,
        project_path: &str,
        token: &str,
        proposal: &MergeProposal,
    ) -> Result<String> {
        let url = format!(
            "{}/api/v4/projects/{}/merge_requests",
            self.gitlab_base,
            project_path.replace('/', "%2F")
        );
        let resp = self
            .client
            .post(url)
            .query(&[("private_token", token)])
            .json(&GitLabMergeRequestBody {
                title: &proposal.title,
                description: &proposal.body,
                source_branch: &proposal.source_branch,
                target_branch: &proposal.target_branch,
            })
            .send()
            .await
            .map_err(HostingError::from)?;

        let web_url = extract_url(resp, "web_url").await?;
        info!("Opened merge request {}", web_url);
        Ok(web_url)
    }

    #[instrument(skip(self, token, proposal), fields(source = %proposal.source_branch))]
    async fn open_github_pull_request(
        &self,
        owner_repo: &str,
        token: &str,
        proposal: &MergeProposal,
    ) -> Result<String> {
        let url = format!("{}/repos/{}/pulls", self.github_base, owner_repo);
        let resp = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&GitHubPullRequestBody {
                title: &proposal.title,
                body: &proposal.body,
                head: &proposal.source_branch,
                base: &proposal.target_branch,
            })
            .send()
            .await
            .map_err(HostingError::from)?;

        let html_url = extract_url(resp, "html_url").await?;
        info!("Opened pull request {}", html_url);
        Ok(html_url)
    }
}

/// Fail on non-2xx, then read one string field of the JSON body
async fn extract_url(resp: reqwest::Response, field: &'static str) -> Result<String> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(HostingError::RequestRejected {
            status: status.as_u16(),
            body,
        }
        .into());
    }

    let json: serde_json::Value = resp.json().await.map_err(HostingError::from)?;
    json.get(field)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| HostingError::MissingField(field).into())
}

/// `owner/repo` (or `group/subgroup/project`) from a remote URL, without `.git`
pub fn project_path(remote_url: &str) -> Result<String> {
    let url = Url::parse(remote_url.trim())
        .map_err(|_| HostingError::InvalidRepositoryUrl(remote_url.to_string()))?;
    let path = url.path().trim_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    if path.is_empty() {
        return Err(HostingError::InvalidRepositoryUrl(remote_url.to_string()).into());
    }
    Ok(path.to_string())
}
