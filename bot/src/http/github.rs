//! GitHub API client

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use tracing::{debug, warn};
use upstream_models::models::{
    CheckRun, CheckRunList, Commit, CommitRef, ContentFile, PullRequest, UpdateFileRequest,
    UpdateFileResponse,
};

use crate::errors::BotError;
use crate::http::client::HttpClient;

pub const GITHUB_ACCEPT: &str = "application/vnd.github+json";

/// A GitOps manifest together with the version it was read at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestFile {
    pub path: String,
    pub content: Vec<u8>,
    /// Blob SHA; an update must present it to succeed
    pub version: String,
    pub html_url: Option<String>,
}

/// Source control operations used by the pipeline
#[async_trait]
pub trait GithubExt: Send + Sync {
    /// Head commit SHA of `branch` in the application's repository
    async fn branch_head(&self, repo: &str, branch: &str) -> Result<String, BotError>;

    /// Pull request `number` of the application's repository
    async fn pull_request(&self, repo: &str, number: u64) -> Result<PullRequest, BotError>;

    /// Check runs named `check_name` for `sha`
    async fn check_runs(
        &self,
        repo: &str,
        sha: &str,
        check_name: &str,
    ) -> Result<Vec<CheckRun>, BotError>;

    /// Download `{app}/values.yaml` from the GitOps repository
    async fn download_manifest(&self, app: &str) -> Result<ManifestFile, BotError>;

    /// Commit new manifest content, failing with `BotError::Conflict` when
    /// `base_version` is no longer current
    async fn update_manifest(
        &self,
        app: &str,
        message: &str,
        content: &[u8],
        base_version: &str,
    ) -> Result<CommitRef, BotError>;
}

/// Path of an application's manifest inside the GitOps repository
pub fn manifest_path(app: &str) -> String {
    format!("{}/values.yaml", app)
}

/// GitHub REST client
pub struct GithubClient {
    http: HttpClient,
    owner: String,
    gitops_repo: String,
    gitops_branch: String,
}

impl GithubClient {
    pub fn new(http: HttpClient, owner: &str, gitops_repo: &str, gitops_branch: &str) -> Self {
        Self {
            http,
            owner: owner.to_string(),
            gitops_repo: gitops_repo.to_string(),
            gitops_branch: gitops_branch.to_string(),
        }
    }

    fn repo_path(&self, repo: &str, rest: &str) -> String {
        format!("/repos/{}/{}{}", self.owner, repo, rest)
    }
}

#[async_trait]
impl GithubExt for GithubClient {
    async fn branch_head(&self, repo: &str, branch: &str) -> Result<String, BotError> {
        let path = self.repo_path(repo, &format!("/commits/{}", branch));
        let commit: Commit = self.http.get(&path).await?;
        debug!("Head of {}/{} is {}", repo, branch, commit.sha);
        Ok(commit.sha)
    }

    async fn pull_request(&self, repo: &str, number: u64) -> Result<PullRequest, BotError> {
        let path = self.repo_path(repo, &format!("/pulls/{}", number));
        self.http.get(&path).await
    }

    async fn check_runs(
        &self,
        repo: &str,
        sha: &str,
        check_name: &str,
    ) -> Result<Vec<CheckRun>, BotError> {
        let path = self.repo_path(repo, &format!("/commits/{}/check-runs", sha));
        let list: CheckRunList = self
            .http
            .get_with_query(&path, &[("check_name", check_name)])
            .await?;
        Ok(list.check_runs)
    }

    async fn download_manifest(&self, app: &str) -> Result<ManifestFile, BotError> {
        let file_path = manifest_path(app);
        let path = self.repo_path(&self.gitops_repo, &format!("/contents/{}", file_path));
        let file: ContentFile = self
            .http
            .get_with_query(&path, &[("ref", self.gitops_branch.as_str())])
            .await?;

        if file.encoding != "base64" {
            return Err(BotError::ManifestError(format!(
                "{} has unsupported encoding '{}'",
                file.path, file.encoding
            )));
        }

        // GitHub wraps base64 content at 60 columns
        let packed: String = file.content.split_whitespace().collect();
        let content = STANDARD.decode(packed).map_err(|e| {
            BotError::ManifestError(format!("{} could not be decoded: {}", file.path, e))
        })?;

        Ok(ManifestFile {
            path: file.path,
            content,
            version: file.sha,
            html_url: file.html_url,
        })
    }

    async fn update_manifest(
        &self,
        app: &str,
        message: &str,
        content: &[u8],
        base_version: &str,
    ) -> Result<CommitRef, BotError> {
        let file_path = manifest_path(app);
        let path = self.repo_path(&self.gitops_repo, &format!("/contents/{}", file_path));
        let body = UpdateFileRequest {
            message: message.to_string(),
            content: STANDARD.encode(content),
            sha: base_version.to_string(),
            branch: self.gitops_branch.clone(),
        };

        match self.http.put::<UpdateFileResponse, _>(&path, &body).await {
            Ok(updated) => Ok(updated.commit),
            Err(BotError::Upstream { status: 409, body, .. }) => {
                warn!("Manifest {} changed since version {}", file_path, base_version);
                Err(BotError::Conflict(format!(
                    "{} is no longer at version {}: {}",
                    file_path, base_version, body
                )))
            }
            Err(e) => Err(e),
        }
    }
}
