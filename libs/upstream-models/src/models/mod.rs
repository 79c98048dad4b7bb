//! Upstream API models

use serde::{Deserialize, Serialize};

// ================================= GITHUB ======================================= //

/// Commit returned by `GET /repos/{owner}/{repo}/commits/{ref}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    #[serde(default)]
    pub html_url: Option<String>,
}

/// Pull request returned by `GET /repos/{owner}/{repo}/pulls/{number}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub html_url: String,
    #[serde(default)]
    pub state: Option<String>,
    pub head: GitRef,
}

/// Branch reference of a pull request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitRef {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub sha: String,
}

/// File returned by `GET /repos/{owner}/{repo}/contents/{path}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentFile {
    pub path: String,
    /// Blob SHA, used as the optimistic-concurrency token on update
    pub sha: String,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub encoding: String,
}

/// Body of `PUT /repos/{owner}/{repo}/contents/{path}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateFileRequest {
    pub message: String,
    /// Base64 encoded file content
    pub content: String,
    /// Blob SHA of the file being replaced
    pub sha: String,
    pub branch: String,
}

/// Response of a file update
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateFileResponse {
    pub commit: CommitRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRef {
    pub sha: String,
    #[serde(default)]
    pub html_url: Option<String>,
}

/// Response of `GET /repos/{owner}/{repo}/commits/{sha}/check-runs`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRunList {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub check_runs: Vec<CheckRun>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRun {
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub conclusion: Option<String>,
}

// ================================= ARGO CD ====================================== //

/// Application returned by `GET /api/v1/applications/{name}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    #[serde(default)]
    pub metadata: ApplicationMetadata,
    pub status: ApplicationStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplicationMetadata {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplicationStatus {
    #[serde(default)]
    pub resources: Vec<ResourceStatus>,
    #[serde(default)]
    pub sync: Option<SyncStatus>,
    #[serde(default)]
    pub health: Option<HealthStatus>,
}

/// A single managed resource of an application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceStatus {
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    /// Sync state such as `Synced`, `OutOfSync` or `Unknown`
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStatus {
    pub status: String,
    #[serde(default)]
    pub revision: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

/// Body of `POST /api/v1/applications/{name}/sync`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub prune: bool,
    pub dry_run: bool,
}

// ================================= REGISTRY ===================================== //

/// Response of `GET /v2/{name}/tags/list`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagList {
    pub name: String,
    /// The registry reports `null` for a repository without tags
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

// ================================== SLACK ======================================= //

/// Body of `POST chat.postMessage`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostMessageRequest {
    pub channel: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    pub unfurl_links: bool,
}

/// Slack Web API envelope; failures come back as `ok: false` with HTTP 200
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostMessageResponse {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub ts: Option<String>,
}
