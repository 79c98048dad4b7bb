//! In-memory collaborators for workflow tests

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use deploybot::deploy::orchestrator::Collaborators;
use deploybot::errors::BotError;
use deploybot::http::argo::ArgoExt;
use deploybot::http::github::{manifest_path, GithubExt, ManifestFile};
use deploybot::http::registry::RegistryExt;
use deploybot::http::slack::ChatExt;
use deploybot::models::deployment::ConversationContext;
use deploybot::storage::settings::Settings;
use inbound_models::models::AppMention;
use upstream_models::models::{
    ApplicationStatus, CheckRun, CommitRef, GitRef, PullRequest, ResourceStatus,
};

pub const HEAD_SHA: &str = "deadbeefdeadbeefdeadbeefdeadbeefdeadbeef";
pub const PR_SHA: &str = "abcdef0123456789abcdef0123456789abcdef01";
pub const TRUSTED_PUSHER: &str = "deploybot";

pub fn settings() -> Settings {
    serde_json::from_value(serde_json::json!({
        "supported_apps": ["time", "performance"],
        "protected_apps": ["performance"],
        "authorized_users": ["U022HC654DP", "UJ6APF5MF"],
        "trusted_pusher": TRUSTED_PUSHER,
        "github": {"owner": "acme", "gitops_repo": "gitops"},
        "argo": {"server_url": "https://argo.example.com"},
        "registry": {"url": "https://registry.example.com"}
    }))
    .unwrap()
}

pub fn mention(text: &str) -> AppMention {
    AppMention {
        user: "U8675309".to_string(),
        text: text.to_string(),
        channel: "C0DEPLOY".to_string(),
        ts: "1700000000.000100".to_string(),
        thread_ts: None,
    }
}

pub fn thread() -> ConversationContext {
    ConversationContext {
        channel: "C0DEPLOY".to_string(),
        thread_ts: "1700000000.000100".to_string(),
    }
}

pub fn values_yaml(tag: &str) -> Vec<u8> {
    format!(
        "replicaCount: 1\nimage:\n  repository: registry.example.com/time\n  tag: {}\n",
        tag
    )
    .into_bytes()
}

pub fn push_body(pusher: &str, modified: &[&str]) -> Vec<u8> {
    serde_json::json!({
        "ref": "refs/heads/main",
        "pusher": {"name": pusher, "email": "deploybot@example.com"},
        "head_commit": {"id": "c0ffee", "message": "Deploy time:main-deadbee", "modified": modified}
    })
    .to_string()
    .into_bytes()
}

pub fn status(pairs: &[(&str, &str)]) -> ApplicationStatus {
    ApplicationStatus {
        resources: pairs
            .iter()
            .map(|(name, state)| ResourceStatus {
                kind: "Deployment".to_string(),
                name: name.to_string(),
                namespace: Some("time".to_string()),
                status: Some(state.to_string()),
            })
            .collect(),
        ..Default::default()
    }
}

// ================================== GITHUB ======================================= //

#[derive(Default)]
pub struct FakeGithub {
    pub gate_status: Mutex<Option<String>>,
    pub manifest: Mutex<Option<Vec<u8>>>,
    pub conflict: Mutex<bool>,
    pub missing_pr: Mutex<bool>,
    pub commits: Mutex<Vec<(String, String, Vec<u8>, String)>>,
    pub calls: AtomicUsize,
}

impl FakeGithub {
    pub fn ready(manifest: Vec<u8>) -> Self {
        let fake = Self::default();
        *fake.gate_status.lock().unwrap() = Some("completed".to_string());
        *fake.manifest.lock().unwrap() = Some(manifest);
        fake
    }

    pub fn commit_count(&self) -> usize {
        self.commits.lock().unwrap().len()
    }
}

#[async_trait]
impl GithubExt for FakeGithub {
    async fn branch_head(&self, _repo: &str, _branch: &str) -> Result<String, BotError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(HEAD_SHA.to_string())
    }

    async fn pull_request(&self, repo: &str, number: u64) -> Result<PullRequest, BotError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.missing_pr.lock().unwrap() {
            return Err(BotError::Upstream {
                service: "github",
                status: 404,
                body: "{\"message\":\"Not Found\"}".to_string(),
            });
        }
        Ok(PullRequest {
            number,
            html_url: format!("https://github.com/acme/{}/pull/{}", repo, number),
            state: Some("open".to_string()),
            head: GitRef {
                ref_name: "feature/clock".to_string(),
                sha: PR_SHA.to_string(),
            },
        })
    }

    async fn check_runs(
        &self,
        _repo: &str,
        _sha: &str,
        check_name: &str,
    ) -> Result<Vec<CheckRun>, BotError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .gate_status
            .lock()
            .unwrap()
            .iter()
            .map(|status| CheckRun {
                name: check_name.to_string(),
                status: status.clone(),
                conclusion: None,
            })
            .collect())
    }

    async fn download_manifest(&self, app: &str) -> Result<ManifestFile, BotError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let content = self
            .manifest
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| BotError::NotFound(manifest_path(app)))?;
        Ok(ManifestFile {
            path: manifest_path(app),
            content,
            version: "blob-1".to_string(),
            html_url: Some(format!("https://github.com/acme/gitops/blob/main/{}/values.yaml", app)),
        })
    }

    async fn update_manifest(
        &self,
        app: &str,
        message: &str,
        content: &[u8],
        base_version: &str,
    ) -> Result<CommitRef, BotError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.conflict.lock().unwrap() {
            return Err(BotError::Conflict(format!("{} moved", app)));
        }
        self.commits.lock().unwrap().push((
            app.to_string(),
            message.to_string(),
            content.to_vec(),
            base_version.to_string(),
        ));
        Ok(CommitRef {
            sha: "1234567".to_string(),
            html_url: None,
        })
    }
}

// =================================== ARGO ======================================== //

/// Serves queued statuses in order; `None` entries fail with a 503. Once the
/// queue is drained the last status repeats.
#[derive(Default)]
pub struct FakeArgo {
    pub statuses: Mutex<VecDeque<Option<ApplicationStatus>>>,
    pub last: Mutex<Option<ApplicationStatus>>,
    pub fail_sync: Mutex<bool>,
    pub forwarded: Mutex<Vec<Vec<u8>>>,
    pub synced: Mutex<Vec<String>>,
    pub status_calls: AtomicUsize,
}

impl FakeArgo {
    pub fn with_statuses(statuses: Vec<Option<ApplicationStatus>>) -> Self {
        let fake = Self::default();
        *fake.statuses.lock().unwrap() = statuses.into();
        fake
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArgoExt for FakeArgo {
    async fn forward_push(&self, payload: &[u8]) -> Result<(), BotError> {
        self.forwarded.lock().unwrap().push(payload.to_vec());
        Ok(())
    }

    async fn sync_application(&self, app: &str) -> Result<(), BotError> {
        if *self.fail_sync.lock().unwrap() {
            return Err(BotError::Upstream {
                service: "argo",
                status: 403,
                body: "permission denied for token eyJhbGciOi".to_string(),
            });
        }
        self.synced.lock().unwrap().push(app.to_string());
        Ok(())
    }

    async fn application_status(&self, _app: &str) -> Result<ApplicationStatus, BotError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.statuses.lock().unwrap().pop_front();
        let status = match next {
            Some(entry) => {
                *self.last.lock().unwrap() = entry.clone();
                entry
            }
            None => self.last.lock().unwrap().clone(),
        };
        status.ok_or_else(|| BotError::Upstream {
            service: "argo",
            status: 503,
            body: "upstream connect error".to_string(),
        })
    }
}

// ================================= REGISTRY ====================================== //

#[derive(Default)]
pub struct FakeRegistry {
    pub tags: Mutex<HashMap<String, Vec<String>>>,
    pub fail: Mutex<bool>,
}

impl FakeRegistry {
    pub fn with_tags(app: &str, tags: &[&str]) -> Self {
        let fake = Self::default();
        fake.tags.lock().unwrap().insert(
            app.to_string(),
            tags.iter().map(|t| t.to_string()).collect(),
        );
        fake
    }
}

#[async_trait]
impl RegistryExt for FakeRegistry {
    async fn list_tags(&self, repository: &str) -> Result<Vec<String>, BotError> {
        if *self.fail.lock().unwrap() {
            return Err(BotError::Upstream {
                service: "registry",
                status: 401,
                body: "{\"errors\":[{\"code\":\"UNAUTHORIZED\",\"detail\":\"token abc123\"}]}"
                    .to_string(),
            });
        }
        Ok(self
            .tags
            .lock()
            .unwrap()
            .get(repository)
            .cloned()
            .unwrap_or_default())
    }
}

// =================================== CHAT ======================================== //

#[derive(Default)]
pub struct FakeChat {
    pub messages: Mutex<Vec<(ConversationContext, String)>>,
}

impl FakeChat {
    pub fn texts(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatExt for FakeChat {
    async fn post_reply(&self, context: &ConversationContext, text: &str) -> Result<(), BotError> {
        self.messages
            .lock()
            .unwrap()
            .push((context.clone(), text.to_string()));
        Ok(())
    }
}

// ================================== BUNDLE ======================================= //

pub struct Fakes {
    pub github: Arc<FakeGithub>,
    pub argo: Arc<FakeArgo>,
    pub registry: Arc<FakeRegistry>,
    pub chat: Arc<FakeChat>,
}

impl Fakes {
    pub fn new(github: FakeGithub, argo: FakeArgo, registry: FakeRegistry) -> Self {
        Self {
            github: Arc::new(github),
            argo: Arc::new(argo),
            registry: Arc::new(registry),
            chat: Arc::new(FakeChat::default()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            github: self.github.clone(),
            argo: self.argo.clone(),
            registry: self.registry.clone(),
            chat: self.chat.clone(),
        }
    }
}
