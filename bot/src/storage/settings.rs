//! Settings file and secret management

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::BotError;
use crate::logs::LogLevel;

pub const DEFAULT_SETTINGS_PATH: &str = "/etc/deploybot/settings.json";

/// Bot settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Directory for rolling log files
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Emit JSON logs on stdout
    #[serde(default)]
    pub json_logs: bool,

    /// Local HTTP server
    #[serde(default)]
    pub server: ServerSettings,

    /// Source control
    #[serde(default)]
    pub github: GithubSettings,

    /// Deployment controller
    #[serde(default)]
    pub argo: ArgoSettings,

    /// Container registry
    #[serde(default)]
    pub registry: RegistrySettings,

    /// Chat platform
    #[serde(default)]
    pub slack: SlackSettings,

    /// Applications that may be deployed
    #[serde(default)]
    pub supported_apps: Vec<String>,

    /// Pusher name of the automation account that commits manifest changes
    #[serde(default)]
    pub trusted_pusher: String,

    /// Users allowed to deploy protected applications
    #[serde(default)]
    pub authorized_users: Vec<String>,

    /// Applications only authorized users may deploy
    #[serde(default)]
    pub protected_apps: Vec<String>,

    /// Status polling
    #[serde(default)]
    pub poll: PollSettings,

    /// Age after which an unfinished deployment no longer blocks a new one
    #[serde(default = "default_stale_claim_secs")]
    pub stale_claim_secs: u64,
}

fn default_stale_claim_secs() -> u64 {
    900
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_dir: None,
            json_logs: false,
            server: ServerSettings::default(),
            github: GithubSettings::default(),
            argo: ArgoSettings::default(),
            registry: RegistrySettings::default(),
            slack: SlackSettings::default(),
            supported_apps: Vec::new(),
            trusted_pusher: String::new(),
            authorized_users: Vec::new(),
            protected_apps: Vec::new(),
            poll: PollSettings::default(),
            stale_claim_secs: default_stale_claim_secs(),
        }
    }
}

impl Settings {
    /// Read settings from a JSON file
    pub async fn load(path: &Path) -> Result<Self, BotError> {
        debug!("Reading settings from {}", path.display());
        let contents = tokio::fs::read_to_string(path).await?;
        let settings: Settings = serde_json::from_str(&contents)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the bot cannot run with
    pub fn validate(&self) -> Result<(), BotError> {
        let required = [
            ("supported_apps", self.supported_apps.is_empty()),
            ("trusted_pusher", self.trusted_pusher.trim().is_empty()),
            ("github.owner", self.github.owner.trim().is_empty()),
            ("github.gitops_repo", self.github.gitops_repo.trim().is_empty()),
            ("argo.server_url", self.argo.server_url.trim().is_empty()),
            ("registry.url", self.registry.url.trim().is_empty()),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, empty)| *empty)
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(BotError::ConfigError(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }

        for (name, value) in [
            ("github.api_url", self.github.api_url.as_str()),
            ("argo.server_url", self.argo.server_url.as_str()),
            ("registry.url", self.registry.url.as_str()),
            ("slack.api_url", self.slack.api_url.as_str()),
        ] {
            url::Url::parse(value).map_err(|e| {
                BotError::ConfigError(format!("{} is not a valid URL ({}): {}", name, value, e))
            })?;
        }

        if self.poll.max_rounds == 0 || self.poll.synced_threshold == 0 {
            return Err(BotError::ConfigError(
                "poll.max_rounds and poll.synced_threshold must be positive".to_string(),
            ));
        }

        if let Some(app) = self
            .protected_apps
            .iter()
            .find(|app| !self.supported_apps.contains(app))
        {
            return Err(BotError::ConfigError(format!(
                "protected app {} is not in supported_apps",
                app
            )));
        }
        Ok(())
    }

    pub fn stale_claim_after(&self) -> Duration {
        Duration::from_secs(self.stale_claim_secs)
    }
}

/// Local HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// GitHub settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubSettings {
    #[serde(default = "default_github_api_url")]
    pub api_url: String,

    /// Organization owning both the application and GitOps repositories
    #[serde(default)]
    pub owner: String,

    /// Repository holding `{app}/values.yaml`
    #[serde(default)]
    pub gitops_repo: String,

    #[serde(default = "default_main_branch")]
    pub gitops_branch: String,

    /// Branch the `main` revision resolves to
    #[serde(default = "default_main_branch")]
    pub main_branch: String,

    /// Check run that marks an image as promoted
    #[serde(default = "default_gate_check")]
    pub gate_check: String,
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_main_branch() -> String {
    "main".to_string()
}

fn default_gate_check() -> String {
    "promote_image".to_string()
}

impl Default for GithubSettings {
    fn default() -> Self {
        Self {
            api_url: default_github_api_url(),
            owner: String::new(),
            gitops_repo: String::new(),
            gitops_branch: default_main_branch(),
            main_branch: default_main_branch(),
            gate_check: default_gate_check(),
        }
    }
}

/// Argo CD settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArgoSettings {
    /// API base URL
    #[serde(default)]
    pub server_url: String,

    /// UI base URL used for investigation links; defaults to the API URL
    #[serde(default)]
    pub ui_url: Option<String>,
}

impl ArgoSettings {
    pub fn application_link(&self, app: &str) -> String {
        let base = self.ui_url.as_deref().unwrap_or(&self.server_url);
        format!("{}/applications/{}", base.trim_end_matches('/'), app)
    }
}

/// Registry settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrySettings {
    #[serde(default)]
    pub url: String,
}

/// Slack settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackSettings {
    #[serde(default = "default_slack_api_url")]
    pub api_url: String,
}

fn default_slack_api_url() -> String {
    "https://slack.com/api".to_string()
}

impl Default for SlackSettings {
    fn default() -> Self {
        Self {
            api_url: default_slack_api_url(),
        }
    }
}

/// Status polling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollSettings {
    /// Delay after the sync request before the first poll
    #[serde(default = "default_poll_secs")]
    pub initial_delay_secs: u64,

    /// Delay between polls
    #[serde(default = "default_poll_secs")]
    pub interval_secs: u64,

    /// Rounds without completion before the deployment is reported stalled
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,

    /// Synced resources in one round that mark the deployment complete
    #[serde(default = "default_synced_threshold")]
    pub synced_threshold: usize,

    /// Resource kinds included in the status snapshot
    #[serde(default = "default_tracked_kinds")]
    pub tracked_kinds: Vec<String>,
}

fn default_poll_secs() -> u64 {
    4
}

fn default_max_rounds() -> u32 {
    6
}

fn default_synced_threshold() -> usize {
    2
}

fn default_tracked_kinds() -> Vec<String> {
    vec!["Deployment".to_string()]
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            initial_delay_secs: default_poll_secs(),
            interval_secs: default_poll_secs(),
            max_rounds: default_max_rounds(),
            synced_threshold: default_synced_threshold(),
            tracked_kinds: default_tracked_kinds(),
        }
    }
}

/// Credentials, read from the environment only
#[derive(Debug)]
pub struct Secrets {
    pub github_token: SecretString,
    pub argo_token: SecretString,
    pub slack_token: SecretString,
    pub slack_signing_secret: SecretString,
    pub github_webhook_secret: Option<SecretString>,
    pub registry_token: Option<SecretString>,
}

impl Secrets {
    pub fn from_env() -> Result<Self, BotError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, BotError> {
        let optional = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .map(SecretString::from)
        };
        let required = |key: &str| {
            optional(key).ok_or_else(|| BotError::ConfigError(format!("{} must be set", key)))
        };

        Ok(Self {
            github_token: required("GITHUB_API_TOKEN")?,
            argo_token: required("ARGOCD_JWT")?,
            slack_token: required("SLACK_AUTH_TOKEN")?,
            slack_signing_secret: required("SLACK_SIGNING_SECRET")?,
            github_webhook_secret: optional("GITHUB_WEBHOOK_SECRET"),
            registry_token: optional("REGISTRY_TOKEN"),
        })
    }
}
