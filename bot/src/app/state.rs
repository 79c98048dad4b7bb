//! Application state management

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

use crate::deploy::orchestrator::{Collaborators, Orchestrator};
use crate::errors::BotError;
use crate::http::argo::ArgoClient;
use crate::http::client::HttpClient;
use crate::http::github::{GithubClient, GITHUB_ACCEPT};
use crate::http::registry::RegistryClient;
use crate::http::slack::SlackClient;
use crate::storage::settings::{Secrets, Settings};

/// Main application state
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,

    /// Deployments spawned by request handlers
    pub tasks: TaskTracker,

    /// Parent of every deployment's cancellation token
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Build the upstream clients and the orchestrator
    pub fn init(settings: &Settings, secrets: &Secrets) -> Result<Self, BotError> {
        info!("Initializing application state...");

        let clients = Collaborators {
            github: Arc::new(GithubClient::new(
                HttpClient::new(
                    "github",
                    &settings.github.api_url,
                    Some(secrets.github_token.clone()),
                )?
                .with_accept(GITHUB_ACCEPT),
                &settings.github.owner,
                &settings.github.gitops_repo,
                &settings.github.gitops_branch,
            )),
            argo: Arc::new(ArgoClient::new(HttpClient::new(
                "argo",
                &settings.argo.server_url,
                Some(secrets.argo_token.clone()),
            )?)),
            registry: Arc::new(RegistryClient::new(HttpClient::new(
                "registry",
                &settings.registry.url,
                secrets.registry_token.clone(),
            )?)),
            chat: Arc::new(SlackClient::new(HttpClient::new(
                "slack",
                &settings.slack.api_url,
                Some(secrets.slack_token.clone()),
            )?)),
        };

        let shutdown = CancellationToken::new();
        let orchestrator = Orchestrator::new(
            clients,
            settings,
            secrets.github_webhook_secret.clone(),
            shutdown.clone(),
        );

        Ok(Self {
            orchestrator: Arc::new(orchestrator),
            tasks: TaskTracker::new(),
            shutdown,
        })
    }

    /// Cancel running deployments and wait for their tasks to finish
    pub async fn shutdown(&self) -> Result<(), BotError> {
        info!(
            "Shutting down application state ({} deployments in flight)...",
            self.orchestrator.tracker().len()
        );
        self.shutdown.cancel();
        self.tasks.close();
        self.tasks.wait().await;
        Ok(())
    }
}
