//! Deployment workflow driver
//!
//! `handle_command` runs the chat half of a deployment up to the manifest
//! commit. `handle_push` picks it up again when the commit's push webhook
//! arrives, then triggers and watches the sync.

use std::sync::Arc;

use inbound_models::models::AppMention;
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::deploy::artifact;
use crate::deploy::command::{CommandValidator, Rejection};
use crate::deploy::correlation::DeploymentTracker;
use crate::deploy::manifest::{self, ManifestUpdate};
use crate::deploy::narrate::Narrator;
use crate::deploy::poller::{self, PollOutcome};
use crate::deploy::publish::{self, PublishOutcome};
use crate::deploy::readiness;
use crate::deploy::webhook::{self, PushRejection};
use crate::errors::BotError;
use crate::http::argo::ArgoExt;
use crate::http::github::GithubExt;
use crate::http::registry::RegistryExt;
use crate::http::slack::ChatExt;
use crate::models::deployment::{ConversationContext, DeploymentRequest, Revision};
use crate::storage::settings::{ArgoSettings, Settings};

/// Upstream services the workflow talks to
#[derive(Clone)]
pub struct Collaborators {
    pub github: Arc<dyn GithubExt>,
    pub argo: Arc<dyn ArgoExt>,
    pub registry: Arc<dyn RegistryExt>,
    pub chat: Arc<dyn ChatExt>,
}

/// How a deploy command ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Rejected(Rejection),
    /// Another deployment of the application is live
    Busy,
    /// The branch or pull request does not exist
    SourceNotFound,
    /// The registry has no image with this tag
    NotPublished { tag: String },
    /// The gate check has not completed
    NotReady { tag: String },
    /// The manifest already deploys this tag
    AlreadySet { tag: String },
    /// The manifest changed while it was being updated
    Conflict,
    /// Manifest committed; the push webhook continues the deployment
    Published { tag: String, commit: String },
    /// An upstream call failed; carries the redacted summary
    Failed(String),
}

/// How a push webhook was handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// Dropped without reply
    Ignored(PushRejection),
    /// The payload was authentic but unreadable
    Unreadable,
    /// The sync ran to a terminal state
    Synced {
        application: String,
        correlated: bool,
        outcome: PollOutcome,
    },
}

pub struct Orchestrator {
    clients: Collaborators,
    validator: CommandValidator,
    tracker: Arc<DeploymentTracker>,
    main_branch: String,
    gate_check: String,
    trusted_pusher: String,
    argo_settings: ArgoSettings,
    poll: poller::Options,
    webhook_secret: Option<SecretString>,
}

impl Orchestrator {
    pub fn new(
        clients: Collaborators,
        settings: &Settings,
        webhook_secret: Option<SecretString>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            clients,
            validator: CommandValidator::from_settings(settings),
            tracker: Arc::new(DeploymentTracker::new(settings.stale_claim_after(), shutdown)),
            main_branch: settings.github.main_branch.clone(),
            gate_check: settings.github.gate_check.clone(),
            trusted_pusher: settings.trusted_pusher.clone(),
            argo_settings: settings.argo.clone(),
            poll: poller::Options::from(&settings.poll),
            webhook_secret,
        }
    }

    pub fn tracker(&self) -> &Arc<DeploymentTracker> {
        &self.tracker
    }

    // ============================= CHAT COMMANDS ================================ //

    /// Run a deploy command from a bot mention up to the manifest commit
    pub async fn handle_command(&self, mention: &AppMention) -> CommandOutcome {
        info!(user = %mention.user, channel = %mention.channel, "Command received: {}", mention.text);
        let context = ConversationContext {
            channel: mention.channel.clone(),
            thread_ts: mention.thread_ts.clone().unwrap_or_else(|| mention.ts.clone()),
        };

        let (application, revision) = match self
            .validator
            .validate(&mention.text)
            .and_then(|(app, rev)| self.validator.authorize(&mention.user, &app).map(|_| (app, rev)))
        {
            Ok(parsed) => parsed,
            Err(rejection) => {
                info!(user = %mention.user, "Command rejected: {}", rejection);
                Narrator::new(self.clients.chat.as_ref(), Some(&context), "")
                    .say(&rejection.to_string())
                    .await;
                return CommandOutcome::Rejected(rejection);
            }
        };

        let request = DeploymentRequest {
            application,
            revision,
            requested_by: mention.user.clone(),
            context,
        };
        let narrator = Narrator::new(
            self.clients.chat.as_ref(),
            Some(&request.context),
            &request.application,
        );

        let claim = match self.tracker.claim(&request.application, request.context.clone()) {
            Ok(claim) => claim,
            Err(busy) => {
                info!(app = %request.application, phase = ?busy.phase, "Deployment already in progress");
                narrator.say(&busy.to_string()).await;
                return CommandOutcome::Busy;
            }
        };

        let outcome = self.prepare_and_publish(&request, &narrator).await;
        match &outcome {
            CommandOutcome::Published { .. } => {
                if !self.tracker.commit_published(&request.application, claim.generation) {
                    warn!(app = %request.application, "Claim superseded before the commit was recorded");
                }
            }
            _ => {
                self.tracker.release(&request.application, claim.generation);
            }
        }
        outcome
    }

    async fn prepare_and_publish(
        &self,
        request: &DeploymentRequest,
        narrator: &Narrator<'_>,
    ) -> CommandOutcome {
        let app = request.application.as_str();
        let github = self.clients.github.as_ref();

        let source = match artifact::resolve_source(github, &self.main_branch, app, &request.revision).await {
            Ok(source) => source,
            Err(e) if e.is_not_found() => {
                info!(app = %app, revision = %request.revision, "Source revision not found");
                let what = match request.revision {
                    Revision::Main => format!("branch `{}`", self.main_branch),
                    Revision::PullRequest(number) => format!("pull request #{}", number),
                };
                narrator
                    .say(&format!("Could not find {} of `{}`", what, app))
                    .await;
                return CommandOutcome::SourceNotFound;
            }
            Err(e) => return self.infrastructure_error(narrator, "resolving the revision", e).await,
        };
        match &source.html_url {
            Some(url) => narrator.say(&format!("Fetching {}", url)).await,
            None => narrator.say(&format!("Fetching {} {}", app, request.revision)).await,
        }

        let artifact = match artifact::check_published(
            self.clients.registry.as_ref(),
            app,
            &request.revision,
            &source,
        )
        .await
        {
            Ok(artifact) => artifact,
            Err(e) => return self.infrastructure_error(narrator, "listing registry images", e).await,
        };
        if !artifact.published {
            info!(app = %app, tag = %artifact.tag, "Image not published");
            narrator
                .say(&format!("`{}` does not exist in the registry", artifact.tag))
                .await;
            return CommandOutcome::NotPublished { tag: artifact.tag };
        }
        narrator
            .say(&format!("`{}` found in the registry", artifact.tag))
            .await;

        match readiness::checks_complete(github, app, &artifact.sha, &self.gate_check).await {
            Ok(true) => {
                narrator
                    .say(&format!("`{}` completed for `{}`", self.gate_check, artifact.tag))
                    .await
            }
            Ok(false) => {
                info!(app = %app, tag = %artifact.tag, "Gate check not complete");
                narrator
                    .say(&format!(
                        "`{}` has not been promoted yet; `{}` is still underway",
                        artifact.tag, self.gate_check
                    ))
                    .await;
                return CommandOutcome::NotReady { tag: artifact.tag };
            }
            Err(e) => return self.infrastructure_error(narrator, "reading check runs", e).await,
        }

        let manifest_file = match github.download_manifest(app).await {
            Ok(file) => file,
            Err(e) => return self.infrastructure_error(narrator, "downloading the manifest", e).await,
        };
        let location = manifest_file
            .html_url
            .clone()
            .unwrap_or_else(|| manifest_file.path.clone());
        narrator.say(&format!("Downloading {}", location)).await;

        let updated = match manifest::prepare_update(&manifest_file.content, &artifact.tag) {
            Ok(ManifestUpdate::Updated(bytes)) => bytes,
            Ok(ManifestUpdate::AlreadySet) => {
                info!(app = %app, tag = %artifact.tag, "Image tag already set");
                narrator
                    .say(&format!("The image tag is already set to `{}`", artifact.tag))
                    .await;
                return CommandOutcome::AlreadySet { tag: artifact.tag };
            }
            Err(e) => return self.infrastructure_error(narrator, "updating the manifest", e).await,
        };

        match publish::publish(github, app, &artifact.tag, &updated, &manifest_file.version).await {
            Ok(PublishOutcome::Published(commit)) => {
                narrator
                    .say(&format!("Updating image.tag to {}", artifact.tag))
                    .await;
                CommandOutcome::Published {
                    tag: artifact.tag,
                    commit: commit.sha,
                }
            }
            Ok(PublishOutcome::Conflict) => {
                narrator
                    .say(&format!(
                        "The manifest of `{}` was changed by someone else while it was being updated. Please retry",
                        app
                    ))
                    .await;
                CommandOutcome::Conflict
            }
            Err(e) => self.infrastructure_error(narrator, "committing the manifest", e).await,
        }
    }

    async fn infrastructure_error(
        &self,
        narrator: &Narrator<'_>,
        step: &str,
        e: BotError,
    ) -> CommandOutcome {
        error!("Deployment halted while {}: {}", step, e);
        let summary = e.redacted();
        narrator
            .say(&format!("Error while {}: {}", step, summary))
            .await;
        CommandOutcome::Failed(summary)
    }

    // ============================== PUSH WEBHOOKS =============================== //

    /// Continue a deployment from its push webhook
    pub async fn handle_push(&self, body: &[u8], signature: Option<&str>) -> PushOutcome {
        if let Some(secret) = &self.webhook_secret {
            if !webhook::verify_signature(body, signature, secret) {
                warn!("Ignoring push with a bad signature");
                return PushOutcome::Ignored(PushRejection::BadSignature);
            }
        }

        if let Err(rejection) = webhook::authenticate_pusher(body, &self.trusted_pusher) {
            info!("Ignoring push: {}", rejection);
            return PushOutcome::Ignored(rejection);
        }

        let application = match webhook::parse_push(body)
            .and_then(|event| webhook::application_from_push(&event))
        {
            Ok(application) => application,
            Err(e) => {
                self.report_unreadable_push(body, e).await;
                return PushOutcome::Unreadable;
            }
        };

        let correlation = self.tracker.take_for_webhook(&application);
        let narrator = Narrator::new(
            self.clients.chat.as_ref(),
            correlation.context.as_ref(),
            &application,
        );
        let link = self.argo_settings.application_link(&application);

        let outcome = poller::run(
            &self.poll,
            self.clients.argo.as_ref(),
            &narrator,
            &application,
            body,
            &link,
            &correlation.cancel,
            tokio::time::sleep,
        )
        .await;
        info!(app = %application, state = ?outcome.state(), "Sync finished");

        if let Some(generation) = correlation.generation {
            self.tracker.release(&application, generation);
        }

        PushOutcome::Synced {
            application,
            correlated: correlation.context.is_some(),
            outcome,
        }
    }

    async fn report_unreadable_push(&self, body: &[u8], e: BotError) {
        let hint = webhook::application_hint(body);
        warn!(app = ?hint, "Unreadable push payload: {}", e);

        let Some(application) = hint else {
            return;
        };
        let Some(context) = self.tracker.abandon(&application) else {
            return;
        };
        Narrator::new(self.clients.chat.as_ref(), Some(&context), &application)
            .say(&format!(
                "Could not read the push webhook for `{}`: {}",
                application,
                e.redacted()
            ))
            .await;
    }
}
