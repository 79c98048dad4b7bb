//! Sync trigger and status polling

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use upstream_models::models::ApplicationStatus;

use crate::deploy::fsm::{SyncEvent, SyncFsm, SyncState};
use crate::deploy::narrate::Narrator;
use crate::errors::BotError;
use crate::http::argo::ArgoExt;
use crate::storage::settings::PollSettings;

pub const SYNCED: &str = "Synced";
pub const OUT_OF_SYNC: &str = "OutOfSync";
pub const UNKNOWN: &str = "Unknown";

/// Poller options
#[derive(Debug, Clone)]
pub struct Options {
    /// Delay after the sync request before the first poll
    pub initial_delay: Duration,

    /// Delay between polls
    pub interval: Duration,

    /// Rounds without completion before giving up
    pub max_rounds: u32,

    /// Synced resources in one round that mark completion
    pub synced_threshold: usize,

    /// Resource kinds that make up the snapshot
    pub tracked_kinds: Vec<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self::from(&PollSettings::default())
    }
}

impl From<&PollSettings> for Options {
    fn from(settings: &PollSettings) -> Self {
        Self {
            initial_delay: Duration::from_secs(settings.initial_delay_secs),
            interval: Duration::from_secs(settings.interval_secs),
            max_rounds: settings.max_rounds,
            synced_threshold: settings.synced_threshold,
            tracked_kinds: settings.tracked_kinds.clone(),
        }
    }
}

/// One resource's sync state in a round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceState {
    pub name: String,
    pub state: String,
}

/// Tracked resources of `status`, in the order Argo lists them
pub fn snapshot(status: &ApplicationStatus, tracked_kinds: &[String]) -> Vec<ResourceState> {
    status
        .resources
        .iter()
        .filter(|r| tracked_kinds.iter().any(|kind| *kind == r.kind))
        .map(|r| ResourceState {
            name: r.name.clone(),
            state: r.status.clone().unwrap_or_else(|| UNKNOWN.to_string()),
        })
        .collect()
}

pub fn format_snapshot(application: &str, round: u32, resources: &[ResourceState]) -> String {
    if resources.is_empty() {
        return format!("`{}` round {}: no tracked resources reported yet", application, round);
    }
    let states: Vec<String> = resources
        .iter()
        .map(|r| format!("{}: {}", r.name, r.state))
        .collect();
    format!("`{}` round {}: {}", application, round, states.join(", "))
}

/// What a round decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundVerdict {
    Continue,
    Completed,
    Stalled,
}

/// Counters for one sync wait
#[derive(Debug, Clone)]
pub struct PollState {
    pub application: String,
    pub round: u32,
    pub max_rounds: u32,
    pub synced_threshold: usize,
    /// Rounds in which any resource was OutOfSync
    pub out_of_sync_rounds: u32,
    /// Rounds in which any resource was Unknown
    pub unknown_rounds: u32,
    /// Rounds whose status could not be fetched
    pub failed_rounds: u32,
}

impl PollState {
    pub fn new(application: &str, options: &Options) -> Self {
        Self {
            application: application.to_string(),
            round: 0,
            max_rounds: options.max_rounds,
            synced_threshold: options.synced_threshold,
            out_of_sync_rounds: 0,
            unknown_rounds: 0,
            failed_rounds: 0,
        }
    }

    /// Count a round that produced `resources`.
    ///
    /// Completion is checked before the round limit, so a final round that
    /// reaches the threshold still completes.
    pub fn observe(&mut self, resources: &[ResourceState]) -> RoundVerdict {
        self.round += 1;
        let synced = resources.iter().filter(|r| r.state == SYNCED).count();
        if resources.iter().any(|r| r.state == OUT_OF_SYNC) {
            self.out_of_sync_rounds += 1;
        }
        if resources.iter().any(|r| r.state == UNKNOWN) {
            self.unknown_rounds += 1;
        }
        debug!(
            app = %self.application,
            round = self.round,
            synced,
            out_of_sync_rounds = self.out_of_sync_rounds,
            unknown_rounds = self.unknown_rounds,
            "Observed sync round"
        );

        if synced >= self.synced_threshold {
            RoundVerdict::Completed
        } else {
            self.limit_verdict()
        }
    }

    /// Count a round whose status fetch failed
    pub fn fail_round(&mut self) -> RoundVerdict {
        self.round += 1;
        self.failed_rounds += 1;
        self.limit_verdict()
    }

    fn limit_verdict(&self) -> RoundVerdict {
        if self.round >= self.max_rounds {
            RoundVerdict::Stalled
        } else {
            RoundVerdict::Continue
        }
    }
}

/// How a sync wait ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Completed { round: u32 },
    Stalled {
        rounds: u32,
        out_of_sync_rounds: u32,
        unknown_rounds: u32,
    },
    /// The controller rejected the push or the sync; carries the redacted reason
    Failed(String),
    Cancelled,
}

impl PollOutcome {
    pub fn state(&self) -> SyncState {
        match self {
            PollOutcome::Completed { .. } => SyncState::Completed,
            PollOutcome::Stalled { .. } => SyncState::Stalled,
            PollOutcome::Failed(_) => SyncState::Failed,
            PollOutcome::Cancelled => SyncState::Cancelled,
        }
    }
}

/// Hand the push to Argo, then ask it to sync `application`
pub async fn trigger(argo: &dyn ArgoExt, application: &str, payload: &[u8]) -> Result<(), BotError> {
    argo.forward_push(payload).await?;
    argo.sync_application(application).await
}

/// Trigger a sync of `application` and poll until it completes, stalls,
/// fails to trigger, or `cancel` fires between rounds
#[allow(clippy::too_many_arguments)]
pub async fn run<S, F>(
    options: &Options,
    argo: &dyn ArgoExt,
    narrator: &Narrator<'_>,
    application: &str,
    payload: &[u8],
    status_link: &str,
    cancel: &CancellationToken,
    sleep_fn: S,
) -> PollOutcome
where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    let mut fsm = SyncFsm::new();
    advance(&mut fsm, SyncEvent::Trigger);

    narrator
        .say(&format!("Syncing `{}` in Argo CD", application))
        .await;
    if let Err(e) = trigger(argo, application, payload).await {
        error!(app = %application, "Sync trigger failed: {}", e);
        advance(&mut fsm, SyncEvent::TriggerFailed(e.to_string()));
        narrator
            .say(&format!("Sync of `{}` failed: {}", application, e.redacted()))
            .await;
        return PollOutcome::Failed(e.redacted());
    }
    advance(&mut fsm, SyncEvent::Triggered);

    if !pause(cancel, sleep_fn(options.initial_delay)).await {
        return cancelled(&mut fsm, narrator, application).await;
    }

    let mut state = PollState::new(application, options);
    loop {
        if cancel.is_cancelled() {
            return cancelled(&mut fsm, narrator, application).await;
        }

        let verdict = match argo.application_status(application).await {
            Ok(status) => {
                let resources = snapshot(&status, &options.tracked_kinds);
                narrator
                    .say(&format_snapshot(application, state.round + 1, &resources))
                    .await;
                state.observe(&resources)
            }
            Err(e) => {
                error!(app = %application, round = state.round + 1, "Status fetch failed: {}", e);
                narrator
                    .say(&format!(
                        "Could not fetch the status of `{}` (round {}): {}",
                        application,
                        state.round + 1,
                        e.redacted()
                    ))
                    .await;
                state.fail_round()
            }
        };

        match verdict {
            RoundVerdict::Completed => {
                advance(&mut fsm, SyncEvent::Synced);
                info!(app = %application, round = state.round, "Deployment synced");
                narrator
                    .say(&format!(
                        "`{}` is synced (round {})",
                        application, state.round
                    ))
                    .await;
                return PollOutcome::Completed { round: state.round };
            }
            RoundVerdict::Stalled => {
                advance(&mut fsm, SyncEvent::RoundLimit);
                warn!(
                    app = %application,
                    rounds = state.round,
                    out_of_sync_rounds = state.out_of_sync_rounds,
                    unknown_rounds = state.unknown_rounds,
                    failed_rounds = state.failed_rounds,
                    "Deployment did not sync within the round limit"
                );
                narrator
                    .say(&format!(
                        "Potential sync error for `{}`, please investigate: {} \
                         (no completion after {} rounds; OutOfSync in {}, Unknown in {})",
                        application,
                        status_link,
                        state.round,
                        state.out_of_sync_rounds,
                        state.unknown_rounds
                    ))
                    .await;
                return PollOutcome::Stalled {
                    rounds: state.round,
                    out_of_sync_rounds: state.out_of_sync_rounds,
                    unknown_rounds: state.unknown_rounds,
                };
            }
            RoundVerdict::Continue => {}
        }

        if !pause(cancel, sleep_fn(options.interval)).await {
            return cancelled(&mut fsm, narrator, application).await;
        }
    }
}

/// Wait for `sleep`; false if `cancel` fired first
async fn pause<F: Future<Output = ()>>(cancel: &CancellationToken, sleep: F) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = sleep => true,
    }
}

async fn cancelled(fsm: &mut SyncFsm, narrator: &Narrator<'_>, application: &str) -> PollOutcome {
    advance(fsm, SyncEvent::Cancel);
    info!(app = %application, "Status polling cancelled");
    narrator
        .say(&format!("Stopped watching `{}`: deployment cancelled", application))
        .await;
    PollOutcome::Cancelled
}

fn advance(fsm: &mut SyncFsm, event: SyncEvent) {
    if let Err(e) = fsm.process(event) {
        warn!("{}", e);
    }
}
