//! Server state

use std::sync::Arc;

use secrecy::SecretString;
use tokio_util::task::TaskTracker;

use crate::deploy::orchestrator::Orchestrator;

/// Server state shared across handlers
pub struct ServerState {
    pub orchestrator: Arc<Orchestrator>,

    /// Slack signing secret every `/events` request is verified against
    pub slack_signing_secret: SecretString,

    /// Deployments started by inbound requests
    pub tasks: TaskTracker,
}

impl ServerState {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        slack_signing_secret: SecretString,
        tasks: TaskTracker,
    ) -> Self {
        Self {
            orchestrator,
            slack_signing_secret,
            tasks,
        }
    }
}
