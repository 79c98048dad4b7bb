//! Finite State Machine for the sync step of a deployment

use serde::{Deserialize, Serialize};

/// Sync state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    /// Webhook accepted, nothing sent to the controller yet
    Idle,

    /// Forwarding the push and requesting a sync
    Triggering,

    /// Waiting for resources to report Synced
    Polling,

    /// Enough resources synced in one round
    Completed,

    /// Round limit reached without completion
    Stalled,

    /// The controller rejected the push or the sync request
    Failed,

    /// Superseded or shut down between rounds
    Cancelled,
}

impl SyncState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SyncState::Completed | SyncState::Stalled | SyncState::Failed | SyncState::Cancelled
        )
    }
}

/// Sync event
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// Start forwarding the push
    Trigger,

    /// Push forwarded and sync requested
    Triggered,

    /// Forwarding or sync request failed
    TriggerFailed(String),

    /// A round saw enough Synced resources
    Synced,

    /// The round budget ran out
    RoundLimit,

    /// Cancellation was requested
    Cancel,
}

/// Sync FSM
#[derive(Debug, Clone)]
pub struct SyncFsm {
    state: SyncState,
    error: Option<String>,
}

impl SyncFsm {
    /// Create a new FSM in idle state
    pub fn new() -> Self {
        Self {
            state: SyncState::Idle,
            error: None,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: SyncEvent) -> Result<SyncState, String> {
        let new_state = match (&self.state, &event) {
            (SyncState::Idle, SyncEvent::Trigger) => SyncState::Triggering,

            (SyncState::Triggering, SyncEvent::Triggered) => SyncState::Polling,
            (SyncState::Triggering, SyncEvent::TriggerFailed(err)) => {
                self.error = Some(err.clone());
                SyncState::Failed
            }

            (SyncState::Polling, SyncEvent::Synced) => SyncState::Completed,
            (SyncState::Polling, SyncEvent::RoundLimit) => SyncState::Stalled,

            (state, SyncEvent::Cancel) if !state.is_terminal() => SyncState::Cancelled,

            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(new_state)
    }
}

impl Default for SyncFsm {
    fn default() -> Self {
        Self::new()
    }
}
