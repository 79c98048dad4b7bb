//! Per-application deployment claims
//!
//! A claim is taken when a command passes validation and is held until the
//! deployment it started finishes polling (or halts earlier). While an
//! application has a live claim, new commands for it are refused; the push
//! webhook for the committed manifest finds the claim's conversation here.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::models::deployment::ConversationContext;

/// How far a claimed deployment has progressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The command pipeline is running
    Requested,

    /// The manifest commit landed; waiting for its push webhook
    AwaitingWebhook,

    /// The webhook arrived and the status poll is running
    Polling,
}

#[derive(Debug)]
struct Slot {
    context: ConversationContext,
    phase: Phase,
    claimed_at: Instant,
    generation: u64,
    cancel: CancellationToken,
}

/// A successful claim on an application
#[derive(Debug, Clone)]
pub struct Claim {
    pub application: String,
    pub generation: u64,
    pub cancel: CancellationToken,
}

/// Returned when an application already has a live claim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InProgress {
    pub application: String,
    pub phase: Phase,
    pub age: Duration,
}

impl std::fmt::Display for InProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let phase = match self.phase {
            Phase::Requested => "being prepared",
            Phase::AwaitingWebhook => "waiting for its commit to be picked up",
            Phase::Polling => "syncing",
        };
        write!(
            f,
            "A deployment of `{}` is already in progress ({}, started {}s ago). Try again once it finishes",
            self.application,
            phase,
            self.age.as_secs()
        )
    }
}

/// What a push webhook gets from the tracker
#[derive(Debug, Clone)]
pub struct Correlation {
    /// Where to narrate; `None` for pushes this bot did not start
    pub context: Option<ConversationContext>,

    /// Claim to release when the poll ends
    pub generation: Option<u64>,

    pub cancel: CancellationToken,
}

/// Lock-protected map of application to in-flight deployment
pub struct DeploymentTracker {
    slots: Mutex<HashMap<String, Slot>>,
    next_generation: AtomicU64,
    stale_after: Duration,
    root: CancellationToken,
}

impl DeploymentTracker {
    /// Create a tracker whose claims are cancelled along with `root`
    pub fn new(stale_after: Duration, root: CancellationToken) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
            stale_after,
            root,
        }
    }

    /// Claim `application` for a new deployment narrated in `context`.
    ///
    /// A claim older than the stale limit is superseded and its poll cancelled.
    pub fn claim(
        &self,
        application: &str,
        context: ConversationContext,
    ) -> Result<Claim, InProgress> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();

        if let Some(existing) = slots.get(application) {
            let age = now.saturating_duration_since(existing.claimed_at);
            if age < self.stale_after {
                return Err(InProgress {
                    application: application.to_string(),
                    phase: existing.phase,
                    age,
                });
            }
            warn!(
                app = %application,
                generation = existing.generation,
                phase = ?existing.phase,
                "Superseding stale deployment claim after {}s",
                age.as_secs()
            );
            existing.cancel.cancel();
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let cancel = self.root.child_token();
        slots.insert(
            application.to_string(),
            Slot {
                context,
                phase: Phase::Requested,
                claimed_at: now,
                generation,
                cancel: cancel.clone(),
            },
        );
        debug!(app = %application, generation, "Deployment claimed");

        Ok(Claim {
            application: application.to_string(),
            generation,
            cancel,
        })
    }

    /// Mark the claim as waiting for the push webhook of its commit.
    ///
    /// Returns false when the claim was superseded meanwhile.
    pub fn commit_published(&self, application: &str, generation: u64) -> bool {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        match slots.get_mut(application) {
            Some(slot) if slot.generation == generation => {
                if slot.phase == Phase::Requested {
                    slot.phase = Phase::AwaitingWebhook;
                }
                true
            }
            _ => false,
        }
    }

    /// Consume the pending correlation for a push to `application`.
    ///
    /// A claim that has not started polling moves to `Polling` and hands its
    /// context over. Anything else (no claim, or a claim already polling)
    /// yields no context and a token that only shutdown cancels.
    pub fn take_for_webhook(&self, application: &str) -> Correlation {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        match slots.get_mut(application) {
            Some(slot) if slot.phase != Phase::Polling => {
                slot.phase = Phase::Polling;
                info!(app = %application, generation = slot.generation, "Push correlated with deployment");
                Correlation {
                    context: Some(slot.context.clone()),
                    generation: Some(slot.generation),
                    cancel: slot.cancel.clone(),
                }
            }
            Some(slot) => {
                debug!(app = %application, generation = slot.generation, "Deployment already polling");
                self.uncorrelated()
            }
            None => {
                debug!(app = %application, "No deployment waiting for this push");
                self.uncorrelated()
            }
        }
    }

    /// Current phase of `application`'s claim
    pub fn phase(&self, application: &str) -> Option<Phase> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.get(application).map(|slot| slot.phase)
    }

    /// Drop a claim whose push webhook arrived unreadable, returning its
    /// conversation. A claim that is already polling belongs to another push
    /// and is kept.
    pub fn abandon(&self, application: &str) -> Option<ConversationContext> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        if slots.get(application)?.phase == Phase::Polling {
            return None;
        }
        let slot = slots.remove(application)?;
        slot.cancel.cancel();
        warn!(app = %application, generation = slot.generation, "Deployment claim abandoned");
        Some(slot.context)
    }

    /// Drop the claim `generation` on `application`. A newer claim is left alone.
    pub fn release(&self, application: &str, generation: u64) -> bool {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        match slots.get(application) {
            Some(slot) if slot.generation == generation => {
                slots.remove(application);
                debug!(app = %application, generation, "Deployment claim released");
                true
            }
            _ => false,
        }
    }

    /// Number of live claims
    pub fn len(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn uncorrelated(&self) -> Correlation {
        Correlation {
            context: None,
            generation: None,
            cancel: self.root.child_token(),
        }
    }
}
