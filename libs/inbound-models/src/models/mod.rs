//! Inbound payload and server response models

use serde::{Deserialize, Serialize};

// ============================== GITHUB PUSH EVENT ================================ //

/// Only the sender of a push, parsed before anything else so the origin
/// check does not depend on the rest of the payload's shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushSender {
    pub pusher: Pusher,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pusher {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// The parts of a push event the correlator consumes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushEvent {
    pub pusher: Pusher,
    #[serde(rename = "ref", default)]
    pub ref_name: Option<String>,
    pub head_commit: HeadCommit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadCommit {
    #[serde(default)]
    pub id: Option<String>,
    pub modified: Vec<String>,
}

// ============================= SLACK EVENTS API ================================== //

/// Outer envelope posted to the events endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackEnvelope {
    UrlVerification {
        challenge: String,
    },
    EventCallback {
        #[serde(default)]
        event_id: Option<String>,
        event: SlackEvent,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackEvent {
    AppMention(AppMention),
    #[serde(other)]
    Unsupported,
}

/// A message that mentions the bot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppMention {
    #[serde(default)]
    pub user: String,
    pub text: String,
    pub channel: String,
    pub ts: String,
    #[serde(default)]
    pub thread_ts: Option<String>,
}

// =============================== SERVER RESPONSES ================================ //

/// Health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Version response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Body returned once a webhook has been handed off
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAck {
    pub status: String,
}
