//! Push webhook authentication and parsing

use hmac::{Hmac, Mac};
use inbound_models::models::{PushEvent, PushSender};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::errors::BotError;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_PREFIX: &str = "sha256=";
const MANIFEST_FILE: &str = "values.yaml";

/// Why a push was dropped without any reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushRejection {
    /// `X-Hub-Signature-256` is absent or does not match the body
    BadSignature,

    /// The payload has no readable pusher
    UnknownPusher,

    /// The pusher is not the trusted automation account
    UntrustedPusher(String),
}

impl std::fmt::Display for PushRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PushRejection::BadSignature => f.write_str("signature mismatch"),
            PushRejection::UnknownPusher => f.write_str("payload has no pusher"),
            PushRejection::UntrustedPusher(name) => write!(f, "untrusted pusher {}", name),
        }
    }
}

/// Verify a GitHub `X-Hub-Signature-256` header (`sha256=<hex>`) over `body`
#[must_use]
pub fn verify_signature(body: &[u8], header: Option<&str>, secret: &SecretString) -> bool {
    let Some(hex_digest) = header.and_then(|h| h.strip_prefix(SIGNATURE_PREFIX)) else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_digest) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.expose_secret().as_bytes()) else {
        return false;
    };
    mac.update(body);
    let computed = mac.finalize().into_bytes();
    computed.as_slice().ct_eq(&expected).into()
}

/// Check the push came from `trusted_pusher`.
///
/// Only `pusher.name` is read, so the rest of the payload cannot influence
/// the decision.
pub fn authenticate_pusher(body: &[u8], trusted_pusher: &str) -> Result<(), PushRejection> {
    let sender: PushSender =
        serde_json::from_slice(body).map_err(|_| PushRejection::UnknownPusher)?;
    if sender.pusher.name != trusted_pusher {
        return Err(PushRejection::UntrustedPusher(sender.pusher.name));
    }
    Ok(())
}

/// Parse the full push event
pub fn parse_push(body: &[u8]) -> Result<PushEvent, BotError> {
    serde_json::from_slice(body)
        .map_err(|e| BotError::PayloadError(format!("push payload could not be read: {}", e)))
}

/// Application whose manifest the push modified
pub fn application_from_push(event: &PushEvent) -> Result<String, BotError> {
    event
        .head_commit
        .modified
        .iter()
        .find_map(|path| manifest_application(path))
        .map(str::to_string)
        .ok_or_else(|| {
            BotError::PayloadError(format!(
                "push modified no application manifest ({} files changed)",
                event.head_commit.modified.len()
            ))
        })
}

/// `time` for `time/values.yaml`; `None` for any other path
pub fn manifest_application(path: &str) -> Option<&str> {
    let (app, file) = path.split_once('/')?;
    (!app.is_empty() && file == MANIFEST_FILE).then_some(app)
}

/// Best guess at the application of a push that failed to parse, so the
/// error can be reported in the right conversation.
///
/// Tries the first segment of any modified path, then the `Deploy app:tag`
/// commit message this bot writes.
pub fn application_hint(body: &[u8]) -> Option<String> {
    let payload: Value = serde_json::from_slice(body).ok()?;
    let head = payload.get("head_commit")?;

    let from_paths = head
        .get("modified")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .find_map(|path| path.split_once('/').map(|(app, _)| app))
        .filter(|app| !app.is_empty());
    if let Some(app) = from_paths {
        return Some(app.to_string());
    }

    head.get("message")
        .and_then(Value::as_str)
        .and_then(|message| message.strip_prefix("Deploy "))
        .and_then(|rest| rest.split_once(':'))
        .map(|(app, _)| app.trim().to_string())
        .filter(|app| !app.is_empty())
}
