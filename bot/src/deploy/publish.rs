//! Manifest commits

use tracing::{info, warn};
use upstream_models::models::CommitRef;

use crate::errors::BotError;
use crate::http::github::GithubExt;

/// What happened to a manifest commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The commit landed; a push webhook will follow
    Published(CommitRef),

    /// The manifest moved past `base_version` before the commit
    Conflict,
}

pub fn commit_message(application: &str, tag: &str) -> String {
    format!("Deploy {}:{}", application, tag)
}

/// Commit `content` as the new manifest of `application`.
///
/// The commit only lands if the manifest is still at `base_version`. Does not
/// wait for the resulting push webhook.
pub async fn publish(
    github: &dyn GithubExt,
    application: &str,
    tag: &str,
    content: &[u8],
    base_version: &str,
) -> Result<PublishOutcome, BotError> {
    let message = commit_message(application, tag);
    match github
        .update_manifest(application, &message, content, base_version)
        .await
    {
        Ok(commit) => {
            info!(app = %application, tag = %tag, sha = %commit.sha, "Manifest committed");
            Ok(PublishOutcome::Published(commit))
        }
        Err(BotError::Conflict(detail)) => {
            warn!(app = %application, "Manifest commit conflicted: {}", detail);
            Ok(PublishOutcome::Conflict)
        }
        Err(e) => Err(e),
    }
}
