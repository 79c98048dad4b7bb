//! Deployment models

use std::fmt;

use serde::{Deserialize, Serialize};

/// Literal that names the main line in a command
pub const MAIN_REVISION: &str = "main";

/// What to deploy: the main line or an open pull request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Revision {
    Main,
    PullRequest(u64),
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Revision::Main => f.write_str(MAIN_REVISION),
            Revision::PullRequest(number) => write!(f, "{}", number),
        }
    }
}

/// Where replies for a deployment go
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationContext {
    /// Channel the command was posted in
    pub channel: String,

    /// Timestamp of the thread root; replies are threaded under it
    pub thread_ts: String,
}

/// A validated deploy command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentRequest {
    pub application: String,
    pub revision: Revision,
    pub requested_by: String,
    pub context: ConversationContext,
}

/// A built image identified by its tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub application: String,
    pub revision: Revision,
    pub tag: String,
    /// Commit the image was built from
    pub sha: String,
    /// Whether the registry lists the tag
    pub published: bool,
}
