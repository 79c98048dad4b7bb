//! Artifact resolution
//!
//! An image tag is `{revision}-{first 7 characters of the commit SHA}`. The
//! CI pipeline pushes images under the same rule, so the tag is what links a
//! manifest change to an image in the registry.

use tracing::{debug, info};

use crate::errors::BotError;
use crate::http::github::GithubExt;
use crate::http::registry::RegistryExt;
use crate::models::deployment::{Artifact, Revision};

const SHORT_SHA_LEN: usize = 7;

/// Image tag for a revision built from `sha`
pub fn image_tag(revision: &str, sha: &str) -> String {
    let short = sha.get(..SHORT_SHA_LEN).unwrap_or(sha);
    format!("{}-{}", revision, short)
}

/// The commit a revision currently points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRevision {
    pub sha: String,
    /// Pull request page, for numbered revisions
    pub html_url: Option<String>,
}

/// Resolve a revision to its head commit: the tip of `main_branch` for
/// `main`, the head of the source branch for a pull request
pub async fn resolve_source(
    github: &dyn GithubExt,
    main_branch: &str,
    application: &str,
    revision: &Revision,
) -> Result<SourceRevision, BotError> {
    match revision {
        Revision::Main => {
            let sha = github.branch_head(application, main_branch).await?;
            Ok(SourceRevision { sha, html_url: None })
        }
        Revision::PullRequest(number) => {
            let pr = github.pull_request(application, *number).await?;
            debug!("PR #{} of {} is at {} ({})", number, application, pr.head.sha, pr.head.ref_name);
            Ok(SourceRevision {
                sha: pr.head.sha,
                html_url: Some(pr.html_url),
            })
        }
    }
}

/// Look up whether the image for `source` has been pushed.
///
/// A registry failure is returned as an error, never as "not published".
pub async fn check_published(
    registry: &dyn RegistryExt,
    application: &str,
    revision: &Revision,
    source: &SourceRevision,
) -> Result<Artifact, BotError> {
    let tag = image_tag(&revision.to_string(), &source.sha);
    let tags = registry.list_tags(application).await?;
    let published = tags.iter().any(|t| *t == tag);
    info!(app = %application, tag = %tag, published, "Checked registry for image");

    Ok(Artifact {
        application: application.to_string(),
        revision: revision.clone(),
        tag,
        sha: source.sha.clone(),
        published,
    })
}
