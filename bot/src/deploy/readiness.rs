//! CI readiness checks

use tracing::debug;
use upstream_models::models::CheckRun;

use crate::errors::BotError;
use crate::http::github::GithubExt;

const COMPLETED: &str = "completed";

/// Whether the gate check `gate_check` has completed for `sha`.
///
/// A missing or unfinished check is `Ok(false)`; only a failure to list the
/// check runs is an error.
pub async fn checks_complete(
    github: &dyn GithubExt,
    application: &str,
    sha: &str,
    gate_check: &str,
) -> Result<bool, BotError> {
    let runs = github.check_runs(application, sha, gate_check).await?;
    let complete = gate_completed(&runs, gate_check);
    debug!(
        app = %application,
        sha = %sha,
        runs = runs.len(),
        complete,
        "Evaluated gate check {}", gate_check
    );
    Ok(complete)
}

/// Whether any run of `gate_check` reports `completed`
pub fn gate_completed(runs: &[CheckRun], gate_check: &str) -> bool {
    runs.iter()
        .any(|run| run.name == gate_check && run.status == COMPLETED)
}
