//! Folding a session back into its edit branch

use std::path::Path;

use tracing::{info, instrument};

use crate::config::ServiceIdentity;
use crate::error::Result;
use crate::git::GitClient;
use crate::repository::RepositoryHandle;
use crate::session::SessionWorkspace;

/// What to commit and where to push it
#[derive(Debug, Clone)]
pub struct CommitPlan<'a> {
    pub edit_branch: &'a str,
    pub subdirectory: &'a str,
    pub session_dir: &'a Path,
    pub message: &'a str,
    /// Remote to push to, credentials embedded
    pub push_url: &'a str,
    pub author: &'a ServiceIdentity,
}

/// checkout edit branch, drop the sidecar, copy the session over the
/// subdirectory, stage, commit, push.
///
/// Returns whether a commit was created. Callers hold the repository guard.
#[instrument(skip_all, fields(branch = plan.edit_branch))]
pub async fn commit_session(
    git: &dyn GitClient,
    workspace: &SessionWorkspace,
    repo: &RepositoryHandle,
    plan: CommitPlan<'_>,
) -> Result<bool> {
    let workdir = repo.local_path();

    git.checkout(workdir, plan.edit_branch).await?;

    workspace.strip_sidecar(plan.session_dir).await?;
    workspace
        .fold_into(plan.session_dir, repo, plan.subdirectory)
        .await?;

    git.add_all(workdir).await?;
    let committed = git.commit(workdir, plan.message, plan.author).await?;
    git.push(workdir, plan.push_url, plan.edit_branch).await?;

    info!(
        "Pushed {} ({})",
        plan.edit_branch,
        if committed { "new commit" } else { "no changes" }
    );
    Ok(committed)
}
