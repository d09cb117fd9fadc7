//! Trunk discovery and edit branch synchronization

use std::path::Path;

use tracing::{debug, info, instrument, warn};

use crate::error::{Error, GitError, Result};
use crate::git::GitClient;

/// Trunk used when neither `master` nor `main` exists, or git cannot answer
pub const FALLBACK_TRUNK: &str = "editor";

/// `master` if present, else `main`, else [`FALLBACK_TRUNK`].
///
/// Never fails: any git error degrades to the fallback.
pub async fn resolve_trunk(git: &dyn GitClient, workdir: &Path) -> String {
    match git.branches(workdir).await {
        Ok(branches) => pick_trunk(&branches).to_string(),
        Err(e) => {
            warn!("Cannot list branches, using '{}': {}", FALLBACK_TRUNK, e);
            FALLBACK_TRUNK.to_string()
        }
    }
}

fn pick_trunk(branches: &[String]) -> &'static str {
    if branches.iter().any(|b| b == "master") {
        "master"
    } else if branches.iter().any(|b| b == "main") {
        "main"
    } else {
        FALLBACK_TRUNK
    }
}

/// Bring `edit_branch` up to date with the remote; returns the trunk used.
///
/// fetch, checkout trunk, pull, create the edit branch (already existing is
/// fine), checkout it, track `origin/<edit_branch>`, pull. The first failing
/// step aborts the rest and leaves the working copy where it stopped.
#[instrument(skip(git, workdir))]
pub async fn sync_edit_branch(
    git: &dyn GitClient,
    workdir: &Path,
    edit_branch: &str,
) -> Result<String> {
    git.fetch(workdir).await?;

    let trunk = resolve_trunk(git, workdir).await;
    git.checkout(workdir, &trunk).await?;
    git.pull(workdir).await?;

    match git.branch_create(workdir, edit_branch).await {
        Ok(()) => info!("Created edit branch {}", edit_branch),
        Err(e) if is_already_exists(&e) => debug!("Edit branch {} already exists", edit_branch),
        Err(e) => return Err(e),
    }

    git.checkout(workdir, edit_branch).await?;
    git.branch_set_upstream(workdir, edit_branch, &format!("origin/{}", edit_branch))
        .await?;
    git.pull(workdir).await?;

    Ok(trunk)
}

fn is_already_exists(e: &Error) -> bool {
    matches!(e, Error::Git(GitError::CommandFailed { stderr, .. }) if stderr.contains("already exists"))
}
