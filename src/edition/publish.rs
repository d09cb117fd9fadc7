//! Publishing an edit branch toward trunk
//!
//! Every publish starts the same way: refresh trunk, branch a uniquely named
//! `publish-*` branch off the edit branch. Then:
//! - `prod` merges it straight into trunk and pushes trunk
//! - `manual-pr` pushes the publish branch and stops
//! - anything else pushes it and opens a merge/pull request on the host
//!
//! Nothing is rolled back on failure; a stray publish branch is inert.

use std::path::Path;

use serde::Serialize;
use tracing::{info, instrument};

use crate::config::GitSettings;
use crate::error::Result;
use crate::git::naming::publish_branch;
use crate::git::{
    project_path, resolve_api_token, resolve_push_url, with_userinfo, Credentials, GitClient,
    HostKind, HostingApi, MergeProposal,
};

use super::sync::resolve_trunk;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishType {
    /// Merge into trunk and push trunk directly
    Prod,
    /// Push the publish branch; the caller opens the request
    ManualPr,
    /// Push and open a merge/pull request through the host API
    AutoPr,
}

impl PublishType {
    /// `prod`, `manual-pr` (or `mpr`); anything else means an automatic PR
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "prod" => Self::Prod,
            "manual-pr" | "mpr" => Self::ManualPr,
            _ => Self::AutoPr,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub kind: PublishType,
    pub title: String,
    pub body: String,
    pub credentials: Credentials,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Published {
    /// Trunk was pushed directly
    Production { prod: bool },
    /// Publish branch pushed, no request opened
    Branch { branch: String },
    /// Request opened on the host
    PullRequest {
        branch: String,
        #[serde(rename = "prUrl")]
        pr_url: String,
    },
}

/// Run the publish state machine. Callers hold the repository guard.
#[instrument(skip(git, hosting, workdir, remote_url, request, settings), fields(kind = ?request.kind))]
pub async fn publish(
    git: &dyn GitClient,
    hosting: &dyn HostingApi,
    workdir: &Path,
    remote_url: &str,
    edit_branch: &str,
    request: &PublishRequest,
    settings: &GitSettings,
) -> Result<Published> {
    let trunk = resolve_trunk(git, workdir).await;

    git.checkout(workdir, &trunk).await?;
    git.pull(workdir).await?;
    git.checkout(workdir, edit_branch).await?;

    let branch = publish_branch();
    git.branch_create(workdir, &branch).await?;
    git.checkout(workdir, &branch).await?;
    info!("Created publish branch {} from {}", branch, edit_branch);

    match request.kind {
        PublishType::Prod => {
            git.merge(workdir, &trunk).await?;
            git.checkout(workdir, &trunk).await?;
            git.merge(workdir, &branch).await?;

            let push_url = with_userinfo(
                remote_url,
                request.credentials.username.as_deref(),
                request.credentials.password.as_deref(),
            );
            git.push(workdir, &push_url, &trunk).await?;
            info!("Published {} directly to {}", edit_branch, trunk);
            Ok(Published::Production { prod: true })
        }
        PublishType::ManualPr => {
            let push_url = resolve_push_url(remote_url, &request.credentials, settings);
            git.push(workdir, &push_url, &branch).await?;
            Ok(Published::Branch { branch })
        }
        PublishType::AutoPr => {
            let push_url = resolve_push_url(remote_url, &request.credentials, settings);
            git.push(workdir, &push_url, &branch).await?;

            let kind = HostKind::of(remote_url);
            let token = resolve_api_token(kind, &request.credentials, settings);
            let project = project_path(remote_url)?;
            let proposal = MergeProposal {
                title: request.title.clone(),
                body: request.body.clone(),
                source_branch: branch.clone(),
                target_branch: trunk,
            };

            let pr_url = match kind {
                HostKind::GitLab => {
                    hosting
                        .open_gitlab_merge_request(&project, &token, &proposal)
                        .await?
                }
                HostKind::GitHub => {
                    hosting
                        .open_github_pull_request(&project, &token, &proposal)
                        .await?
                }
            };
            Ok(Published::PullRequest { branch, pr_url })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::testing::{HostingCall, RecordingGit, RecordingHosting};
    use pretty_assertions::assert_eq;

    const EDIT: &str = "editor-1a2b3c4d";

    fn request(kind: PublishType) -> PublishRequest {
        PublishRequest {
            kind,
            title: "Update statement".to_string(),
            body: "Typos".to_string(),
            credentials: Credentials::new("alice", "pw"),
        }
    }

    async fn run(
        git: &RecordingGit,
        hosting: &RecordingHosting,
        remote: &str,
        kind: PublishType,
    ) -> Result<Published> {
        publish(
            git,
            hosting,
            Path::new("/repo"),
            remote,
            EDIT,
            &request(kind),
            &GitSettings::default(),
        )
        .await
    }

    fn publish_branch_of(calls: &[String]) -> String {
        calls
            .iter()
            .find_map(|c| c.strip_prefix("branch publish-"))
            .map(|suffix| format!("publish-{}", suffix))
            .unwrap()
    }

    #[test]
    fn test_publish_type_labels() {
        assert_eq!(PublishType::from_label("prod"), PublishType::Prod);
        assert_eq!(PublishType::from_label("manual-pr"), PublishType::ManualPr);
        assert_eq!(PublishType::from_label("mpr"), PublishType::ManualPr);
        assert_eq!(PublishType::from_label("auto-pr"), PublishType::AutoPr);
        assert_eq!(PublishType::from_label(""), PublishType::AutoPr);
    }

    #[tokio::test]
    async fn test_prod_merges_and_pushes_trunk() {
        let git = RecordingGit::with_branches(&["master"]);
        let hosting = RecordingHosting::default();

        let published = run(&git, &hosting, "https://github.com/org/repo", PublishType::Prod)
            .await
            .unwrap();
        assert_eq!(published, Published::Production { prod: true });

        let calls = git.calls();
        let branch = publish_branch_of(&calls);
        assert_eq!(
            calls,
            vec![
                "branches".to_string(),
                "checkout master".to_string(),
                "pull".to_string(),
                format!("checkout {}", EDIT),
                format!("branch {}", branch),
                format!("checkout {}", branch),
                "merge master".to_string(),
                "checkout master".to_string(),
                format!("merge {}", branch),
                "push https://alice:pw@github.com/org/repo master".to_string(),
            ]
        );
        assert!(hosting.calls().is_empty());
    }

    #[tokio::test]
    async fn test_manual_pr_never_calls_host() {
        let git = RecordingGit::with_branches(&["main"]);
        let hosting = RecordingHosting::default();

        let published = run(&git, &hosting, "https://gitlab.com/team/tasks.git", PublishType::ManualPr)
            .await
            .unwrap();

        let calls = git.calls();
        let branch = publish_branch_of(&calls);
        assert_eq!(published, Published::Branch { branch: branch.clone() });
        assert_eq!(
            calls.last().unwrap(),
            &format!("push https://alice:pw@gitlab.com/team/tasks.git {}", branch)
        );
        assert!(hosting.calls().is_empty());
    }

    #[tokio::test]
    async fn test_auto_pr_on_gitlab() {
        let git = RecordingGit::with_branches(&["master"]);
        let hosting = RecordingHosting::default();

        let published = run(&git, &hosting, "https://gitlab.com/team/tasks.git", PublishType::AutoPr)
            .await
            .unwrap();

        let branch = publish_branch_of(&git.calls());
        let expected = MergeProposal {
            title: "Update statement".to_string(),
            body: "Typos".to_string(),
            source_branch: branch.clone(),
            target_branch: "master".to_string(),
        };
        assert_eq!(
            hosting.calls(),
            vec![HostingCall::GitLab("team/tasks".to_string(), expected)]
        );
        assert_eq!(
            published,
            Published::PullRequest {
                branch,
                pr_url: "https://gitlab.com/team/tasks/-/merge_requests/1".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_auto_pr_on_other_hosts() {
        let git = RecordingGit::with_branches(&["main"]);
        let hosting = RecordingHosting::default();

        run(&git, &hosting, "https://git.example.org/org/repo", PublishType::AutoPr)
            .await
            .unwrap();

        let calls = hosting.calls();
        assert_eq!(calls.len(), 1);
        assert!(matches!(&calls[0], HostingCall::GitHub(path, p) if path == "org/repo" && p.target_branch == "main"));
    }

    #[tokio::test]
    async fn test_host_rejection_surfaces() {
        let git = RecordingGit::with_branches(&["master"]);
        let hosting = RecordingHosting::rejecting();

        let err = run(&git, &hosting, "https://github.com/org/repo", PublishType::AutoPr)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "401: Unauthorized");
    }

    #[tokio::test]
    async fn test_failure_stops_before_host() {
        let git = RecordingGit::with_branches(&["master"]).failing_on("push", "rejected");
        let hosting = RecordingHosting::default();

        let err = run(&git, &hosting, "https://github.com/org/repo", PublishType::AutoPr)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "rejected");
        assert!(hosting.calls().is_empty());
    }
}
