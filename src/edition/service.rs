//! Edition service - the boundary every client operation goes through
//!
//! Each operation validates first, then takes the repository lock, makes
//! sure the working copy exists, and runs its git sequence to completion.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::config::{Config, GitSettings, ServiceIdentity};
use crate::error::{GitError, Result, ValidationError};
use crate::git::naming::{edit_branch, normalize_subdirectory, path_filter};
use crate::git::{
    resolve_push_url, Credentials, Divergence, GitCli, GitClient, HostingApi, HttpHostingApi,
    LogEntry,
};
use crate::repository::{RepositoryHandle, RepositoryRegistry};
use crate::session::{SessionId, SessionWorkspace};

use super::commit::{commit_session, CommitPlan};
use super::publish::{publish, PublishRequest, Published};
use super::sync::{resolve_trunk, sync_edit_branch};

/// Edit branch is up to date with the remote
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Synced {
    pub branch: String,
    #[serde(rename = "masterBranch")]
    pub trunk: String,
}

/// A new session, ready for the file API
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreparedEdition {
    pub session: SessionId,
    /// Bearer token for the file API
    pub token: String,
    #[serde(rename = "masterSynced")]
    pub trunk_synced: bool,
    #[serde(rename = "editorSynced")]
    pub editor_synced: bool,
    #[serde(rename = "masterBranch")]
    pub trunk: String,
    #[serde(rename = "taskEditor")]
    pub task_editor: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckedOut {
    pub hash: String,
}

/// Newest commit touching the subdirectory on each side
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LastCommits {
    #[serde(rename = "master")]
    pub trunk: String,
    pub editor: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Committed {
    pub branch: String,
    /// False when the session matched the branch and only the push ran
    pub committed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffResult {
    pub diff: String,
}

pub struct EditionService {
    git: Arc<dyn GitClient>,
    hosting: Arc<dyn HostingApi>,
    repositories: RepositoryRegistry,
    workspace: SessionWorkspace,
    settings: GitSettings,
    author: ServiceIdentity,
    session_token: String,
}

impl EditionService {
    /// Build with explicit git and hosting implementations
    pub fn new(
        config: &Config,
        git: Arc<dyn GitClient>,
        hosting: Arc<dyn HostingApi>,
    ) -> Result<Self> {
        Ok(Self {
            git,
            hosting,
            repositories: RepositoryRegistry::new(config.repositories_path()?),
            workspace: SessionWorkspace::new(config.sessions_path()?),
            settings: config.git.clone(),
            author: config.author.clone(),
            session_token: config.api_token.clone(),
        })
    }

    /// Build with the git CLI and the HTTP hosting client
    pub fn from_config(config: &Config) -> Result<Self> {
        let git = Arc::new(GitCli::new(config.author.clone()));
        let hosting = Arc::new(HttpHostingApi::new(&config.hosting)?);
        Self::new(config, git, hosting)
    }

    pub fn workspace(&self) -> &SessionWorkspace {
        &self.workspace
    }

    pub fn is_allowed(&self, repo: &str) -> bool {
        self.settings.is_allowed(repo.trim())
    }

    /// Synchronize the edit branch of `subdirectory` with the remote
    #[instrument(skip(self))]
    pub async fn checkout_edition(&self, repo: &str, subdirectory: &str) -> Result<Synced> {
        let handle = self.handle(repo).await?;
        let _guard = handle.lock().await;
        handle.ensure_cloned(self.git.as_ref()).await?;

        let branch = edit_branch(repo, subdirectory);
        let trunk = sync_edit_branch(self.git.as_ref(), handle.local_path(), &branch).await?;
        Ok(Synced { branch, trunk })
    }

    /// Snapshot the current state of `subdirectory` into a new session
    #[instrument(skip(self))]
    pub async fn prepare_edition(&self, repo: &str, subdirectory: &str) -> Result<PreparedEdition> {
        let handle = self.handle(repo).await?;
        let _guard = handle.lock().await;
        handle.ensure_cloned(self.git.as_ref()).await?;

        let prepared = self.workspace.materialize(&handle, subdirectory).await?;
        let trunk = resolve_trunk(self.git.as_ref(), handle.local_path()).await;

        let (trunk_synced, editor_synced) =
            match self.divergence(&handle, &trunk, subdirectory).await {
                Ok(divergence) => (divergence.trunk_synced(), divergence.editor_synced()),
                Err(e) => {
                    warn!("Divergence unavailable, reporting synced: {}", e);
                    (true, true)
                }
            };

        Ok(PreparedEdition {
            session: prepared.session.id,
            token: self.session_token.clone(),
            trunk_synced,
            editor_synced,
            trunk,
            task_editor: prepared.task_editor,
        })
    }

    /// Both histories of `subdirectory` and how far they diverge
    #[instrument(skip(self))]
    pub async fn history(&self, repo: &str, subdirectory: &str) -> Result<Divergence> {
        let handle = self.handle(repo).await?;
        let _guard = handle.lock().await;
        handle.ensure_cloned(self.git.as_ref()).await?;

        let trunk = resolve_trunk(self.git.as_ref(), handle.local_path()).await;
        self.divergence(&handle, &trunk, subdirectory).await
    }

    /// Check out an arbitrary revision in the shared working copy
    #[instrument(skip(self))]
    pub async fn checkout_hash(&self, repo: &str, hash: &str) -> Result<CheckedOut> {
        let hash = revision(hash)?;
        let handle = self.handle(repo).await?;
        let _guard = handle.lock().await;
        handle.ensure_cloned(self.git.as_ref()).await?;

        self.git.checkout(handle.local_path(), hash).await?;
        Ok(CheckedOut {
            hash: hash.to_string(),
        })
    }

    /// Newest commit touching `subdirectory` on trunk and on the edit branch
    #[instrument(skip(self))]
    pub async fn last_commits(&self, repo: &str, subdirectory: &str) -> Result<LastCommits> {
        let handle = self.handle(repo).await?;
        let _guard = handle.lock().await;
        handle.ensure_cloned(self.git.as_ref()).await?;

        let git = self.git.as_ref();
        let workdir = handle.local_path();
        let path = path_filter(subdirectory);
        let branch = edit_branch(repo, subdirectory);

        let trunk = resolve_trunk(git, workdir).await;
        git.checkout(workdir, &trunk).await?;
        git.pull(workdir).await?;
        let trunk_head = newest(git.log(workdir, &trunk, &path).await?, &trunk)?;

        git.checkout(workdir, &branch).await?;
        let editor_head = newest(git.log(workdir, &branch, &path).await?, &branch)?;

        Ok(LastCommits {
            trunk: trunk_head,
            editor: editor_head,
        })
    }

    /// Fold session `session` back into the edit branch and push it
    #[instrument(skip(self, message, credentials))]
    pub async fn commit_edition(
        &self,
        repo: &str,
        subdirectory: &str,
        session: &str,
        message: &str,
        credentials: &Credentials,
    ) -> Result<Committed> {
        self.ensure_allowed(repo)?;
        let id = SessionId::parse(session)?;
        let session_dir = self.workspace.existing_session_dir(&id).await?;

        let handle = self.handle(repo).await?;
        let _guard = handle.lock().await;
        handle.ensure_cloned(self.git.as_ref()).await?;

        let branch = edit_branch(repo, subdirectory);
        let subdirectory = normalize_subdirectory(subdirectory);
        let push_url = resolve_push_url(handle.remote_url(), credentials, &self.settings);

        let committed = commit_session(
            self.git.as_ref(),
            &self.workspace,
            &handle,
            CommitPlan {
                edit_branch: &branch,
                subdirectory: &subdirectory,
                session_dir: &session_dir,
                message,
                push_url: &push_url,
                author: &self.author,
            },
        )
        .await?;

        Ok(Committed { branch, committed })
    }

    /// Publish the edit branch: direct merge, pushed branch, or merge request
    #[instrument(skip(self, request), fields(kind = ?request.kind))]
    pub async fn publish_edition(
        &self,
        repo: &str,
        subdirectory: &str,
        request: &PublishRequest,
    ) -> Result<Published> {
        let handle = self.handle(repo).await?;
        let _guard = handle.lock().await;
        handle.ensure_cloned(self.git.as_ref()).await?;

        let branch = edit_branch(repo, subdirectory);
        let published = publish(
            self.git.as_ref(),
            self.hosting.as_ref(),
            handle.local_path(),
            handle.remote_url(),
            &branch,
            request,
            &self.settings,
        )
        .await?;

        info!("Published {}: {:?}", branch, published);
        Ok(published)
    }

    /// Diff `hash` against `target` within `subdirectory`.
    ///
    /// `target` may be `master` (the resolved trunk), `editor` (the edit
    /// branch) or any revision.
    #[instrument(skip(self))]
    pub async fn diff_edition(
        &self,
        repo: &str,
        subdirectory: &str,
        hash: &str,
        target: &str,
    ) -> Result<DiffResult> {
        let hash = revision(hash)?;
        let target = revision(target)?;
        let handle = self.handle(repo).await?;
        let _guard = handle.lock().await;
        handle.ensure_cloned(self.git.as_ref()).await?;

        let git = self.git.as_ref();
        let workdir = handle.local_path();
        let branch = edit_branch(repo, subdirectory);

        let trunk = resolve_trunk(git, workdir).await;
        git.checkout(workdir, &trunk).await?;
        git.pull(workdir).await?;
        git.checkout(workdir, &branch).await?;

        let target = match target {
            "master" => trunk.as_str(),
            "editor" => branch.as_str(),
            other => other,
        };
        let diff = git
            .diff(workdir, hash, target, &path_filter(subdirectory))
            .await?;
        Ok(DiffResult { diff })
    }

    fn ensure_allowed(&self, repo: &str) -> Result<()> {
        if repo.trim().is_empty() {
            return Err(ValidationError::MissingRepository.into());
        }
        if !self.is_allowed(repo) {
            return Err(ValidationError::RepositoryNotAllowed(repo.to_string()).into());
        }
        Ok(())
    }

    async fn handle(&self, repo: &str) -> Result<RepositoryHandle> {
        self.ensure_allowed(repo)?;
        Ok(self.repositories.handle(repo).await)
    }

    /// Callers hold the repository guard
    async fn divergence(
        &self,
        handle: &RepositoryHandle,
        trunk: &str,
        subdirectory: &str,
    ) -> Result<Divergence> {
        let workdir = handle.local_path();
        let path = path_filter(subdirectory);
        let branch = edit_branch(handle.remote_url(), subdirectory);

        let trunk_log = self.git.log(workdir, trunk, &path).await?;
        let editor_log = self.git.log(workdir, &branch, &path).await?;
        Ok(Divergence::analyze(editor_log, trunk_log))
    }
}

/// A client-supplied revision, refused when git could read it as an option
fn revision(raw: &str) -> Result<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with('-') {
        return Err(ValidationError::InvalidRevision(raw.to_string()).into());
    }
    Ok(trimmed)
}

fn newest(log: Vec<LogEntry>, reference: &str) -> Result<String> {
    log.into_iter()
        .next()
        .map(|entry| entry.hash)
        .ok_or_else(|| GitError::NoCommits(reference.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edition::PublishType;
    use crate::git::testing::{RecordingGit, RecordingHosting};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const REPO: &str = "https://gitlab.com/team/tasks.git";

    struct Fixture {
        _temp: TempDir,
        git: Arc<RecordingGit>,
        hosting: Arc<RecordingHosting>,
        service: EditionService,
    }

    fn fixture_with(git: RecordingGit, allowed: &[&str]) -> Fixture {
        let temp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.base_dir = Some(temp.path().to_path_buf());
        config.git.allowed_repositories = allowed.iter().map(|r| r.to_string()).collect();

        let git = Arc::new(git);
        let hosting = Arc::new(RecordingHosting::default());
        let service = EditionService::new(&config, git.clone(), hosting.clone()).unwrap();
        Fixture {
            _temp: temp,
            git,
            hosting,
            service,
        }
    }

    fn fixture(git: RecordingGit) -> Fixture {
        fixture_with(git, &[])
    }

    fn manual_pr() -> PublishRequest {
        PublishRequest {
            kind: PublishType::ManualPr,
            title: String::new(),
            body: String::new(),
            credentials: Credentials::default(),
        }
    }

    #[tokio::test]
    async fn test_disallowed_repository_touches_nothing() {
        let f = fixture_with(RecordingGit::with_branches(&["master"]), &[REPO]);
        let other = "https://github.com/evil/repo";
        let s = &f.service;

        let errors = vec![
            s.checkout_edition(other, "a").await.unwrap_err(),
            s.prepare_edition(other, "a").await.unwrap_err(),
            s.history(other, "a").await.unwrap_err(),
            s.checkout_hash(other, "abc").await.unwrap_err(),
            s.last_commits(other, "a").await.unwrap_err(),
            s.commit_edition(other, "a", "abc", "msg", &Credentials::default())
                .await
                .unwrap_err(),
            s.publish_edition(other, "a", &manual_pr()).await.unwrap_err(),
            s.diff_edition(other, "a", "abc", "master").await.unwrap_err(),
        ];

        for err in errors {
            assert!(err.is_validation());
            assert_eq!(err.to_string(), "Repository not allowed");
        }
        assert!(f.git.calls().is_empty());
        assert!(f.hosting.calls().is_empty());
        assert!(s.is_allowed(REPO));
    }

    #[tokio::test]
    async fn test_commit_validates_session_before_git() {
        let f = fixture(RecordingGit::with_branches(&["master"]));
        let creds = Credentials::default();

        let err = f
            .service
            .commit_edition(REPO, "tasks/algo", "", "msg", &creds)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "No session ID provided");

        let err = f
            .service
            .commit_edition(REPO, "tasks/algo", "nosuchsession", "msg", &creds)
            .await
            .unwrap_err();
        assert!(err.is_validation());

        let err = f
            .service
            .commit_edition("  ", "tasks/algo", "abc", "msg", &creds)
            .await
            .unwrap_err();
        assert!(err.is_validation());

        assert!(f.git.calls().is_empty());
    }

    #[tokio::test]
    async fn test_checkout_edition_clones_then_syncs() {
        let f = fixture(RecordingGit::with_branches(&["main"]));
        let synced = f.service.checkout_edition(REPO, "/tasks/algo/").await.unwrap();

        assert_eq!(synced.trunk, "main");
        assert_eq!(synced.branch, edit_branch(REPO, "tasks/algo"));

        let calls = f.git.calls();
        assert_eq!(calls[0], format!("clone {}", REPO));
        assert_eq!(calls[1], "fetch");
        assert_eq!(calls.last().unwrap(), "pull");
    }

    #[tokio::test]
    async fn test_prepare_reports_divergence_flags() {
        let branch = edit_branch(REPO, "tasks/algo");
        let git = RecordingGit::with_branches(&["master"])
            .with_log("master", &["b", "a"])
            .with_log(&branch, &["c", "b", "a"]);
        let f = fixture(git);

        let prepared = f.service.prepare_edition(REPO, "tasks/algo").await.unwrap();
        assert_eq!(prepared.trunk, "master");
        assert_eq!(prepared.token, "testtoken");
        assert!(prepared.trunk_synced);
        assert!(!prepared.editor_synced);
        assert!(!prepared.task_editor);
        assert!(f
            .service
            .workspace()
            .existing_session_dir(&prepared.session)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_prepare_flags_default_to_synced_on_error() {
        let git = RecordingGit::with_branches(&["master"]).failing_on("log", "fatal: bad revision");
        let f = fixture(git);

        let prepared = f.service.prepare_edition(REPO, "tasks/algo").await.unwrap();
        assert!(prepared.trunk_synced);
        assert!(prepared.editor_synced);
    }

    #[tokio::test]
    async fn test_prepare_wire_format() {
        let f = fixture(RecordingGit::with_branches(&["main"]));
        let prepared = f.service.prepare_edition(REPO, "").await.unwrap();
        let json = serde_json::to_value(&prepared).unwrap();

        assert_eq!(json["masterBranch"], "main");
        assert_eq!(json["session"], prepared.session.as_str());
        assert_eq!(json["masterSynced"], true);
        assert_eq!(json["taskEditor"], false);
    }

    #[tokio::test]
    async fn test_commit_folds_session_and_pushes() {
        let f = fixture(RecordingGit::with_branches(&["master"]));
        let prepared = f.service.prepare_edition(REPO, "tasks/algo").await.unwrap();
        let dir = f
            .service
            .workspace()
            .existing_session_dir(&prepared.session)
            .await
            .unwrap();
        tokio::fs::write(dir.join("statement.md"), "# Sum").await.unwrap();

        let committed = f
            .service
            .commit_edition(
                REPO,
                "tasks/algo/",
                prepared.session.as_str(),
                "Fix statement",
                &Credentials::new("alice", "pw"),
            )
            .await
            .unwrap();

        let branch = edit_branch(REPO, "tasks/algo");
        assert_eq!(committed.branch, branch);
        assert!(committed.committed);

        let calls = f.git.calls();
        let tail = &calls[calls.len() - 4..];
        assert_eq!(
            tail,
            &[
                format!("checkout {}", branch),
                "add -A".to_string(),
                "commit Fix statement --author Editor <task-editor@france-ioi.org>".to_string(),
                format!("push https://alice:pw@gitlab.com/team/tasks.git {}", branch),
            ]
        );
    }

    #[tokio::test]
    async fn test_history_uses_trunk_and_edit_branch_logs() {
        let branch = edit_branch(REPO, "");
        let git = RecordingGit::with_branches(&["main"])
            .with_log("main", &["x", "a"])
            .with_log(&branch, &["a"]);
        let f = fixture(git);

        let divergence = f.service.history(REPO, "").await.unwrap();
        assert_eq!(divergence.trunk_additional_count, 1);
        assert_eq!(divergence.editor_additional_count, 0);
        assert!(f.git.calls().contains(&"log main -- .".to_string()));
    }

    #[tokio::test]
    async fn test_last_commits() {
        let branch = edit_branch(REPO, "tasks/algo");
        let git = RecordingGit::with_branches(&["master"])
            .with_log("master", &["m2", "m1"])
            .with_log(&branch, &["e1"]);
        let f = fixture(git);

        let last = f.service.last_commits(REPO, "tasks/algo").await.unwrap();
        assert_eq!(
            last,
            LastCommits {
                trunk: "m2".to_string(),
                editor: "e1".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_last_commits_needs_both_sides() {
        let git = RecordingGit::with_branches(&["master"]).with_log("master", &["m1"]);
        let f = fixture(git);

        let err = f.service.last_commits(REPO, "tasks/algo").await.unwrap_err();
        assert!(!err.is_validation());
        assert!(err.to_string().starts_with("No commit on 'editor-"));
    }

    #[tokio::test]
    async fn test_diff_target_aliases() {
        let f = fixture(RecordingGit::with_branches(&["main"]));
        let branch = edit_branch(REPO, "tasks/algo");

        f.service
            .diff_edition(REPO, "tasks/algo", "abc123", "master")
            .await
            .unwrap();
        f.service
            .diff_edition(REPO, "tasks/algo", "abc123", "editor")
            .await
            .unwrap();
        let result = f
            .service
            .diff_edition(REPO, "tasks/algo", "abc123", "def456")
            .await
            .unwrap();
        assert!(result.diff.starts_with("diff --git a/tasks/algo"));

        let diffs: Vec<String> = f
            .git
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("diff "))
            .collect();
        assert_eq!(
            diffs,
            vec![
                "diff abc123 main -- tasks/algo".to_string(),
                format!("diff abc123 {} -- tasks/algo", branch),
                "diff abc123 def456 -- tasks/algo".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_publish_manual_pr() {
        let f = fixture(RecordingGit::with_branches(&["master"]));
        let published = f
            .service
            .publish_edition(REPO, "tasks/algo", &manual_pr())
            .await
            .unwrap();

        assert!(matches!(published, Published::Branch { ref branch } if branch.starts_with("publish-")));
        assert!(f.hosting.calls().is_empty());
    }

    #[tokio::test]
    async fn test_option_like_revisions_are_refused_before_git() {
        let f = fixture(RecordingGit::with_branches(&["master"]));
        let s = &f.service;

        let errors = vec![
            s.checkout_hash(REPO, "--output=/tmp/elsewhere").await.unwrap_err(),
            s.checkout_hash(REPO, "  ").await.unwrap_err(),
            s.diff_edition(REPO, "tasks/algo", "--output=/tmp/elsewhere", "master")
                .await
                .unwrap_err(),
            s.diff_edition(REPO, "tasks/algo", "abc123", "-p")
                .await
                .unwrap_err(),
            s.diff_edition(REPO, "tasks/algo", "", "editor")
                .await
                .unwrap_err(),
        ];

        for err in errors {
            assert!(err.is_validation());
            assert!(err.to_string().starts_with("Invalid revision"));
        }
        assert!(f.git.calls().is_empty());
    }

    #[tokio::test]
    async fn test_checkout_hash() {
        let f = fixture(RecordingGit::default());
        let out = f.service.checkout_hash(REPO, "abc123").await.unwrap();
        assert_eq!(out.hash, "abc123");
        assert_eq!(f.git.calls().last().unwrap(), "checkout abc123");
    }
}
