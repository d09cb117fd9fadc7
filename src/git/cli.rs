//! [`GitClient`] backed by the git CLI
//!
//! gitoxide's mutation support is still evolving, so this is a hybrid:
//! gitoxide for ref listing, `git` subprocesses for everything that writes.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use super::{redact_url, GitBackend, GitClient, LogEntry};
use crate::config::ServiceIdentity;
use crate::error::{GitError, Result};

/// Field separator used in `git log --format`
const FIELD_SEP: char = '\u{1f}';

/// Runs `git` in the working copy, committing as the service identity
#[derive(Debug, Clone)]
pub struct GitCli {
    identity: ServiceIdentity,
}

impl GitCli {
    pub fn new(identity: ServiceIdentity) -> Self {
        Self { identity }
    }

    /// Run a git command and return its stdout
    async fn run(&self, workdir: Option<&Path>, args: &[&str]) -> Result<String> {
        let command = format!(
            "git {}",
            args.iter()
                .copied()
                .map(redact_url)
                .collect::<Vec<_>>()
                .join(" ")
        );
        debug!("{}", command);

        let mut cmd = Command::new("git");
        if let Some(dir) = workdir {
            cmd.current_dir(dir);
        }
        cmd.args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_AUTHOR_NAME", &self.identity.name)
            .env("GIT_AUTHOR_EMAIL", &self.identity.email)
            .env("GIT_COMMITTER_NAME", &self.identity.name)
            .env("GIT_COMMITTER_EMAIL", &self.identity.email)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = cmd
            .output()
            .await
            .map_err(|e| GitError::SpawnFailed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(GitError::CommandFailed { command, stderr }.into());
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[async_trait]
impl GitClient for GitCli {
    #[instrument(skip(self, url), fields(url = %redact_url(url)))]
    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<()> {
        let dest = dest.to_string_lossy();
        self.run(None, &["clone", url, dest.as_ref()]).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn fetch(&self, workdir: &Path) -> Result<()> {
        self.run(Some(workdir), &["fetch"]).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn checkout(&self, workdir: &Path, reference: &str) -> Result<()> {
        self.run(Some(workdir), &["checkout", reference]).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn pull(&self, workdir: &Path) -> Result<()> {
        self.run(Some(workdir), &["pull", "--no-rebase", "--no-edit"])
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn branch_create(&self, workdir: &Path, name: &str) -> Result<()> {
        self.run(Some(workdir), &["branch", name]).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn branch_set_upstream(
        &self,
        workdir: &Path,
        name: &str,
        remote_ref: &str,
    ) -> Result<()> {
        let upstream = format!("--set-upstream-to={}", remote_ref);
        self.run(Some(workdir), &["branch", &upstream, name]).await?;
        Ok(())
    }

    async fn branches(&self, workdir: &Path) -> Result<Vec<String>> {
        GitBackend::open(workdir)?.branch_names()
    }

    #[instrument(skip(self))]
    async fn merge(&self, workdir: &Path, reference: &str) -> Result<()> {
        self.run(Some(workdir), &["merge", "--no-edit", reference])
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn add_all(&self, workdir: &Path) -> Result<()> {
        self.run(Some(workdir), &["add", "-A"]).await?;
        Ok(())
    }

    #[instrument(skip(self, message))]
    async fn commit(
        &self,
        workdir: &Path,
        message: &str,
        author: &ServiceIdentity,
    ) -> Result<bool> {
        // `diff --cached --quiet` exits 1 when something is staged
        if self
            .run(Some(workdir), &["diff", "--cached", "--quiet"])
            .await
            .is_ok()
        {
            debug!("Nothing staged, skipping commit");
            return Ok(false);
        }

        let author = author.signature();
        self.run(
            Some(workdir),
            &["commit", "-m", message, "--author", &author],
        )
        .await?;
        Ok(true)
    }

    #[instrument(skip(self, remote), fields(remote = %redact_url(remote)))]
    async fn push(&self, workdir: &Path, remote: &str, refspec: &str) -> Result<()> {
        self.run(Some(workdir), &["push", remote, refspec]).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn diff(&self, workdir: &Path, from: &str, to: &str, path: &str) -> Result<String> {
        self.run(Some(workdir), &["diff", from, to, "--", path])
            .await
    }

    #[instrument(skip(self))]
    async fn log(&self, workdir: &Path, reference: &str, path: &str) -> Result<Vec<LogEntry>> {
        let stdout = self
            .run(
                Some(workdir),
                &[
                    "log",
                    "--format=%H%x1f%at%x1f%s (by %an)",
                    reference,
                    "--",
                    path,
                ],
            )
            .await?;
        parse_log(&stdout)
    }
}

/// Parse `git log --format=%H%x1f%at%x1f%s (by %an)` output
fn parse_log(output: &str) -> Result<Vec<LogEntry>> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let mut fields = line.splitn(3, FIELD_SEP);
            let (Some(hash), Some(timestamp), Some(subject)) =
                (fields.next(), fields.next(), fields.next())
            else {
                return Err(GitError::ParseError(format!("malformed log line: {}", line)).into());
            };
            let timestamp = timestamp
                .parse::<i64>()
                .map_err(|e| GitError::ParseError(format!("bad timestamp '{}': {}", timestamp, e)))?;
            Ok(LogEntry {
                hash: hash.to_string(),
                timestamp,
                subject: subject.to_string(),
            })
        })
        .collect()
}
