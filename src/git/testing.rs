//! Recording fakes of the git and hosting contracts for engine tests

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{GitClient, HostingApi, LogEntry, MergeProposal};
use crate::config::ServiceIdentity;
use crate::error::{GitError, HostingError, Result};

/// Records every call as `"<verb> <args>"` and answers from canned data
#[derive(Default)]
pub struct RecordingGit {
    calls: Mutex<Vec<String>>,
    branches: Vec<String>,
    logs: HashMap<String, Vec<LogEntry>>,
    /// Calls starting with this prefix fail with `stderr`
    failure: Option<(String, String)>,
}

impl RecordingGit {
    pub fn with_branches(branches: &[&str]) -> Self {
        Self {
            branches: branches.iter().map(|b| b.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn with_log(mut self, reference: &str, hashes: &[&str]) -> Self {
        let entries = hashes
            .iter()
            .map(|h| LogEntry {
                hash: h.to_string(),
                timestamp: 1_700_000_000,
                subject: format!("{} (by Editor)", h),
            })
            .collect();
        self.logs.insert(reference.to_string(), entries);
        self
    }

    pub fn failing_on(mut self, prefix: &str, stderr: &str) -> Self {
        self.failure = Some((prefix.to_string(), stderr.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) -> Result<()> {
        self.calls.lock().unwrap().push(call.clone());
        match &self.failure {
            Some((prefix, stderr)) if call.starts_with(prefix.as_str()) => {
                Err(GitError::CommandFailed {
                    command: format!("git {}", call),
                    stderr: stderr.clone(),
                }
                .into())
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl GitClient for RecordingGit {
    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<()> {
        self.record(format!("clone {}", url))?;
        tokio::fs::create_dir_all(dest).await?;
        Ok(())
    }

    async fn fetch(&self, _workdir: &Path) -> Result<()> {
        self.record("fetch".to_string())
    }

    async fn checkout(&self, _workdir: &Path, reference: &str) -> Result<()> {
        self.record(format!("checkout {}", reference))
    }

    async fn pull(&self, _workdir: &Path) -> Result<()> {
        self.record("pull".to_string())
    }

    async fn branch_create(&self, _workdir: &Path, name: &str) -> Result<()> {
        self.record(format!("branch {}", name))
    }

    async fn branch_set_upstream(&self, _workdir: &Path, name: &str, remote_ref: &str) -> Result<()> {
        self.record(format!("upstream {} {}", name, remote_ref))
    }

    async fn branches(&self, _workdir: &Path) -> Result<Vec<String>> {
        self.record("branches".to_string())?;
        Ok(self.branches.clone())
    }

    async fn merge(&self, _workdir: &Path, reference: &str) -> Result<()> {
        self.record(format!("merge {}", reference))
    }

    async fn add_all(&self, _workdir: &Path) -> Result<()> {
        self.record("add -A".to_string())
    }

    async fn commit(&self, _workdir: &Path, message: &str, author: &ServiceIdentity) -> Result<bool> {
        self.record(format!("commit {} --author {}", message, author.signature()))?;
        Ok(true)
    }

    async fn push(&self, _workdir: &Path, remote: &str, refspec: &str) -> Result<()> {
        self.record(format!("push {} {}", remote, refspec))
    }

    async fn diff(&self, _workdir: &Path, from: &str, to: &str, path: &str) -> Result<String> {
        self.record(format!("diff {} {} -- {}", from, to, path))?;
        Ok(format!("diff --git a/{path} b/{path}\n"))
    }

    async fn log(&self, _workdir: &Path, reference: &str, path: &str) -> Result<Vec<LogEntry>> {
        self.record(format!("log {} -- {}", reference, path))?;
        Ok(self.logs.get(reference).cloned().unwrap_or_default())
    }
}

/// Which provider endpoint was hit, with the project path and proposal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostingCall {
    GitLab(String, MergeProposal),
    GitHub(String, MergeProposal),
}

#[derive(Default)]
pub struct RecordingHosting {
    calls: Mutex<Vec<HostingCall>>,
    reject: bool,
}

impl RecordingHosting {
    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<HostingCall> {
        self.calls.lock().unwrap().clone()
    }

    fn answer(&self, url: String) -> Result<String> {
        if self.reject {
            return Err(HostingError::RequestRejected {
                status: 401,
                body: "Unauthorized".to_string(),
            }
            .into());
        }
        Ok(url)
    }
}

#[async_trait]
impl HostingApi for RecordingHosting {
    async fn open_gitlab_merge_request(
        &self,
        project_path: &str,
        _token: &str,
        proposal: &MergeProposal,
    ) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push(HostingCall::GitLab(project_path.to_string(), proposal.clone()));
        self.answer(format!("https://gitlab.com/{}/-/merge_requests/1", project_path))
    }

    async fn open_github_pull_request(
        &self,
        owner_repo: &str,
        _token: &str,
        proposal: &MergeProposal,
    ) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push(HostingCall::GitHub(owner_repo.to_string(), proposal.clone()));
        self.answer(format!("https://github.com/{}/pull/1", owner_repo))
    }
}
