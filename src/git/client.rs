//! Version-control client contract
//!
//! Every engine talks to git through [`GitClient`] so the protocols can be
//! exercised against a recording fake. All methods take the working copy
//! directory they act on.

use std::path::Path;

use async_trait::async_trait;

use crate::config::ServiceIdentity;
use crate::error::Result;

/// One line of `git log`, newest first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Full commit hash
    pub hash: String,
    /// Author timestamp, seconds since the epoch
    pub timestamp: i64,
    /// Subject line with the author appended: `"<subject> (by <author>)"`
    pub subject: String,
}

#[async_trait]
pub trait GitClient: Send + Sync {
    /// Clone `url` into `dest` (which must not exist yet)
    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<()>;

    async fn fetch(&self, workdir: &Path) -> Result<()>;

    async fn checkout(&self, workdir: &Path, reference: &str) -> Result<()>;

    async fn pull(&self, workdir: &Path) -> Result<()>;

    /// Create `name` at HEAD without checking it out
    async fn branch_create(&self, workdir: &Path, name: &str) -> Result<()>;

    async fn branch_set_upstream(&self, workdir: &Path, name: &str, remote_ref: &str)
        -> Result<()>;

    /// Short names of local branches and `origin` remote-tracking branches
    async fn branches(&self, workdir: &Path) -> Result<Vec<String>>;

    async fn merge(&self, workdir: &Path, reference: &str) -> Result<()>;

    /// Stage every change in the working copy
    async fn add_all(&self, workdir: &Path) -> Result<()>;

    /// Commit staged changes; returns `false` when nothing was staged
    async fn commit(&self, workdir: &Path, message: &str, author: &ServiceIdentity)
        -> Result<bool>;

    /// Push `refspec` to `remote` (a remote name or a URL)
    async fn push(&self, workdir: &Path, remote: &str, refspec: &str) -> Result<()>;

    async fn diff(&self, workdir: &Path, from: &str, to: &str, path: &str) -> Result<String>;

    /// History of `reference` restricted to `path`, newest first
    async fn log(&self, workdir: &Path, reference: &str, path: &str) -> Result<Vec<LogEntry>>;
}
