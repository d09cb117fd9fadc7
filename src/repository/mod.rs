//! Working copies, one per remote repository
//!
//! Every branch-mutating sequence runs on the single shared working copy of
//! its repository, so each handle carries an exclusive lock shared by all
//! handles of the same repository.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, instrument};

use crate::error::Result;
use crate::git::naming::repository_identity;
use crate::git::{redact_url, GitClient};

/// A remote repository and its local working copy
#[derive(Debug, Clone)]
pub struct RepositoryHandle {
    remote_url: String,
    identity: String,
    local_path: PathBuf,
    lock: Arc<Mutex<()>>,
}

/// Exclusive access to a working copy; released on drop
pub type WorkingCopyGuard<'a> = MutexGuard<'a, ()>;

impl RepositoryHandle {
    pub fn remote_url(&self) -> &str {
        &self.remote_url
    }

    /// Sanitized remote URL, also the working copy directory name
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    /// Wait for exclusive access to the working copy
    pub async fn lock(&self) -> WorkingCopyGuard<'_> {
        self.lock.lock().await
    }

    /// Clone the remote if the working copy does not exist yet.
    ///
    /// Callers hold the guard from [`lock`](Self::lock).
    #[instrument(skip_all, fields(repo = %self.identity))]
    pub async fn ensure_cloned(&self, git: &dyn GitClient) -> Result<()> {
        if tokio::fs::try_exists(&self.local_path).await? {
            return Ok(());
        }

        if let Some(parent) = self.local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        git.clone_repo(&self.remote_url, &self.local_path).await?;
        info!(
            "Cloned {} into {:?}",
            redact_url(&self.remote_url),
            self.local_path
        );
        Ok(())
    }
}

/// Hands out handles, one lock per repository identity.
///
/// Locks are never evicted, so the map grows with every distinct repository
/// seen; an allow-list keeps it bounded.
pub struct RepositoryRegistry {
    root: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl RepositoryRegistry {
    /// Working copies live under `root/<identity>`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Handle for `remote_url`; handles of the same repository share a lock
    pub async fn handle(&self, remote_url: &str) -> RepositoryHandle {
        let identity = repository_identity(remote_url);
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(identity.clone()).or_default())
        };

        RepositoryHandle {
            remote_url: remote_url.trim().to_string(),
            local_path: self.root.join(&identity),
            identity,
            lock,
        }
    }
}
