//! Sandboxed file access inside a session
//!
//! Every path is resolved against the session root and rejected if it
//! would land outside it, before any filesystem access. Writes are
//! positional so uploads can be chunked and resumed.

use std::io::{ErrorKind, SeekFrom};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, instrument};

use super::{Authorizer, SessionId, SessionWorkspace};
use crate::error::{Error, Result, ValidationError};

/// Entry point of the file API: authorizes, then hands out sandboxes
pub struct SessionFileStore {
    workspace: SessionWorkspace,
    authorizer: Arc<dyn Authorizer>,
}

impl SessionFileStore {
    pub fn new(workspace: SessionWorkspace, authorizer: Arc<dyn Authorizer>) -> Self {
        Self {
            workspace,
            authorizer,
        }
    }

    /// Open the sandbox of `session` if `token` is authorized for it
    pub async fn open(&self, token: Option<&str>, session: &str) -> Result<SessionSandbox> {
        let id = SessionId::parse(session)?;
        if !self.authorizer.authorize(token, &id) {
            return Err(Error::Unauthorized);
        }

        let dir = self.workspace.existing_session_dir(&id).await?;
        let root = tokio::fs::canonicalize(&dir).await?;
        Ok(SessionSandbox { root })
    }
}

/// File operations confined to one session directory
#[derive(Debug, Clone)]
pub struct SessionSandbox {
    /// Canonical session directory
    root: PathBuf,
}

impl SessionSandbox {
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Relative paths of every file in the session, directories excluded
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                } else if let Ok(relative) = path.strip_prefix(&self.root) {
                    files.push(to_slash(relative));
                }
            }
        }

        files.sort();
        Ok(files)
    }

    /// Open a file for streaming; `None` if it does not exist
    pub async fn read(&self, path: &str) -> Result<Option<File>> {
        let file = self.resolve(path).await?;
        let handle = match File::open(&file).await {
            Ok(handle) => handle,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if !handle.metadata().await?.is_file() {
            return Ok(None);
        }
        Ok(Some(handle))
    }

    /// Write `payload` at `start`.
    ///
    /// `truncate` (only valid with `start == 0`) or a missing file resets the
    /// length to zero first; otherwise bytes are overwritten in place and the
    /// file grows as needed.
    #[instrument(skip(self, payload), fields(len = payload.len()))]
    pub async fn write(&self, path: &str, payload: &[u8], start: u64, truncate: bool) -> Result<()> {
        if truncate && start != 0 {
            return Err(ValidationError::TruncateWithOffset(start).into());
        }

        let file = self.resolve(path).await?;
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let exists = tokio::fs::try_exists(&file).await?;
        let mut handle = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(truncate || !exists)
            .open(&file)
            .await?;
        handle.seek(SeekFrom::Start(start)).await?;
        handle.write_all(payload).await?;
        handle.flush().await?;

        debug!("Wrote {} bytes to {:?} at {}", payload.len(), file, start);
        Ok(())
    }

    /// Remove a file; `false` if it did not exist
    pub async fn delete(&self, path: &str) -> Result<bool> {
        let file = self.resolve(path).await?;
        match tokio::fs::remove_file(&file).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Map a client path to an absolute path strictly inside the root.
    ///
    /// `..` is resolved lexically, then the deepest existing ancestor is
    /// canonicalized so symlinks cannot point outside either. A dangling
    /// link counts as existing and is refused.
    async fn resolve(&self, path: &str) -> Result<PathBuf> {
        let escape = || Error::from(ValidationError::PathEscapesSandbox(path.to_string()));

        let mut resolved = self.root.clone();
        for component in Path::new(path).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::ParentDir => {
                    if !resolved.pop() || !resolved.starts_with(&self.root) {
                        return Err(escape());
                    }
                }
                Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            }
        }

        if resolved == self.root || !resolved.starts_with(&self.root) {
            return Err(escape());
        }

        for ancestor in resolved.ancestors() {
            match tokio::fs::symlink_metadata(ancestor).await {
                Ok(_) => {
                    let inside = matches!(
                        tokio::fs::canonicalize(ancestor).await,
                        Ok(canonical) if canonical.starts_with(&self.root)
                    );
                    if !inside {
                        return Err(escape());
                    }
                    break;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(resolved)
    }
}

fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
