//! Session sandboxes on disk
//!
//! A session directory starts as a copy of one subtree of the working copy
//! and is folded back into it on commit. Copies merge: files missing from
//! the source are left alone at the destination.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use super::{Session, SessionId};
use crate::error::{Result, ValidationError};
use crate::git::naming::normalize_subdirectory;
use crate::repository::RepositoryHandle;

/// Shared sidecar at the repository root; travels with sessions, never committed
pub const VARIABLES_FILE: &str = "variables.json";

/// Marker file announcing a task editor subtree
pub const TASK_EDITOR_MARKER: &str = "task_editor.json";

/// Never copied in either direction
const GIT_DIR: &str = ".git";

/// A freshly materialized session
#[derive(Debug, Clone)]
pub struct PreparedWorkspace {
    pub session: Session,
    /// Whether the subtree carries [`TASK_EDITOR_MARKER`]
    pub task_editor: bool,
}

/// Creates and resolves session directories under one root
#[derive(Debug, Clone)]
pub struct SessionWorkspace {
    root: PathBuf,
}

impl SessionWorkspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn session_dir(&self, id: &SessionId) -> PathBuf {
        self.root.join(id.as_str())
    }

    /// Directory of an existing session
    pub async fn existing_session_dir(&self, id: &SessionId) -> Result<PathBuf> {
        let dir = self.session_dir(id);
        if !tokio::fs::try_exists(&dir).await? {
            return Err(ValidationError::UnknownSession(id.to_string()).into());
        }
        Ok(dir)
    }

    /// Snapshot `subdirectory` of the working copy into a new session.
    ///
    /// Callers hold the repository guard.
    #[instrument(skip(self, repo), fields(repo = %repo.identity()))]
    pub async fn materialize(
        &self,
        repo: &RepositoryHandle,
        subdirectory: &str,
    ) -> Result<PreparedWorkspace> {
        let subdirectory = normalize_subdirectory(subdirectory);
        let id = SessionId::new();
        let session_dir = self.session_dir(&id);
        tokio::fs::create_dir_all(&session_dir).await?;

        let source = repo.local_path().join(&subdirectory);
        if is_real(&source, |meta| meta.is_dir()).await? {
            copy_dir(&source, &session_dir).await?;
        } else {
            debug!("Subdirectory {:?} is not a directory, starting empty", source);
        }

        let variables = repo.local_path().join(VARIABLES_FILE);
        if is_real(&variables, |meta| meta.is_file()).await? {
            tokio::fs::copy(&variables, session_dir.join(VARIABLES_FILE)).await?;
        }

        let task_editor = tokio::fs::try_exists(session_dir.join(TASK_EDITOR_MARKER)).await?;

        info!("Prepared session {} for '{}'", id, subdirectory);

        Ok(PreparedWorkspace {
            session: Session::new(id, repo.remote_url(), subdirectory, session_dir),
            task_editor,
        })
    }

    /// Remove the sidecar from a session so it cannot be committed
    pub async fn strip_sidecar(&self, session_dir: &Path) -> Result<()> {
        match tokio::fs::remove_file(session_dir.join(VARIABLES_FILE)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Copy a session over `subdirectory` of the working copy.
    ///
    /// Overwrites what the session has; deletes nothing.
    pub async fn fold_into(
        &self,
        session_dir: &Path,
        repo: &RepositoryHandle,
        subdirectory: &str,
    ) -> Result<()> {
        let target = repo
            .local_path()
            .join(normalize_subdirectory(subdirectory));
        copy_dir(session_dir, &target).await
    }
}

/// Whether `path` exists and, without following a symlink, satisfies `kind`
async fn is_real(path: &Path, kind: impl Fn(&std::fs::Metadata) -> bool) -> Result<bool> {
    match tokio::fs::symlink_metadata(path).await {
        Ok(meta) => Ok(kind(&meta)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Recursively merge `src` into `dest`, skipping `.git`.
///
/// Symlinks are recreated as links and never followed, and a link already
/// at the destination is replaced instead of written through.
async fn copy_dir(src: &Path, dest: &Path) -> Result<()> {
    let mut pending = vec![(src.to_path_buf(), dest.to_path_buf())];

    while let Some((from, to)) = pending.pop() {
        unlink_symlink(&to).await?;
        tokio::fs::create_dir_all(&to).await?;
        let mut entries = tokio::fs::read_dir(&from).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name() == GIT_DIR {
                continue;
            }
            let target = to.join(entry.file_name());
            let file_type = entry.file_type().await?;
            if file_type.is_symlink() {
                copy_symlink(&entry.path(), &target).await?;
            } else if file_type.is_dir() {
                pending.push((entry.path(), target));
            } else {
                unlink_symlink(&target).await?;
                tokio::fs::copy(entry.path(), &target).await?;
            }
        }
    }

    Ok(())
}

async fn unlink_symlink(path: &Path) -> Result<()> {
    if is_real(path, |meta| meta.file_type().is_symlink()).await? {
        tokio::fs::remove_file(path).await?;
    }
    Ok(())
}

/// Recreate the link `from` at `to`, replacing whatever `to` held
#[cfg(unix)]
async fn copy_symlink(from: &Path, to: &Path) -> Result<()> {
    let link = tokio::fs::read_link(from).await?;
    match tokio::fs::symlink_metadata(to).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(to).await?,
        Ok(_) => tokio::fs::remove_file(to).await?,
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    tokio::fs::symlink(&link, to).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn copy_symlink(from: &Path, _to: &Path) -> Result<()> {
    tracing::warn!("Skipping symlink {:?}, links are only preserved on unix", from);
    Ok(())
}
