//! Read-only git queries using pure gitoxide

use std::path::{Path, PathBuf};

use gix::Repository;
use tracing::{debug, instrument};

use crate::error::{GitError, Result};

const LOCAL_PREFIX: &str = "refs/heads/";
const ORIGIN_PREFIX: &str = "refs/remotes/origin/";

/// Git backend using gitoxide
///
/// Opened fresh for every query so it always sees refs written by the CLI.
pub struct GitBackend {
    /// The gitoxide repository handle
    repo: Repository,
    /// Path to the working copy
    path: PathBuf,
}

impl GitBackend {
    /// Open an existing repository
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let repo = gix::open(&path).map_err(|e| {
            if e.to_string().contains("not a git repository") {
                GitError::NotARepository(path.clone())
            } else {
                GitError::from(e)
            }
        })?;

        debug!("Opened repository at {:?}", path);

        Ok(Self { repo, path })
    }

    /// Get the repository path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Short names of local branches and `origin/*` tracking branches, deduplicated
    pub fn branch_names(&self) -> Result<Vec<String>> {
        let refs = self
            .repo
            .references()
            .map_err(|e| GitError::Gix(e.to_string()))?;

        let mut names = Vec::new();
        for reference in refs.all().map_err(|e| GitError::Gix(e.to_string()))? {
            let Ok(r) = reference else { continue };
            let full = r.name().as_bstr().to_string();
            if let Some(short) = short_branch_name(&full) {
                if short != "HEAD" && !names.iter().any(|n| n == short) {
                    names.push(short.to_string());
                }
            }
        }

        Ok(names)
    }
}

fn short_branch_name(full: &str) -> Option<&str> {
    full.strip_prefix(LOCAL_PREFIX)
        .or_else(|| full.strip_prefix(ORIGIN_PREFIX))
}
