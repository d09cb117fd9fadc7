//! Error types for subtree-editor
//!
//! Uses `thiserror` for ergonomic error definitions with automatic `Display` and `Error` impls.
//!
//! Three families matter to callers:
//! - [`ValidationError`] - rejected before any side effect
//! - [`GitError`] / [`HostingError`] - a transport step failed, message kept verbatim
//! - missing session files are not errors at all (see `session::SessionFileStore`)

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Top-level error type for subtree-editor
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Git(#[from] GitError),

    #[error("{0}")]
    Hosting(#[from] HostingError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unauthorized")]
    Unauthorized,
}

impl Error {
    /// Whether the error was raised before any git, network or file side effect
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Request validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No repository provided")]
    MissingRepository,

    #[error("Repository not allowed")]
    RepositoryNotAllowed(String),

    #[error("No session ID provided")]
    MissingSessionId,

    #[error("Invalid session ID '{0}'")]
    InvalidSessionId(String),

    #[error("Truncation is only allowed when writing from offset 0 (got offset {0})")]
    TruncateWithOffset(u64),

    #[error("Forbidden path: {0}")]
    PathEscapesSandbox(String),

    #[error("Unknown session '{0}'")]
    UnknownSession(String),

    #[error("Invalid revision '{0}'")]
    InvalidRevision(String),
}

/// Git operations errors
#[derive(Error, Debug)]
pub enum GitError {
    #[error("Not a git repository: {0}")]
    NotARepository(PathBuf),

    /// A git command exited unsuccessfully; `stderr` is kept verbatim
    #[error("{stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Failed to run git: {0}")]
    SpawnFailed(String),

    #[error("Gitoxide error: {0}")]
    Gix(String),

    #[error("Failed to parse git output: {0}")]
    ParseError(String),

    #[error("No commit on '{0}' touches this path")]
    NoCommits(String),
}

/// Hosting-provider REST errors
#[derive(Error, Debug)]
pub enum HostingError {
    #[error("{status}: {body}")]
    RequestRejected { status: u16, body: String },

    #[error("Hosting request failed: {0}")]
    Transport(String),

    #[error("Hosting response did not contain '{0}'")]
    MissingField(&'static str),

    #[error("Cannot derive project path from repository URL '{0}'")]
    InvalidRepositoryUrl(String),
}

impl From<reqwest::Error> for HostingError {
    fn from(e: reqwest::Error) -> Self {
        HostingError::Transport(e.to_string())
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Failed to create directory: {0}")]
    DirectoryCreationFailed(PathBuf),
}

/// Result type alias using our error type
pub type Result<T> = std::result::Result<T, Error>;

/// Convenience conversions for gitoxide errors
impl From<gix::open::Error> for GitError {
    fn from(e: gix::open::Error) -> Self {
        GitError::Gix(e.to_string())
    }
}

/// Uniform boundary result.
///
/// Serialises as `{"success": true, ...payload}` or
/// `{"success": false, "error": "..."}`.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Outcome<T> {
    Success {
        success: bool,
        #[serde(flatten)]
        payload: T,
    },
    Failure {
        success: bool,
        error: String,
    },
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Error message of a failed outcome
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error, .. } => Some(error),
        }
    }
}

impl<T> From<Result<T>> for Outcome<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(payload) => Self::Success {
                success: true,
                payload,
            },
            Err(e) => Self::Failure {
                success: false,
                error: e.to_string(),
            },
        }
    }
}
