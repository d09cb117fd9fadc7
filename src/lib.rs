//! Subtree Editor - git-backed editing sessions over one subtree of a repository
//!
//! A content editor checks out a subdirectory of a remote repository into an
//! isolated session, edits files there through a sandboxed file API, and
//! folds the result back into a per-subdirectory edit branch. Publishing
//! merges that branch into trunk directly or opens a GitLab merge request /
//! GitHub pull request.
//!
//! # Architecture
//!
//! - **EditionService** - validates each request, takes the repository lock,
//!   runs the sync / commit / publish protocols
//! - **RepositoryRegistry** - one shared working copy and one lock per remote
//! - **SessionWorkspace** - materializes and folds back session sandboxes
//! - **SessionFileStore** - authorized, path-guarded positional file access
//!
//! # Modules
//!
//! - [`edition`] - editing protocol engines and the boundary service
//! - [`git`] - version-control contract, git CLI client, naming, divergence, hosting APIs
//! - [`repository`] - working copies and their locks
//! - [`session`] - session sandboxes and the file API
//! - [`server`] - axum HTTP surface
//! - [`config`] - layered configuration
//! - [`error`] - Error types

pub mod config;
pub mod edition;
pub mod error;
pub mod git;
pub mod repository;
pub mod server;
pub mod session;

pub use config::Config;
pub use edition::EditionService;
pub use error::{Error, Outcome, Result};
pub use repository::{RepositoryHandle, RepositoryRegistry};
pub use session::{SessionFileStore, SessionId, SessionWorkspace};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
