//! Editing sessions
//!
//! - `Session` / `SessionId` - an isolated sandbox holding one subtree
//! - `SessionWorkspace` - materializes sandboxes and folds them back
//! - `SessionFileStore` - authorized, path-guarded file access inside a sandbox

mod auth;
mod files;
mod types;
mod workspace;

pub use auth::*;
pub use files::*;
pub use types::*;
pub use workspace::*;
