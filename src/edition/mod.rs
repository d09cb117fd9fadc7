//! Editing protocol engines and the service composing them
//!
//! - `sync` - trunk resolution and edit branch synchronization
//! - `commit` - session to edit branch
//! - `publish` - edit branch to trunk, directly or through a merge request
//! - `EditionService` - validated, repository-locked entry points

mod commit;
mod publish;
mod service;
mod sync;

pub use commit::*;
pub use publish::*;
pub use service::*;
pub use sync::*;
