//! Git plumbing for editing sessions
//!
//! - `GitClient` - version-control contract, implemented by `GitCli`
//! - `GitBackend` - gitoxide ref queries
//! - `naming` - edit and publish branch names
//! - `Divergence` - approximate commits-ahead analysis
//! - `HostingApi` - GitLab / GitHub merge request endpoints

mod backend;
mod cli;
mod client;
mod credentials;
mod history;
mod hosting;
pub mod naming;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::*;
pub use cli::*;
pub use client::*;
pub use credentials::*;
pub use history::*;
pub use hosting::*;
