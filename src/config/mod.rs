//! Configuration module
//!
//! Handles service configuration (`config.toml` in the platform config dir),
//! layered with `SUBTREE_EDITOR_*` environment variables.

mod settings;

pub use settings::*;
