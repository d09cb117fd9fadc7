//! Deterministic names derived from a repository URL and a subdirectory
//!
//! The edit branch name is the join key between sessions and on-disk git
//! state, so it depends on nothing but its inputs.

use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;
use xxhash_rust::xxh3::xxh3_64;

/// Prefix of per-subdirectory edit branches
pub const EDIT_BRANCH_PREFIX: &str = "editor-";

/// Prefix of transient publish branches
pub const PUBLISH_BRANCH_PREFIX: &str = "publish-";

static NON_ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9]").unwrap());

/// Filesystem-safe identity of a remote URL.
///
/// Trailing `.git` is dropped and every non-alphanumeric character becomes `_`.
pub fn repository_identity(remote_url: &str) -> String {
    let url = remote_url.trim();
    let url = url.strip_suffix(".git").unwrap_or(url);
    NON_ALPHANUMERIC.replace_all(url, "_").into_owned()
}

/// Strip surrounding whitespace and slashes; `""` is the repository root
pub fn normalize_subdirectory(subdirectory: &str) -> String {
    subdirectory.trim().trim_matches('/').to_string()
}

/// Path filter for history queries: the subdirectory, or `.` for the root
pub fn path_filter(subdirectory: &str) -> String {
    let subdirectory = normalize_subdirectory(subdirectory);
    if subdirectory.is_empty() {
        ".".to_string()
    } else {
        subdirectory
    }
}

/// Edit branch for a (repository, subdirectory) pair: `editor-` + 8 hex chars
pub fn edit_branch(remote_url: &str, subdirectory: &str) -> String {
    let key = format!(
        "{}\0{}",
        repository_identity(remote_url),
        normalize_subdirectory(subdirectory)
    );
    let hash = xxh3_64(key.as_bytes());
    format!("{}{:08x}", EDIT_BRANCH_PREFIX, hash >> 32)
}

/// Fresh, uniquely named publish branch: `publish-` + 8 random hex chars
pub fn publish_branch() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}{}", PUBLISH_BRANCH_PREFIX, &id[..8])
}
