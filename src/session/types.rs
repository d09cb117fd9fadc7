//! Core session types

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Opaque session token.
///
/// Generated from a v4 UUID (OS randomness), so it is unguessable and safe to
/// use as the session's directory name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Create a new random session ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Validate a client-supplied ID.
    ///
    /// Only ASCII alphanumerics, `-` and `_` are accepted, which keeps the
    /// ID a single path component.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ValidationError::MissingSessionId);
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ValidationError::InvalidSessionId(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An isolated sandbox holding a snapshot of one subtree
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: SessionId,
    /// Remote URL of the repository
    pub repository: String,
    /// Normalized subdirectory (`""` for the repository root)
    pub subdirectory: String,
    /// Sandbox directory
    pub directory: PathBuf,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        id: SessionId,
        repository: impl Into<String>,
        subdirectory: impl Into<String>,
        directory: PathBuf,
    ) -> Self {
        Self {
            id,
            repository: repository.into(),
            subdirectory: subdirectory.into(),
            directory,
            created_at: Utc::now(),
        }
    }
}
