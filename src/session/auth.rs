//! Authorization seam for the session file API

use super::SessionId;

/// Decides whether a bearer token may touch a session's files
pub trait Authorizer: Send + Sync {
    fn authorize(&self, token: Option<&str>, session: &SessionId) -> bool;
}

/// Accepts one fixed token for every session.
///
/// Placeholder until real token validation exists.
#[derive(Debug, Clone)]
pub struct StaticTokenAuthorizer {
    token: String,
}

impl StaticTokenAuthorizer {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// The token handed out with each prepared session
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl Authorizer for StaticTokenAuthorizer {
    fn authorize(&self, token: Option<&str>, _session: &SessionId) -> bool {
        token == Some(self.token.as_str())
    }
}
