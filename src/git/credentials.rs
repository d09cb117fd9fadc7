//! Credential resolution for pushes and hosting API calls
//!
//! Credentials travel to git as URL userinfo. Provider defaults from the
//! configuration take precedence over what the caller supplied.

use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use crate::config::GitSettings;

/// Per-call username/password supplied by the editor client
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Credentials {
    /// Build from raw request fields; empty strings count as absent
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        let non_empty = |s: String| (!s.trim().is_empty()).then_some(s);
        Self {
            username: non_empty(username.into()),
            password: non_empty(password.into()),
        }
    }
}

/// Which REST contract a repository host speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKind {
    GitLab,
    /// GitHub and anything speaking its pulls API
    GitHub,
}

impl HostKind {
    pub fn of(remote_url: &str) -> Self {
        match Url::parse(remote_url.trim()) {
            Ok(url) if url.host_str() == Some("gitlab.com") => Self::GitLab,
            Ok(_) => Self::GitHub,
            Err(_) if remote_url.contains("//gitlab.com") => Self::GitLab,
            Err(_) => Self::GitHub,
        }
    }
}

/// Embed `username:password` into the URL; unchanged unless both are present
pub fn with_userinfo(remote_url: &str, username: Option<&str>, password: Option<&str>) -> String {
    let (Some(username), Some(password)) = (username, password) else {
        return remote_url.to_string();
    };

    let Ok(mut url) = Url::parse(remote_url.trim()) else {
        debug!("Remote is not a URL, pushing without credentials");
        return remote_url.to_string();
    };

    if url.set_username(username).is_err() || url.set_password(Some(password)).is_err() {
        debug!("Remote scheme cannot carry credentials, pushing without them");
        return remote_url.to_string();
    }

    url.to_string()
}

/// Push URL with provider defaults overriding the caller's credentials
pub fn resolve_push_url(remote_url: &str, credentials: &Credentials, settings: &GitSettings) -> String {
    let (default_user, default_password) = match HostKind::of(remote_url) {
        HostKind::GitLab => (&settings.gitlab_user, &settings.gitlab_password),
        HostKind::GitHub => (&settings.github_user, &settings.github_password),
    };

    with_userinfo(
        remote_url,
        default_user.as_deref().or(credentials.username.as_deref()),
        default_password
            .as_deref()
            .or(credentials.password.as_deref()),
    )
}

/// Token for the provider REST call: configured password, else the caller's
pub fn resolve_api_token(kind: HostKind, credentials: &Credentials, settings: &GitSettings) -> String {
    let configured = match kind {
        HostKind::GitLab => &settings.gitlab_password,
        HostKind::GitHub => &settings.github_password,
    };
    configured
        .as_deref()
        .or(credentials.password.as_deref())
        .unwrap_or_default()
        .to_string()
}

/// Mask the password of a URL for logs and error messages
pub fn redact_url(value: &str) -> String {
    match Url::parse(value) {
        Ok(mut url) if url.password().is_some() => {
            let _ = url.set_password(Some("***"));
            url.to_string()
        }
        _ => value.to_string(),
    }
}
