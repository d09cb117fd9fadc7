//! Service configuration settings
//!
//! Layered configuration: defaults → config file → environment variables

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Error, Result};

/// Environment variable prefix; nested keys use `__` (e.g. `SUBTREE_EDITOR_GIT__GITHUB_USER`)
pub const ENV_PREFIX: &str = "SUBTREE_EDITOR_";

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP surface listens on
    pub bind: SocketAddr,

    /// Root folder for working copies and sessions (platform data dir if unset)
    pub base_dir: Option<PathBuf>,

    /// Working copies folder, relative to `base_dir`
    pub repositories_dir: String,

    /// Session sandboxes folder, relative to `base_dir`
    pub sessions_dir: String,

    /// Git access policy and provider credentials
    pub git: GitSettings,

    /// Identity recorded on every commit and merge made by the service
    pub author: ServiceIdentity,

    /// Hosting provider API endpoints
    pub hosting: HostingSettings,

    /// Token accepted by the default file-API authorizer
    pub api_token: String,

    /// Enable debug logging
    pub debug: bool,

    /// Log file path (if set, logs to file instead of stderr)
    pub log_file: Option<PathBuf>,
}

/// Repository allow-list and provider default credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GitSettings {
    /// Permitted remote URLs; empty means every repository is allowed
    pub allowed_repositories: Vec<String>,
    pub gitlab_user: Option<String>,
    pub gitlab_password: Option<String>,
    pub github_user: Option<String>,
    pub github_password: Option<String>,
}

impl GitSettings {
    /// Whether `repo` may be touched by the service
    pub fn is_allowed(&self, repo: &str) -> bool {
        self.allowed_repositories.is_empty() || self.allowed_repositories.iter().any(|r| r == repo)
    }
}

/// Name and email of the service committer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceIdentity {
    pub name: String,
    pub email: String,
}

impl Default for ServiceIdentity {
    fn default() -> Self {
        Self {
            name: "Editor".to_string(),
            email: "task-editor@france-ioi.org".to_string(),
        }
    }
}

impl ServiceIdentity {
    /// `Name <email>` as accepted by `git commit --author`
    pub fn signature(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostingSettings {
    /// Base URL of the GitLab instance (`/api/v4` is appended)
    pub gitlab_api_url: String,
    /// Base URL of the GitHub-compatible REST API
    pub github_api_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for HostingSettings {
    fn default() -> Self {
        Self {
            gitlab_api_url: "https://gitlab.com".to_string(),
            github_api_url: "https://api.github.com".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 3000)),
            base_dir: None,
            repositories_dir: "repositories".to_string(),
            sessions_dir: "sessions".to_string(),
            git: GitSettings::default(),
            author: ServiceIdentity::default(),
            hosting: HostingSettings::default(),
            api_token: "testtoken".to_string(),
            debug: false,
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from all sources
    pub fn load() -> Result<Self> {
        let config_path = Self::config_file_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration layering a specific TOML file
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config: Config = Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Config::default()))
            // Layer config file if it exists
            .merge(Toml::file(config_path))
            // Layer environment variables (SUBTREE_EDITOR_BIND, SUBTREE_EDITOR_GIT__GITLAB_PASSWORD, ...)
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        Ok(config)
    }

    /// Get the configuration file path
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = Self::project_dirs()?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Root folder for working copies and sessions
    pub fn base_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.base_dir {
            Ok(dir.clone())
        } else {
            Ok(Self::project_dirs()?.data_dir().to_path_buf())
        }
    }

    /// Folder holding one working copy per repository
    pub fn repositories_path(&self) -> Result<PathBuf> {
        Ok(self.base_dir()?.join(&self.repositories_dir))
    }

    /// Folder holding one sandbox per session
    pub fn sessions_path(&self) -> Result<PathBuf> {
        Ok(self.base_dir()?.join(&self.sessions_dir))
    }

    /// Ensure all required directories exist
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [self.repositories_path()?, self.sessions_path()?] {
            std::fs::create_dir_all(&dir)
                .map_err(|_| Error::Config(ConfigError::DirectoryCreationFailed(dir)))?;
        }
        Ok(())
    }

    /// Save current configuration to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    /// Save current configuration to a specific file
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|_e| {
                Error::Config(ConfigError::DirectoryCreationFailed(parent.to_path_buf()))
            })?;
        }

        let toml =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed(e.to_string()))?;

        std::fs::write(config_path, toml).map_err(|e| ConfigError::SaveFailed(e.to_string()))?;

        Ok(())
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("org", "subtree-editor", "subtree-editor").ok_or_else(|| {
            Error::Config(ConfigError::LoadFailed(
                "Could not determine home directory".to_string(),
            ))
        })
    }
}
