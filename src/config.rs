use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, WorkspaceError};

pub const DEFAULT_API_URL: &str = "http://localhost:3000";
pub const DEFAULT_DEBOUNCE_MS: u64 = 700;

/// Settings for one project editing session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Base URL of the project REST API
    pub api_url: String,
    pub project_id: String,
    /// Identity used as chat sender
    pub user: String,
    /// Bearer token sent with backend requests
    pub auth_token: Option<String>,
    /// Quiet period before a content edit is propagated
    pub debounce_ms: u64,
    /// Default `tracing` filter directive, overridden by `RUST_LOG`
    pub log_filter: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            project_id: String::new(),
            user: String::new(),
            auth_token: None,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            log_filter: "info".to_string(),
        }
    }
}

impl SessionConfig {
    pub fn new(project_id: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            user: user.into(),
            ..Self::default()
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn with_debounce(mut self, delay: Duration) -> Self {
        self.debounce_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Install the global `tracing` subscriber using `log_filter`
    pub fn init_logging(&self) -> Result<()> {
        crate::logging::init(&self.log_filter)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Read a JSON config file; missing keys take their defaults
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        let config: SessionConfig = serde_json::from_str(&raw)?;
        Ok(config)
    }

    /// Apply `COLLAB_*` overrides from the process environment
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `COLLAB_*` overrides from an arbitrary lookup
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(api_url) = lookup("COLLAB_API_URL") {
            self.api_url = api_url;
        }
        if let Some(project_id) = lookup("COLLAB_PROJECT_ID") {
            self.project_id = project_id;
        }
        if let Some(user) = lookup("COLLAB_USER") {
            self.user = user;
        }
        if let Some(token) = lookup("COLLAB_TOKEN") {
            self.auth_token = Some(token).filter(|t| !t.is_empty());
        }
        if let Some(raw) = lookup("COLLAB_DEBOUNCE_MS") {
            self.debounce_ms = raw.parse().map_err(|_| WorkspaceError::InvalidConfig {
                message: format!("COLLAB_DEBOUNCE_MS is not a number: {:?}", raw),
            })?;
        }
        if let Some(filter) = lookup("COLLAB_LOG") {
            self.log_filter = filter;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |message: &str| {
            Err(WorkspaceError::InvalidConfig {
                message: message.to_string(),
            })
        };

        if self.project_id.trim().is_empty() {
            return invalid("project_id must not be empty");
        }
        if self.user.trim().is_empty() {
            return invalid("user must not be empty");
        }
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return invalid("api_url must be an http(s) URL");
        }
        if self.debounce_ms == 0 {
            return invalid("debounce_ms must be greater than zero");
        }
        Ok(())
    }
}
