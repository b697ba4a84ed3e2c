use tracing_subscriber::EnvFilter;

use crate::error::{Result, WorkspaceError};

/// Install a global fmt subscriber
///
/// `RUST_LOG` wins over `default_filter` when set. Fails rather than panics
/// if a subscriber is already installed.
pub fn init(default_filter: &str) -> Result<()> {
    let filter = build_filter(std::env::var("RUST_LOG").ok().as_deref(), default_filter)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| WorkspaceError::InvalidConfig {
            message: format!("logging already initialized: {}", e),
        })
}

/// Pick the filter directive: a parsable `from_env` first, else the default
fn build_filter(from_env: Option<&str>, default_filter: &str) -> Result<EnvFilter> {
    if let Some(directives) = from_env {
        if let Ok(filter) = EnvFilter::try_new(directives) {
            return Ok(filter);
        }
    }
    EnvFilter::try_new(default_filter).map_err(|e| WorkspaceError::InvalidConfig {
        message: format!("invalid log filter {:?}: {}", default_filter, e),
    })
}
