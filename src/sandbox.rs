use async_trait::async_trait;

use crate::{error::Result, types::FileTree};

/// Execution environment that can host a copy of the project tree
///
/// The sandbox itself (an in-browser container runtime or similar) lives
/// outside this crate. It reports a running server by sending
/// [`SessionEvent::ServerReady`](crate::project::SessionEvent::ServerReady)
/// to the session.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Write `tree` into the sandbox filesystem, replacing what was there
    async fn mount(&self, tree: &FileTree) -> Result<()>;

    /// Get a human-readable identifier for this sandbox (for logging/debugging)
    fn identifier(&self) -> String;
}

/// Sandbox that discards every mount
pub struct NoSandbox;

#[async_trait]
impl Sandbox for NoSandbox {
    async fn mount(&self, _tree: &FileTree) -> Result<()> {
        Ok(())
    }

    fn identifier(&self) -> String {
        "none".to_string()
    }
}
