//! Fan-out of tree snapshots to collaborators and the backend, and decoding
//! of whatever arrives on the project channel.
//!
//! Outbound work is queued to a single worker task so snapshots reach the
//! channel and the backend in the order they were produced. Failures are
//! logged and nothing is retried or rolled back. Inbound snapshots replace
//! the local tree wholesale; the last one to arrive wins.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::{
    backend::Backend,
    channel::{ChatMessage, Channel, Envelope, PROJECT_CODE, PROJECT_MESSAGE},
    error::{Result, WorkspaceError},
    types::FileTree,
};

/// A decoded channel message
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A full tree that replaces the local one
    Snapshot(FileTree),
    Chat(ChatMessage),
    /// An event this crate does not handle
    Other(String),
}

/// Decode an envelope, validating tree snapshots
pub fn decode(envelope: &Envelope) -> Result<Inbound> {
    match envelope.event.as_str() {
        PROJECT_CODE => {
            let tree: FileTree = serde_json::from_value(envelope.payload.clone()).map_err(|e| {
                WorkspaceError::MalformedSnapshot {
                    message: e.to_string(),
                }
            })?;
            tree.validate()?;
            Ok(Inbound::Snapshot(tree))
        }
        PROJECT_MESSAGE => {
            let chat: ChatMessage =
                serde_json::from_value(envelope.payload.clone()).map_err(|e| {
                    WorkspaceError::Channel {
                        message: format!("unreadable chat message: {}", e),
                    }
                })?;
            Ok(Inbound::Chat(chat))
        }
        other => Ok(Inbound::Other(other.to_string())),
    }
}

enum Outbound {
    Tree { tree: FileTree, broadcast: bool },
    Chat(ChatMessage),
    Flush(oneshot::Sender<()>),
}

/// Sends trees and chat messages out of a session
///
/// Must be created from within a tokio runtime. The worker stops once every
/// clone of the propagator is dropped and the queue has drained.
#[derive(Clone)]
pub struct Propagator {
    project_id: String,
    channel: Arc<dyn Channel>,
    backend: Arc<dyn Backend>,
    queue: mpsc::UnboundedSender<Outbound>,
}

impl Propagator {
    pub fn new(
        project_id: impl Into<String>,
        channel: Arc<dyn Channel>,
        backend: Arc<dyn Backend>,
    ) -> Self {
        let project_id = project_id.into();
        let (queue, pending) = mpsc::unbounded_channel();
        let worker = Worker {
            project_id: project_id.clone(),
            channel: channel.clone(),
            backend: backend.clone(),
        };
        tokio::spawn(worker.run(pending));

        Self {
            project_id,
            channel,
            backend,
            queue,
        }
    }

    pub fn channel(&self) -> &Arc<dyn Channel> {
        &self.channel
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Queue `tree` for broadcast to collaborators and for persistence
    pub fn propagate(&self, tree: &FileTree) {
        self.enqueue(Outbound::Tree {
            tree: tree.clone(),
            broadcast: true,
        });
    }

    /// Queue `tree` for persistence without broadcasting it
    pub fn persist(&self, tree: &FileTree) {
        self.enqueue(Outbound::Tree {
            tree: tree.clone(),
            broadcast: false,
        });
    }

    pub fn publish_chat(&self, chat: ChatMessage) {
        self.enqueue(Outbound::Chat(chat));
    }

    /// Wait until everything queued before this call has been sent
    pub async fn flush(&self) {
        let (done, finished) = oneshot::channel();
        self.enqueue(Outbound::Flush(done));
        let _ = finished.await;
    }

    fn enqueue(&self, item: Outbound) {
        if self.queue.send(item).is_err() {
            warn!(project = %self.project_id, "outbound worker stopped; update dropped");
        }
    }
}

struct Worker {
    project_id: String,
    channel: Arc<dyn Channel>,
    backend: Arc<dyn Backend>,
}

impl Worker {
    async fn run(self, mut pending: mpsc::UnboundedReceiver<Outbound>) {
        while let Some(item) = pending.recv().await {
            match item {
                Outbound::Tree {
                    tree,
                    broadcast: true,
                } => {
                    tokio::join!(self.publish_tree(&tree), self.store_tree(&tree));
                }
                Outbound::Tree { tree, .. } => self.store_tree(&tree).await,
                Outbound::Chat(chat) => self.publish_chat(&chat).await,
                Outbound::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
        debug!(project = %self.project_id, "outbound worker finished");
    }

    async fn publish_chat(&self, chat: &ChatMessage) {
        let payload = match serde_json::to_value(chat) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "failed to encode chat message");
                return;
            }
        };
        if let Err(e) = self.channel.publish(PROJECT_MESSAGE, payload).await {
            warn!(project = %self.project_id, error = %e, "failed to send chat message");
        }
    }

    async fn publish_tree(&self, tree: &FileTree) {
        let payload = match serde_json::to_value(tree) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "failed to encode file tree");
                return;
            }
        };
        match self.channel.publish(PROJECT_CODE, payload).await {
            Ok(()) => debug!(project = %self.project_id, digest = %tree.digest(), "tree broadcast"),
            Err(e) => warn!(project = %self.project_id, error = %e, "failed to broadcast file tree"),
        }
    }

    async fn store_tree(&self, tree: &FileTree) {
        match self.backend.update_file_tree(&self.project_id, tree).await {
            Ok(()) => debug!(
                project = %self.project_id,
                backend = %self.backend.identifier(),
                "tree persisted"
            ),
            Err(e) => warn!(
                project = %self.project_id,
                backend = %self.backend.identifier(),
                error = %e,
                "failed to persist file tree"
            ),
        }
    }
}
