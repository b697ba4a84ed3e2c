use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::{Result, WorkspaceError};
use crate::types::FileTree;

/// Topic carrying full tree snapshots
pub const PROJECT_CODE: &str = "project-code";

/// Topic carrying chat messages, including AI replies
pub const PROJECT_MESSAGE: &str = "project-message";

/// Sender tag used by the AI assistant on the chat topic
pub const AI_SENDER: &str = "AI";

/// One message as carried by the project channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Topic name, e.g. [`PROJECT_CODE`]
    pub event: String,
    /// Identifier of the publishing client
    pub origin: String,
    pub payload: Value,
}

/// Payload of the chat topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: String,
    pub message: String,
}

impl ChatMessage {
    pub fn new(sender: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            message: message.into(),
        }
    }

    pub fn is_from_ai(&self) -> bool {
        self.sender == AI_SENDER
    }

    /// Decode the structured body of an AI message
    pub fn ai_reply(&self) -> Result<AiReply> {
        serde_json::from_str(&self.message).map_err(|e| WorkspaceError::MalformedSnapshot {
            message: format!("unreadable AI message: {}", e),
        })
    }
}

/// Body of a message sent by the AI assistant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiReply {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub file_tree: Option<FileTree>,
}

/// Pub/sub transport scoped to one project
///
/// Implementors wrap a concrete transport (a websocket, an in-process
/// hub, ...). Subscribers see messages from every client, including their
/// own; consumers skip envelopes whose `origin` matches [`Channel::origin`].
#[async_trait]
pub trait Channel: Send + Sync {
    /// Send `payload` on `event` to everyone in the project
    async fn publish(&self, event: &str, payload: Value) -> Result<()>;

    /// Receive every message published on this project's channel
    fn subscribe(&self) -> broadcast::Receiver<Envelope>;

    /// Identifier stamped on envelopes published through this handle
    fn origin(&self) -> &str;
}

/// In-process broadcast hub
///
/// Each [`LocalHub::connect`] call yields a client handle; all handles share
/// one broadcast queue.
#[derive(Clone)]
pub struct LocalHub {
    sender: broadcast::Sender<Envelope>,
}

impl LocalHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn connect(&self, origin: impl Into<String>) -> LocalChannel {
        LocalChannel {
            origin: origin.into(),
            sender: self.sender.clone(),
        }
    }
}

impl Default for LocalHub {
    fn default() -> Self {
        Self::new(64)
    }
}

/// One client's handle onto a [`LocalHub`]
#[derive(Clone)]
pub struct LocalChannel {
    origin: String,
    sender: broadcast::Sender<Envelope>,
}

#[async_trait]
impl Channel for LocalChannel {
    async fn publish(&self, event: &str, payload: Value) -> Result<()> {
        let envelope = Envelope {
            event: event.to_string(),
            origin: self.origin.clone(),
            payload,
        };
        // no subscribers is not an error for a broadcast
        if self.sender.send(envelope).is_err() {
            debug!(event, origin = %self.origin, "published with no subscribers");
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.sender.subscribe()
    }

    fn origin(&self) -> &str {
        &self.origin
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FileNode;

    #[tokio::test]
    async fn test_local_hub_fan_out() {
        let hub = LocalHub::new(8);
        let alice = hub.connect("alice");
        let bob = hub.connect("bob");
        let mut bob_rx = bob.subscribe();

        alice
            .publish(PROJECT_MESSAGE, serde_json::json!({"sender": "alice", "message": "hi"}))
            .await
            .unwrap();

        let envelope = bob_rx.recv().await.unwrap();
        assert_eq!(envelope.event, PROJECT_MESSAGE);
        assert_eq!(envelope.origin, "alice");

        let chat: ChatMessage = serde_json::from_value(envelope.payload).unwrap();
        assert_eq!(chat, ChatMessage::new("alice", "hi"));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let hub = LocalHub::default();
        let lonely = hub.connect("solo");
        assert!(lonely.publish(PROJECT_CODE, Value::Null).await.is_ok());
    }

    #[test]
    fn test_ai_reply_decoding() {
        let body = serde_json::json!({
            "text": "Created a server",
            "fileTree": { "app.js": { "file": { "contents": "listen()" } } }
        });
        let chat = ChatMessage::new(AI_SENDER, body.to_string());

        assert!(chat.is_from_ai());
        let reply = chat.ai_reply().unwrap();
        assert_eq!(reply.text.as_deref(), Some("Created a server"));
        assert_eq!(
            reply.file_tree.unwrap().get("app.js"),
            Some(&FileNode::file("listen()", None))
        );

        let plain = ChatMessage::new(AI_SENDER, "not json");
        assert!(matches!(
            plain.ai_reply(),
            Err(WorkspaceError::MalformedSnapshot { .. })
        ));
    }
}
