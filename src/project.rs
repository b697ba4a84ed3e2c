//! The per-project controller.
//!
//! A [`ProjectSession`] exclusively owns the tree and the editor session.
//! Every input (user gestures, channel messages, debounce timers, sandbox
//! notifications) is handled to completion, one at a time, on whichever
//! task drives the session. Collaborators only ever see copies of the tree,
//! sent through the [`Propagator`].

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    backend::Backend,
    channel::{ChatMessage, Channel, Envelope},
    config::SessionConfig,
    debounce::Debouncer,
    error::{Result, WorkspaceError},
    explorer::{EditKind, Explorer, Outcome, PendingEdit, Workspace},
    language::language_for,
    path::TreePath,
    propagation::{decode, Inbound, Propagator},
    sandbox::Sandbox,
    session::EditorSession,
    store::TreeOp,
    types::{FileContent, FileNode, FileTree, NodeKind},
};

/// Inputs delivered to a session from outside the user's gestures
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A message from another client on the project channel
    Remote(Envelope),
    /// A content-edit debounce timer ran out
    DebounceElapsed { ticket: u64 },
    /// The sandbox started serving the project at `url`
    ServerReady { url: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Incoming,
    Outgoing,
}

/// A chat line as kept in the session log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEntry {
    pub sender: String,
    pub message: String,
    pub direction: Direction,
}

/// One user's editing session on one project
pub struct ProjectSession {
    config: SessionConfig,
    workspace: Workspace,
    explorer: Explorer,
    propagator: Propagator,
    sandbox: Arc<dyn Sandbox>,
    debouncer: Debouncer,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    listener: Option<JoinHandle<()>>,
    in_flight: Vec<JoinHandle<()>>,
    messages: Vec<ChatEntry>,
    preview_url: Option<String>,
}

impl ProjectSession {
    /// Create a session and start listening on `channel`
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        config: SessionConfig,
        channel: Arc<dyn Channel>,
        backend: Arc<dyn Backend>,
        sandbox: Arc<dyn Sandbox>,
    ) -> Result<Self> {
        config.validate()?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let listener = spawn_listener(channel.as_ref(), events_tx.clone());
        let propagator = Propagator::new(config.project_id.clone(), channel, backend);
        let debouncer = Debouncer::new(config.debounce(), events_tx.clone());

        info!(project = %config.project_id, user = %config.user, "session started");
        Ok(Self {
            config,
            workspace: Workspace::default(),
            explorer: Explorer::new(),
            propagator,
            sandbox,
            debouncer,
            events_tx,
            events_rx,
            listener: Some(listener),
            in_flight: Vec::new(),
            messages: Vec::new(),
            preview_url: None,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn tree(&self) -> &FileTree {
        &self.workspace.tree
    }

    pub fn editor(&self) -> &EditorSession {
        &self.workspace.session
    }

    pub fn pending_edit(&self) -> Option<&PendingEdit> {
        self.explorer.pending()
    }

    pub fn messages(&self) -> &[ChatEntry] {
        &self.messages
    }

    pub fn preview_url(&self) -> Option<&str> {
        self.preview_url.as_deref()
    }

    /// Sender for events raised outside the session (e.g. by a sandbox)
    pub fn events(&self) -> mpsc::UnboundedSender<SessionEvent> {
        self.events_tx.clone()
    }

    /// Hydrate the tree from the backend of record
    pub async fn load(&mut self) -> Result<()> {
        let project = self
            .propagator
            .backend()
            .fetch_project(&self.config.project_id)
            .await?;
        project.file_tree.validate()?;

        self.debouncer.discard();
        self.explorer.abandon();
        self.workspace.session.reset();
        self.workspace.replace_tree(project.file_tree);
        info!(
            project = %self.config.project_id,
            digest = %self.workspace.tree.digest(),
            "project loaded"
        );
        Ok(())
    }

    /// Open a file tab and make it current
    pub fn open_file(&mut self, path: &TreePath) -> Result<()> {
        if self.debouncer.pending_path() != Some(path) {
            self.flush_pending_edit();
        }
        self.workspace.session.open(&self.workspace.tree, path)
    }

    /// Close a file tab; returns false if it was not open
    pub fn close_file(&mut self, path: &TreePath) -> bool {
        self.flush_pending_edit();
        self.workspace.session.close(path)
    }

    pub fn toggle_folder(&mut self, path: &TreePath) -> Result<bool> {
        if !self.workspace.tree.is_directory(path) {
            return Err(WorkspaceError::not_found(path));
        }
        Ok(self.workspace.session.toggle(path))
    }

    /// Insert a placeholder item and start naming it
    pub fn begin_create(&mut self, location: &TreePath, kind: NodeKind) -> Result<TreePath> {
        self.flush_pending_edit();
        let result = self
            .explorer
            .begin_create(&mut self.workspace, location, kind);
        self.report(result)
    }

    pub fn begin_rename(&mut self, path: &TreePath) -> Result<()> {
        let result = self.explorer.begin_rename(&mut self.workspace, path);
        self.report(result)
    }

    /// Confirm the pending create/rename with the typed name
    pub fn commit_edit(&mut self, input: &str) -> Result<Outcome> {
        let result = self.explorer.commit(&mut self.workspace, input);
        self.settle_structural(result)
    }

    /// Abandon the pending create/rename
    pub fn cancel_edit(&mut self) -> bool {
        self.explorer.cancel(&mut self.workspace)
    }

    /// Drag-and-drop `source` onto `target`
    pub fn move_item(&mut self, source: &TreePath, target: &TreePath) -> Result<Outcome> {
        let result = self.explorer.move_item(&mut self.workspace, source, target);
        self.settle_structural(result)
    }

    /// Delete an item the user has confirmed deleting
    pub fn delete_item(&mut self, path: &TreePath, confirmed: bool) -> Result<Outcome> {
        let result = self
            .explorer
            .delete_item(&mut self.workspace, path, confirmed);
        self.settle_structural(result)
    }

    /// Apply a keystroke-level edit locally and restart the debounce timer
    pub fn edit_contents(&mut self, path: &TreePath, contents: impl Into<String>) -> Result<()> {
        if self.workspace.tree.file(path).is_none() {
            return Err(WorkspaceError::not_found(path));
        }
        if self.debouncer.pending_path().map_or(false, |pending| pending != path) {
            self.flush_pending_edit();
        }

        let language = path.name().map(|name| language_for(name).to_string());
        let node = FileNode::File(FileContent::new(contents, language));
        self.workspace.tree = self.workspace.tree.apply(path, TreeOp::Update(node))?;
        self.debouncer.schedule(path.clone());
        Ok(())
    }

    /// Publish a chat message to the project
    pub fn send_chat(&mut self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Err(WorkspaceError::invalid_operation("empty message"));
        }
        self.messages.push(ChatEntry {
            sender: self.config.user.clone(),
            message: text.to_string(),
            direction: Direction::Outgoing,
        });
        self.propagator
            .publish_chat(ChatMessage::new(self.config.user.clone(), text));
        Ok(())
    }

    /// Wait for the next event; `None` once every sender is gone
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events_rx.recv().await
    }

    /// Wait for one event and handle it; returns false when events ran dry
    ///
    /// Errors from handling are logged and swallowed so a bad message never
    /// stops the session.
    pub async fn pump(&mut self) -> bool {
        match self.next_event().await {
            Some(event) => {
                if let Err(e) = self.handle_event(event) {
                    warn!(project = %self.config.project_id, error = %e, "event rejected");
                }
                true
            }
            None => false,
        }
    }

    pub fn handle_event(&mut self, event: SessionEvent) -> Result<()> {
        match event {
            SessionEvent::Remote(envelope) => self.handle_remote(&envelope),
            SessionEvent::DebounceElapsed { ticket } => {
                if let Some(path) = self.debouncer.take_elapsed(ticket) {
                    debug!(path = %path, "debounced edit propagated");
                    self.propagate();
                }
                Ok(())
            }
            SessionEvent::ServerReady { url } => {
                info!(url = %url, "sandbox server ready");
                self.preview_url = Some(url);
                Ok(())
            }
        }
    }

    /// Wait for outstanding sandbox mounts and queued broadcast/persist work
    pub async fn settle(&mut self) {
        for handle in self.in_flight.drain(..) {
            let _ = handle.await;
        }
        self.propagator.flush().await;
    }

    /// Flush pending work and reset session state on leaving the project
    pub async fn unload(&mut self) {
        self.explorer.cancel(&mut self.workspace);
        self.flush_pending_edit();
        self.settle().await;
        self.workspace.session.reset();
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        info!(project = %self.config.project_id, "session unloaded");
    }

    fn handle_remote(&mut self, envelope: &Envelope) -> Result<()> {
        let inbound = match decode(envelope) {
            Ok(inbound) => inbound,
            Err(e) => {
                warn!(origin = %envelope.origin, error = %e, "rejected remote message");
                return Err(e);
            }
        };

        match inbound {
            Inbound::Snapshot(tree) => {
                self.replace_tree(tree, &envelope.origin);
                Ok(())
            }
            Inbound::Chat(chat) => self.handle_chat(chat),
            Inbound::Other(event) => {
                debug!(event = %event, "ignored channel event");
                Ok(())
            }
        }
    }

    fn handle_chat(&mut self, chat: ChatMessage) -> Result<()> {
        if chat.sender == self.config.user {
            return Ok(());
        }
        self.messages.push(ChatEntry {
            sender: chat.sender.clone(),
            message: chat.message.clone(),
            direction: Direction::Incoming,
        });
        if !chat.is_from_ai() {
            return Ok(());
        }

        let reply = match chat.ai_reply() {
            Ok(reply) => reply,
            Err(e) => {
                warn!(sender = %chat.sender, error = %e, "AI message has no usable body");
                return Ok(());
            }
        };
        let Some(tree) = reply.file_tree else {
            return Ok(());
        };
        tree.validate()?;
        self.replace_tree(tree, &chat.sender);

        let sandbox = self.sandbox.clone();
        let mounted = self.workspace.tree.clone();
        self.track(tokio::spawn(async move {
            if let Err(e) = sandbox.mount(&mounted).await {
                warn!(sandbox = %sandbox.identifier(), error = %e, "failed to mount tree");
            }
        }));
        self.propagator.persist(&self.workspace.tree);
        Ok(())
    }

    /// Last-write-wins replacement of the whole tree
    fn replace_tree(&mut self, tree: FileTree, source: &str) {
        let digest = tree.digest();
        if digest == self.workspace.tree.digest() {
            debug!(source, digest = %digest, "snapshot matches local tree");
            return;
        }

        if let Some(path) = self.debouncer.pending_path() {
            debug!(path = %path, "pending edit superseded by remote snapshot");
        }
        self.debouncer.discard();
        if let Some(pending) = self.explorer.abandon() {
            debug!(path = %pending.path, "pending name edit dropped by remote snapshot");
        }
        self.workspace.replace_tree(tree);
        info!(source, digest = %digest, "tree replaced");
    }

    fn settle_structural(&mut self, result: Result<Outcome>) -> Result<Outcome> {
        let outcome = self.report(result)?;
        if outcome.is_committed() {
            // the broadcast carries any pending content edit too
            self.debouncer.discard();
            self.propagate();
        }
        Ok(outcome)
    }

    fn report<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            debug!(project = %self.config.project_id, error = %e, "operation refused");
        }
        result
    }

    fn flush_pending_edit(&mut self) {
        if let Some(path) = self.debouncer.flush() {
            debug!(path = %path, "flushing pending edit");
            self.propagate();
        }
    }

    fn propagate(&mut self) {
        self.propagator.propagate(&self.outbound_tree());
    }

    /// The tree as collaborators should see it
    ///
    /// A placeholder whose name is still being typed stays local until the
    /// create is committed.
    fn outbound_tree(&self) -> FileTree {
        match self.explorer.pending() {
            Some(PendingEdit {
                kind: EditKind::Create(_),
                path,
                ..
            }) => self
                .workspace
                .tree
                .apply(path, TreeOp::Delete)
                .unwrap_or_else(|_| self.workspace.tree.clone()),
            _ => self.workspace.tree.clone(),
        }
    }

    fn track(&mut self, handle: JoinHandle<()>) {
        self.in_flight.retain(|handle| !handle.is_finished());
        self.in_flight.push(handle);
    }
}

impl Drop for ProjectSession {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

/// Forward other clients' envelopes into the session's event queue
fn spawn_listener(
    channel: &dyn Channel,
    events: mpsc::UnboundedSender<SessionEvent>,
) -> JoinHandle<()> {
    let mut subscription = channel.subscribe();
    let origin = channel.origin().to_string();

    tokio::spawn(async move {
        loop {
            match subscription.recv().await {
                Ok(envelope) if envelope.origin == origin => continue,
                Ok(envelope) => {
                    if events.send(SessionEvent::Remote(envelope)).is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "channel subscriber lagged; messages dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
