pub mod backend;
pub mod channel;
pub mod config;
pub mod debounce;
pub mod error;
pub mod explorer;
pub mod language;
pub mod logging;
pub mod path;
pub mod project;
pub mod propagation;
pub mod sandbox;
pub mod session;
pub mod store;
pub mod types;

pub use backend::{Backend, HttpBackend, ProjectRecord};
pub use channel::{AiReply, Channel, ChatMessage, Envelope, LocalChannel, LocalHub};
pub use config::SessionConfig;
pub use error::{Result, WorkspaceError};
pub use explorer::{Explorer, Outcome, Workspace};
pub use path::TreePath;
pub use project::{ChatEntry, Direction, ProjectSession, SessionEvent};
pub use propagation::Propagator;
pub use sandbox::{NoSandbox, Sandbox};
pub use session::EditorSession;
pub use store::{Entry, TreeOp};
pub use types::{FileContent, FileNode, FileTree, NodeKind};
