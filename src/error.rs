use thiserror::Error;

/// Errors that can occur while editing or synchronizing a project tree
#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("Path not found: {path}")]
    NotFound { path: String },

    #[error("An item named {path} already exists")]
    AlreadyExists { path: String },

    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },

    #[error("Invalid name: {name:?}")]
    InvalidName { name: String },

    #[error("Failed to persist file tree: {message}")]
    Persistence { message: String },

    #[error("Malformed file tree snapshot: {message}")]
    MalformedSnapshot { message: String },

    #[error("Channel error: {message}")]
    Channel { message: String },

    #[error("Sandbox error: {message}")]
    Sandbox { message: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkspaceError {
    pub(crate) fn not_found(path: impl ToString) -> Self {
        WorkspaceError::NotFound {
            path: path.to_string(),
        }
    }

    pub(crate) fn already_exists(path: impl ToString) -> Self {
        WorkspaceError::AlreadyExists {
            path: path.to_string(),
        }
    }

    pub(crate) fn invalid_operation(message: impl Into<String>) -> Self {
        WorkspaceError::InvalidOperation {
            message: message.into(),
        }
    }

    /// Whether the error should be shown to the user as a blocking alert
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            WorkspaceError::NotFound { .. }
                | WorkspaceError::AlreadyExists { .. }
                | WorkspaceError::InvalidOperation { .. }
                | WorkspaceError::InvalidName { .. }
        )
    }
}

/// Result type alias for workspace operations
pub type Result<T> = std::result::Result<T, WorkspaceError>;
