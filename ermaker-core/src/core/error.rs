//! Error types for the ERMaker core library.

use thiserror::Error;

/// All errors that can occur within the ERMaker core library.
#[derive(Debug, Error)]
pub enum ErMakerError {
    /// A required field was missing or structurally invalid.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// A workspace node ID was requested that does not exist in the tree.
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// The requested parent does not resolve to a folder node.
    #[error("Invalid parent: {0}")]
    InvalidParent(String),

    /// A move operation would create a cycle or is otherwise invalid.
    #[error("Invalid move: {0}")]
    InvalidMove(String),

    /// A sibling with the same name already exists under the target parent.
    #[error("Name already exists: {0}")]
    NameExists(String),

    /// An editor tab ID was requested that is not open.
    #[error("Tab not found: {0}")]
    TabNotFound(String),

    /// A connection profile ID was requested that is not registered.
    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),

    /// A filesystem gateway call failed.
    #[error("Failed to {op} '{path}': {message}")]
    Gateway {
        /// Short verb describing the attempted operation (e.g. `"rename"`).
        op: &'static str,
        /// Path the operation targeted.
        path: String,
        /// Message reported by the gateway.
        message: String,
    },

    /// An I/O operation on the local filesystem failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An external collaborator (query, introspection, diagram, server) failed.
    #[error("Remote error: {0}")]
    Remote(String),

    /// A late asynchronous result arrived for a target that no longer exists.
    #[error("Stale response: {0}")]
    StaleResponse(String),

    /// Persisted data could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias that pins the error type to [`ErMakerError`].
pub type Result<T> = std::result::Result<T, ErMakerError>;

impl ErMakerError {
    /// Builds a [`ErMakerError::Gateway`] from an operation verb, its target
    /// path and the underlying failure.
    pub fn gateway(op: &'static str, path: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Gateway {
            op,
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Returns `true` for failures that leave the caller free to retry the
    /// same action (disk or remote failures), as opposed to structural or
    /// validation errors that need different input.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Gateway { .. } | Self::Io(_) | Self::Remote(_))
    }

    /// Returns a short, human-readable message suitable for display to the end user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::ValidationFailed(msg) => msg.clone(),
            Self::NodeNotFound(_) => "File no longer exists in the project".to_string(),
            Self::InvalidParent(_) => "Items can only be created inside a folder".to_string(),
            Self::InvalidMove(msg) => msg.clone(),
            Self::NameExists(name) => format!("An item named '{name}' already exists here"),
            Self::TabNotFound(_) => "Tab is no longer open".to_string(),
            Self::ConnectionNotFound(_) => "Connection no longer exists".to_string(),
            Self::Gateway { op, path, message } => format!("Failed to {op} {path}: {message}"),
            Self::Io(e) => format!("File error: {e}"),
            Self::Remote(msg) => msg.clone(),
            Self::StaleResponse(_) => "Result discarded because its tab or connection changed".to_string(),
            Self::Json(e) => format!("Data format error: {e}"),
        }
    }
}
