//! Error types for pulseboard

use thiserror::Error;

/// Main error type for pulseboard operations
#[derive(Error, Debug)]
pub enum PulseboardError {
    #[error("workspace not found: {path}")]
    WorkspaceNotFound { path: String },

    #[error("workspace path must be absolute: {path}")]
    WorkspaceNotAbsolute { path: String },

    #[error("{resource} handle is closed")]
    ResourceClosed { resource: &'static str },

    #[error("search index unavailable: {message}")]
    IndexUnavailable { message: String },

    #[error("search failed: {message}")]
    Search { message: String },

    #[error("knowledge store error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for pulseboard operations
pub type Result<T> = std::result::Result<T, PulseboardError>;
