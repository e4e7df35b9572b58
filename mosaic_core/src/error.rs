//! Error types for the overlay engine.

use mosaic_env::Category;
use thiserror::Error;

/// Failures of a single session operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Session already closed")]
    Closed,

    #[error("Already at the first page")]
    AtFirstPage,

    #[error("Already at the last page ({0})")]
    AtLastPage(usize),
}

/// Reasons a wall request is refused. All of them leave state untouched
/// and are reported back to the requester verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("This command is only available to viewers")]
    NotAViewer,

    #[error("You have no permission to use this command.")]
    MissingPermission,

    #[error("Usage: /{label} <{choices}>")]
    Usage { label: String, choices: String },

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("The category {0} does not hold any items.")]
    EmptyCategory(Category),

    #[error("You're already in an active wall session!")]
    AlreadyActive,

    #[error("Viewer is not connected")]
    ViewerOffline,

    #[error("Walls are shutting down; try again later.")]
    ShuttingDown,
}

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
