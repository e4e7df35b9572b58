//! Error types for the Mosaic environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Transport send failed (queue closed, connection dropped, etc.)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Target viewer is no longer connected
    #[error("Viewer offline: {0}")]
    ViewerOffline(String),

    /// A block state could not be converted into its wire representation
    #[error("Adaptation error: {0}")]
    AdaptationError(String),

    /// No async runtime to run background tasks on
    #[error("Runtime unavailable: {0}")]
    RuntimeUnavailable(String),
}

impl EnvError {
    /// Creates a network error.
    pub fn network(msg: impl Into<String>) -> Self {
        Self::NetworkError(msg.into())
    }

    /// Creates an offline error.
    pub fn offline(viewer: impl std::fmt::Display) -> Self {
        Self::ViewerOffline(viewer.to_string())
    }

    /// Creates an adaptation error.
    pub fn adaptation(msg: impl Into<String>) -> Self {
        Self::AdaptationError(msg.into())
    }

    /// Returns true if this failure happened while converting content,
    /// i.e. before anything reached the transport.
    pub fn is_adaptation(&self) -> bool {
        matches!(self, Self::AdaptationError(_))
    }
}
