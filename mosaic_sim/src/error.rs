//! Simulation errors.

use mosaic_core::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    /// A checked property did not hold
    #[error("Invariant violated: {0}")]
    Invariant(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}

impl SimError {
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }
}

/// Fails with an invariant violation unless `cond` holds.
pub(crate) fn ensure(cond: bool, msg: impl FnOnce() -> String) -> Result<(), SimError> {
    if cond {
        Ok(())
    } else {
        Err(SimError::Invariant(msg()))
    }
}
