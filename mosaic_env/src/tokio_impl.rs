//! `MosaicContext` on a tokio runtime.

use crate::error::EnvError;
use crate::MosaicContext;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;

/// Production context.
///
/// Holds a runtime handle instead of relying on `tokio::spawn`, so tasks
/// can be started from the host's tick thread, which is not a runtime
/// worker.
pub struct TokioContext {
    start: Instant,
    handle: Handle,
}

impl TokioContext {
    /// Binds to the runtime the caller is running on.
    pub fn new() -> Result<Self, EnvError> {
        let handle = Handle::try_current().map_err(|e| EnvError::RuntimeUnavailable(e.to_string()))?;
        Ok(Self::with_handle(handle))
    }

    /// Binds to an explicit runtime.
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            start: Instant::now(),
            handle,
        }
    }

    pub fn shared(handle: Handle) -> Arc<Self> {
        Arc::new(Self::with_handle(handle))
    }
}

#[async_trait]
impl MosaicContext for TokioContext {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn spawn<F>(&self, _name: &str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.handle.spawn(future);
    }
}
