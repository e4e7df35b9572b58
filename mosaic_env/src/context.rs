//! The clock and task scheduler seen by the overlay engine.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// Time source and background-task spawner.
///
/// The registry reads `now()` to debounce interactions and the distance
/// sweep sleeps on it between passes. `TokioContext` backs it with the
/// monotonic clock; the simulation harness swaps in a virtual clock that
/// only moves when told to.
#[async_trait]
pub trait MosaicContext: Send + Sync + 'static {
    /// Monotonic time since the context was created.
    fn now(&self) -> Duration;

    /// Waits `duration` on this context's clock.
    async fn sleep(&self, duration: Duration);

    /// Runs `future` in the background. `name` identifies the task in logs.
    fn spawn<F>(&self, name: &str, future: F)
    where
        F: Future<Output = ()> + Send + 'static;

    /// Time elapsed since an earlier `now()` reading, zero if the reading
    /// lies in the future.
    fn since(&self, earlier: Duration) -> Duration {
        self.now().saturating_sub(earlier)
    }
}
