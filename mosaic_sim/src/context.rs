//! Virtual clock and seeded randomness for deterministic runs.

use async_trait::async_trait;
use mosaic_env::MosaicContext;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// `MosaicContext` whose clock only moves when the harness (or a sleeping
/// task) moves it. Clones share the clock and the RNG stream.
#[derive(Clone)]
pub struct SimContext {
    seed: u64,
    clock: Arc<Mutex<Duration>>,
    rng: Arc<Mutex<ChaCha8Rng>>,
}

impl SimContext {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            clock: Arc::new(Mutex::new(Duration::ZERO)),
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
        }
    }

    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn advance_time(&self, by: Duration) {
        *self.clock.lock().unwrap() += by;
    }

    /// Next value of the shared stream. Only draw from it on one thread,
    /// or the order of draws stops being reproducible.
    pub fn next_u64(&self) -> u64 {
        self.rng.lock().unwrap().next_u64()
    }

    /// Independent stream for one actor, derived from the master seed.
    pub fn rng_for(&self, stream: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.seed.wrapping_mul(0x517cc1b727220a95) ^ stream)
    }
}

#[async_trait]
impl MosaicContext for SimContext {
    fn now(&self) -> Duration {
        *self.clock.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.advance_time(duration);
        // Let the rest of the simulation observe the new time
        tokio::task::yield_now().await;
    }

    fn spawn<F>(&self, name: &str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        tracing::trace!(task = name, at = ?self.now(), "Spawning simulated task");
        tokio::spawn(future);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_clock_only_moves_when_advanced() {
        let ctx = SimContext::new(42);
        assert_eq!(ctx.now(), Duration::ZERO);

        ctx.advance_time(Duration::from_secs(1));
        ctx.advance_time(Duration::from_millis(500));
        assert_eq!(ctx.now(), Duration::from_millis(1500));
        assert_eq!(ctx.since(Duration::from_secs(1)), Duration::from_millis(500));
    }

    #[test]
    fn test_streams_are_reproducible() {
        let (a, b) = (SimContext::new(42), SimContext::new(42));

        assert_eq!(a.rng_for(1).gen::<u64>(), b.rng_for(1).gen::<u64>());
        assert_ne!(a.rng_for(1).gen::<u64>(), a.rng_for(2).gen::<u64>());
        assert_eq!(a.next_u64(), b.next_u64());
        assert_eq!(a.seed(), 42);
    }

    #[test]
    fn test_clones_share_the_clock() {
        let ctx = SimContext::new(42);
        let other = ctx.clone();

        ctx.advance_time(Duration::from_secs(5));
        assert_eq!(other.now(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_sleep_advances_virtual_time() {
        let ctx = SimContext::new(7);
        ctx.sleep(Duration::from_millis(2000)).await;
        assert_eq!(ctx.now(), Duration::from_secs(2));
    }
}
