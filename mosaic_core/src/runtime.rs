//! Background tasks driven by the context clock.

use crate::registry::SessionRegistry;
use mosaic_env::MosaicContext;
use std::sync::Arc;
use tracing::{debug, info};

/// Periodically evicts sessions whose viewer wandered off. Returns once
/// the registry has been shut down.
pub async fn run_distance_sweep<Ctx: MosaicContext>(registry: Arc<SessionRegistry<Ctx>>) {
    let period = registry.config().sweep_period();
    info!(period_ms = period.as_millis() as u64, "Distance sweep started");

    loop {
        registry.context().sleep(period).await;
        if registry.is_shut_down() {
            break;
        }
        let evicted = registry.sweep_distance_eviction();
        debug!(evicted, active = registry.len(), "Sweep tick");
    }

    info!("Distance sweep stopped");
}

/// Spawns [`run_distance_sweep`] on the registry's context.
pub fn spawn_distance_sweep<Ctx: MosaicContext>(registry: &Arc<SessionRegistry<Ctx>>) {
    let context = registry.context().clone();
    context.spawn("distance-sweep", run_distance_sweep(registry.clone()));
}
