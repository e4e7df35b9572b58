//! Outbound side of the interception boundary: fire-and-forget display
//! updates for a single viewer.
//!
//! Nothing here reports failure to the caller. Overlay content only ever
//! exists on one client, so a failed update is logged and, where the
//! content could not be adapted, degraded to an empty cell.

use mosaic_env::{BlockFace, BlockPos, BlockState, CatalogItem, DisplayChannel, ViewerId, WorldId, WorldView};
use std::sync::Arc;
use tracing::{error, warn};

/// What a painted cell shows, kept so it can be re-sent verbatim when the
/// client predicts a change to it.
#[derive(Debug, Clone, PartialEq)]
pub enum RestoreAction {
    Block(BlockState),
    Surface { facing: BlockFace, item: Arc<CatalogItem> },
}

/// Sends display updates to viewers and reads live content back.
#[derive(Clone)]
pub struct Painter {
    display: Arc<dyn DisplayChannel>,
    world: Arc<dyn WorldView>,
}

impl Painter {
    pub fn new(display: Arc<dyn DisplayChannel>, world: Arc<dyn WorldView>) -> Self {
        Self { display, world }
    }

    pub fn world(&self) -> &dyn WorldView {
        self.world.as_ref()
    }

    /// Shows `content` at `pos` to `viewer` only.
    pub fn paint_cell(&self, viewer: ViewerId, pos: BlockPos, content: &BlockState) {
        match self.display.send_block_change(viewer, pos, content) {
            Ok(()) => {}
            Err(e) if e.is_adaptation() && !content.is_air() => {
                warn!(%viewer, %pos, %content, error = %e, "Could not adapt block; falling back to air");
                if let Err(e) = self.display.send_block_change(viewer, pos, &BlockState::air()) {
                    error!(%viewer, %pos, error = %e, "Failed to send fallback block change");
                }
            }
            Err(e) => error!(%viewer, %pos, error = %e, "Failed to send fake block change"),
        }
    }

    /// Shows `texture` as a display surface at `pos`, looking towards `facing`.
    pub fn paint_cell_as_display_surface(&self, viewer: ViewerId, facing: BlockFace, pos: BlockPos, texture: &str) {
        match self.display.send_surface(viewer, pos, facing, texture) {
            Ok(()) => {}
            Err(e) if e.is_adaptation() => {
                warn!(%viewer, %pos, error = %e, "Could not adapt display surface; clearing cell");
                self.paint_cell(viewer, pos, &BlockState::air());
            }
            Err(e) => error!(%viewer, %pos, error = %e, "Failed to update fake block to display surface"),
        }
    }

    /// Re-sends the real, live content of a cell.
    pub fn resync_cell(&self, viewer: ViewerId, world: WorldId, pos: BlockPos) {
        let live = self.world.block_at(world, pos);
        self.paint_cell(viewer, pos, &live);
    }

    /// Executes a stored restore action.
    pub fn replay(&self, viewer: ViewerId, pos: BlockPos, action: &RestoreAction) {
        match action {
            RestoreAction::Block(state) => self.paint_cell(viewer, pos, state),
            RestoreAction::Surface { facing, item } => {
                self.paint_cell_as_display_surface(viewer, *facing, pos, &item.texture)
            }
        }
    }

    /// Acknowledges a client action sequence. Failures are logged only.
    pub fn acknowledge(&self, viewer: ViewerId, sequence: i32) {
        if let Err(e) = self.display.acknowledge(viewer, sequence) {
            error!(%viewer, sequence, error = %e, "Failed to acknowledge client action");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingHost, Sent};

    #[test]
    fn test_unadaptable_block_degrades_to_air() {
        let host = RecordingHost::new();
        host.reject_state("minecraft:bogus");
        let painter = host.painter();
        let viewer = ViewerId::from_seed(1);
        let pos = BlockPos::new(1, 1, 1);

        painter.paint_cell(viewer, pos, &BlockState::new("minecraft:bogus"));

        assert_eq!(host.sent(), vec![Sent::Block(viewer, pos, BlockState::air())]);
    }

    #[test]
    fn test_unadaptable_surface_degrades_to_air() {
        let host = RecordingHost::new();
        host.reject_surfaces();
        let painter = host.painter();
        let viewer = ViewerId::from_seed(1);
        let pos = BlockPos::new(0, 5, 0);

        painter.paint_cell_as_display_surface(viewer, BlockFace::North, pos, "tex");

        assert_eq!(host.sent(), vec![Sent::Block(viewer, pos, BlockState::air())]);
    }

    #[test]
    fn test_transport_failure_is_swallowed() {
        let host = RecordingHost::new();
        host.disconnect();
        let painter = host.painter();

        painter.paint_cell(ViewerId::from_seed(1), BlockPos::new(0, 0, 0), &BlockState::air());
        painter.acknowledge(ViewerId::from_seed(1), 3);

        assert!(host.sent().is_empty());
    }

    #[test]
    fn test_resync_reads_live_world() {
        let host = RecordingHost::new();
        let pos = BlockPos::new(4, 64, 4);
        host.set_block(pos, BlockState::new("minecraft:grass_block"));
        let viewer = ViewerId::from_seed(2);

        host.painter().resync_cell(viewer, RecordingHost::WORLD, pos);

        assert_eq!(host.sent(), vec![Sent::Block(viewer, pos, BlockState::new("minecraft:grass_block"))]);
    }
}
