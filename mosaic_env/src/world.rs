//! Host world readback and viewer-facing side channels.

use crate::types::{BlockPos, BlockState, CatalogItem, Pose, ViewerId, WorldId};

/// Read-only access to the live, authoritative world.
///
/// Used to resynchronise a viewer with the real content of a cell, both
/// for cells outside an overlay and when an overlay is torn down.
pub trait WorldView: Send + Sync + 'static {
    /// The real content of a block right now.
    fn block_at(&self, world: WorldId, pos: BlockPos) -> BlockState;

    /// The viewer's current pose, or `None` if the viewer is not connected.
    fn pose_of(&self, viewer: ViewerId) -> Option<Pose>;
}

/// Inventory and chat side of a viewer.
pub trait ViewerChannel: Send + Sync + 'static {
    /// Sends a chat line to the viewer.
    fn notify(&self, viewer: ViewerId, text: &str);

    /// Puts a copy of the item into the viewer's inventory.
    fn grant(&self, viewer: ViewerId, item: &CatalogItem);

    /// Re-sends the viewer's held item, reverting client-side predictions
    /// (stack size, durability) made for a vetoed action.
    fn resync_held_item(&self, viewer: ViewerId);
}
