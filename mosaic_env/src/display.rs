//! Client-only display transport abstraction.

use crate::error::EnvError;
use crate::types::{BlockFace, BlockPos, BlockState, ViewerId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Abstraction for the per-viewer display channel.
///
/// Every update sent through this channel is seen by exactly one viewer's
/// client and never touches persistent world state.
///
/// # Implementations
///
/// - **Production**: `ChannelDisplay` - encodes and enqueues onto the
///   connection's outbound queue
/// - **Simulation**: `SimHost` - applies updates to a recorded client view
///
/// # Blocking
/// Implementations must not block: these calls run on the tick thread and
/// on the network-receive thread. Success means "queued", not "delivered".
pub trait DisplayChannel: Send + Sync + 'static {
    /// Replaces the client's view of a single block.
    fn send_block_change(&self, viewer: ViewerId, pos: BlockPos, state: &BlockState) -> Result<(), EnvError>;

    /// Turns a single block into a textured display surface looking
    /// towards `facing`.
    fn send_surface(&self, viewer: ViewerId, pos: BlockPos, facing: BlockFace, texture: &str) -> Result<(), EnvError>;

    /// Acknowledges a client action sequence number.
    ///
    /// Clients stop accepting block updates until their pending
    /// sequence numbers are acknowledged, so this is sent even for
    /// vetoed actions.
    fn acknowledge(&self, viewer: ViewerId, sequence: i32) -> Result<(), EnvError>;
}

/// Converts host block states into wire ids.
pub trait BlockEncoder: Send + Sync + 'static {
    fn encode(&self, state: &BlockState) -> Result<u32, EnvError>;
}

/// A `BlockEncoder` backed by a fixed name -> id palette.
#[derive(Debug, Clone, Default)]
pub struct PaletteEncoder {
    palette: HashMap<String, u32>,
}

impl PaletteEncoder {
    pub fn new(palette: HashMap<String, u32>) -> Self {
        Self { palette }
    }

    /// Registers (or replaces) a palette entry.
    pub fn with(mut self, state: impl Into<String>, id: u32) -> Self {
        self.palette.insert(state.into(), id);
        self
    }

    pub fn len(&self) -> usize {
        self.palette.len()
    }

    pub fn is_empty(&self) -> bool {
        self.palette.is_empty()
    }
}

impl BlockEncoder for PaletteEncoder {
    fn encode(&self, state: &BlockState) -> Result<u32, EnvError> {
        self.palette
            .get(state.as_str())
            .copied()
            .ok_or_else(|| EnvError::adaptation(format!("no wire id for {}", state)))
    }
}

/// One encoded update on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisplayUpdate {
    BlockChange { pos: BlockPos, state_id: u32 },
    SurfaceData { pos: BlockPos, texture: String },
    Ack { sequence: i32 },
}

/// Production display channel: encodes updates and pushes them onto an
/// unbounded outbound queue drained by the connection writer task.
pub struct ChannelDisplay<E: BlockEncoder> {
    encoder: E,

    /// Base state name for display surfaces; the facing is appended as
    /// a `[facing=...]` property.
    surface_state: String,

    tx: mpsc::UnboundedSender<(ViewerId, DisplayUpdate)>,
}

impl<E: BlockEncoder> ChannelDisplay<E> {
    /// Creates a display channel and the receiving end of its queue.
    pub fn new(
        encoder: E,
        surface_state: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<(ViewerId, DisplayUpdate)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let display = Self {
            encoder,
            surface_state: surface_state.into(),
            tx,
        };
        (display, rx)
    }

    /// The block state sent underneath a surface looking towards `facing`.
    pub fn surface_block(&self, facing: BlockFace) -> BlockState {
        let facing = match facing {
            BlockFace::North => "north",
            BlockFace::South => "south",
            BlockFace::East => "east",
            BlockFace::West => "west",
            BlockFace::Up => "up",
            BlockFace::Down => "down",
        };
        BlockState::new(format!("{}[facing={}]", self.surface_state, facing))
    }

    fn push(&self, viewer: ViewerId, update: DisplayUpdate) -> Result<(), EnvError> {
        self.tx
            .send((viewer, update))
            .map_err(|_| EnvError::network("Display queue closed"))
    }
}

impl<E: BlockEncoder> DisplayChannel for ChannelDisplay<E> {
    fn send_block_change(&self, viewer: ViewerId, pos: BlockPos, state: &BlockState) -> Result<(), EnvError> {
        let state_id = self.encoder.encode(state)?;
        self.push(viewer, DisplayUpdate::BlockChange { pos, state_id })
    }

    fn send_surface(&self, viewer: ViewerId, pos: BlockPos, facing: BlockFace, texture: &str) -> Result<(), EnvError> {
        // Encode before pushing anything so a failed adaptation leaves the
        // queue untouched.
        let state_id = self.encoder.encode(&self.surface_block(facing))?;
        self.push(viewer, DisplayUpdate::BlockChange { pos, state_id })?;
        self.push(
            viewer,
            DisplayUpdate::SurfaceData {
                pos,
                texture: texture.to_string(),
            },
        )
    }

    fn acknowledge(&self, viewer: ViewerId, sequence: i32) -> Result<(), EnvError> {
        self.push(viewer, DisplayUpdate::Ack { sequence })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn palette() -> PaletteEncoder {
        PaletteEncoder::default()
            .with(BlockState::AIR, 0)
            .with("minecraft:coal_block", 7)
            .with("minecraft:player_wall_head[facing=south]", 42)
    }

    #[test]
    fn test_palette_unknown_state_is_adaptation_error() {
        let err = palette().encode(&BlockState::new("minecraft:bedrock")).unwrap_err();
        assert!(err.is_adaptation());
    }

    #[tokio::test]
    async fn test_channel_display_encodes_and_queues() {
        let (display, mut rx) = ChannelDisplay::new(palette(), "minecraft:player_wall_head");
        let viewer = ViewerId::from_seed(1);
        let pos = BlockPos::new(1, 2, 3);

        display.send_block_change(viewer, pos, &BlockState::new("minecraft:coal_block")).unwrap();
        display.send_surface(viewer, pos, BlockFace::South, "abc").unwrap();
        display.acknowledge(viewer, 9).unwrap();

        assert_eq!(rx.recv().await, Some((viewer, DisplayUpdate::BlockChange { pos, state_id: 7 })));
        assert_eq!(rx.recv().await, Some((viewer, DisplayUpdate::BlockChange { pos, state_id: 42 })));
        assert_eq!(
            rx.recv().await,
            Some((viewer, DisplayUpdate::SurfaceData { pos, texture: "abc".to_string() }))
        );
        assert_eq!(rx.recv().await, Some((viewer, DisplayUpdate::Ack { sequence: 9 })));
    }

    #[test]
    fn test_failed_surface_adaptation_queues_nothing() {
        let (display, mut rx) = ChannelDisplay::new(palette(), "minecraft:player_wall_head");
        let result = display.send_surface(ViewerId::from_seed(1), BlockPos::new(0, 0, 0), BlockFace::North, "abc");

        assert!(result.unwrap_err().is_adaptation());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_queue_is_network_error() {
        let (display, rx) = ChannelDisplay::new(palette(), "minecraft:player_wall_head");
        drop(rx);
        let result = display.acknowledge(ViewerId::from_seed(1), 1);
        assert!(matches!(result, Err(EnvError::NetworkError(_))));
    }
}
