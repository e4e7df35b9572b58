//! SimHost - the simulated server world and the clients looking at it.
//!
//! The host keeps the authoritative block map plus, for every viewer, the
//! blocks their client currently believes in. Display updates only ever
//! touch the latter.

use mosaic_env::{
    BlockFace, BlockPos, BlockState, CatalogItem, DisplayChannel, DisplayUpdate, EnvError, Pose, ViewerChannel, ViewerId,
    WorldId, WorldView,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Ground level of the flat simulated terrain.
pub const GROUND_Y: i32 = 64;

/// What a client shows at one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCell {
    Block(BlockState),
    Surface { texture: String },
}

#[derive(Default)]
struct HostState {
    blocks: HashMap<(WorldId, BlockPos), BlockState>,
    poses: HashMap<ViewerId, Pose>,
    client_views: HashMap<ViewerId, HashMap<BlockPos, ClientCell>>,
    acks: HashMap<ViewerId, Vec<i32>>,
    messages: HashMap<ViewerId, Vec<String>>,
    grants: HashMap<ViewerId, Vec<String>>,
    held_resyncs: u64,
    display_updates: u64,
}

#[derive(Default)]
pub struct SimHost {
    state: Mutex<HostState>,
}

fn terrain(pos: BlockPos) -> BlockState {
    if pos.y < GROUND_Y {
        BlockState::new("minecraft:stone")
    } else {
        BlockState::air()
    }
}

impl SimHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap()
    }

    /// Real world change, as made by another player or the server.
    pub fn set_block(&self, world: WorldId, pos: BlockPos, state: BlockState) {
        self.state().blocks.insert((world, pos), state);
    }

    pub fn connect(&self, viewer: ViewerId, pose: Pose) {
        self.state().poses.insert(viewer, pose);
    }

    pub fn move_viewer(&self, viewer: ViewerId, pose: Pose) {
        self.connect(viewer, pose);
    }

    pub fn disconnect(&self, viewer: ViewerId) {
        let mut state = self.state();
        state.poses.remove(&viewer);
        state.client_views.remove(&viewer);
    }

    /// What the viewer's client shows at `pos`.
    pub fn client_cell(&self, viewer: ViewerId, world: WorldId, pos: BlockPos) -> ClientCell {
        let state = self.state();
        match state.client_views.get(&viewer).and_then(|view| view.get(&pos)) {
            Some(cell) => cell.clone(),
            None => ClientCell::Block(Self::lookup(&state, world, pos)),
        }
    }

    /// The client predicts the outcome of an action locally before the
    /// server has seen it.
    pub fn client_predict(&self, viewer: ViewerId, pos: BlockPos, predicted: BlockState) {
        self.state()
            .client_views
            .entry(viewer)
            .or_default()
            .insert(pos, ClientCell::Block(predicted));
    }

    /// Forwards the real content of `pos` to the client, as the server does
    /// after a world change.
    pub fn forward_world_update(&self, viewer: ViewerId, world: WorldId, pos: BlockPos) {
        let mut state = self.state();
        let real = Self::lookup(&state, world, pos);
        state
            .client_views
            .entry(viewer)
            .or_default()
            .insert(pos, ClientCell::Block(real));
    }

    /// Applies an encoded update read off a display queue.
    pub fn apply_wire(&self, viewer: ViewerId, update: DisplayUpdate, palette: &HashMap<u32, BlockState>) {
        let mut state = self.state();
        state.display_updates += 1;
        match update {
            DisplayUpdate::BlockChange { pos, state_id } => {
                let decoded = palette
                    .get(&state_id)
                    .cloned()
                    .unwrap_or_else(|| BlockState::new(format!("unknown:{}", state_id)));
                state
                    .client_views
                    .entry(viewer)
                    .or_default()
                    .insert(pos, ClientCell::Block(decoded));
            }
            DisplayUpdate::SurfaceData { pos, texture } => {
                state
                    .client_views
                    .entry(viewer)
                    .or_default()
                    .insert(pos, ClientCell::Surface { texture });
            }
            DisplayUpdate::Ack { sequence } => state.acks.entry(viewer).or_default().push(sequence),
        }
    }

    /// Cells among `positions` where the client disagrees with the world.
    pub fn mismatches(&self, viewer: ViewerId, world: WorldId, positions: &[BlockPos]) -> Vec<BlockPos> {
        positions
            .iter()
            .copied()
            .filter(|pos| self.client_cell(viewer, world, *pos) != ClientCell::Block(self.block_at(world, *pos)))
            .collect()
    }

    /// Real content of `positions`, in order.
    pub fn snapshot(&self, world: WorldId, positions: &[BlockPos]) -> Vec<BlockState> {
        positions.iter().map(|pos| self.block_at(world, *pos)).collect()
    }

    pub fn acks(&self, viewer: ViewerId) -> Vec<i32> {
        self.state().acks.get(&viewer).cloned().unwrap_or_default()
    }

    pub fn messages(&self, viewer: ViewerId) -> Vec<String> {
        self.state().messages.get(&viewer).cloned().unwrap_or_default()
    }

    pub fn grants(&self, viewer: ViewerId) -> Vec<String> {
        self.state().grants.get(&viewer).cloned().unwrap_or_default()
    }

    pub fn held_resyncs(&self) -> u64 {
        self.state().held_resyncs
    }

    pub fn display_updates(&self) -> u64 {
        self.state().display_updates
    }

    fn lookup(state: &HostState, world: WorldId, pos: BlockPos) -> BlockState {
        state.blocks.get(&(world, pos)).cloned().unwrap_or_else(|| terrain(pos))
    }

    fn paint(&self, viewer: ViewerId, pos: BlockPos, cell: ClientCell) -> Result<(), EnvError> {
        let mut state = self.state();
        if !state.poses.contains_key(&viewer) {
            return Err(EnvError::offline(viewer));
        }
        state.display_updates += 1;
        state.client_views.entry(viewer).or_default().insert(pos, cell);
        Ok(())
    }
}

impl WorldView for SimHost {
    fn block_at(&self, world: WorldId, pos: BlockPos) -> BlockState {
        Self::lookup(&self.state(), world, pos)
    }

    fn pose_of(&self, viewer: ViewerId) -> Option<Pose> {
        self.state().poses.get(&viewer).copied()
    }
}

impl DisplayChannel for SimHost {
    fn send_block_change(&self, viewer: ViewerId, pos: BlockPos, state: &BlockState) -> Result<(), EnvError> {
        self.paint(viewer, pos, ClientCell::Block(state.clone()))
    }

    fn send_surface(&self, viewer: ViewerId, pos: BlockPos, _facing: BlockFace, texture: &str) -> Result<(), EnvError> {
        self.paint(
            viewer,
            pos,
            ClientCell::Surface {
                texture: texture.to_string(),
            },
        )
    }

    fn acknowledge(&self, viewer: ViewerId, sequence: i32) -> Result<(), EnvError> {
        let mut state = self.state();
        if !state.poses.contains_key(&viewer) {
            return Err(EnvError::offline(viewer));
        }
        state.acks.entry(viewer).or_default().push(sequence);
        Ok(())
    }
}

impl ViewerChannel for SimHost {
    fn notify(&self, viewer: ViewerId, text: &str) {
        self.state().messages.entry(viewer).or_default().push(text.to_string());
    }

    fn grant(&self, viewer: ViewerId, item: &CatalogItem) {
        self.state().grants.entry(viewer).or_default().push(item.id.clone());
    }

    fn resync_held_item(&self, _viewer: ViewerId) {
        self.state().held_resyncs += 1;
    }
}
