//! Recording host used by the unit tests of this crate.

use crate::painter::Painter;
use async_trait::async_trait;
use mosaic_env::{
    BlockFace, BlockPos, BlockState, CatalogItem, Category, DisplayChannel, EnvError, MosaicContext, Pose, ViewerChannel, ViewerId,
    WorldId, WorldView,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Block(ViewerId, BlockPos, BlockState),
    Surface(ViewerId, BlockPos, BlockFace, String),
    Ack(ViewerId, i32),
}

#[derive(Default)]
struct State {
    sent: Vec<Sent>,
    blocks: HashMap<BlockPos, BlockState>,
    poses: HashMap<ViewerId, Pose>,
    rejected: HashSet<String>,
    reject_surfaces: bool,
    disconnected: bool,
    messages: Vec<(ViewerId, String)>,
    grants: Vec<(ViewerId, String)>,
    held_resyncs: usize,
}

#[derive(Default)]
pub struct RecordingHost {
    state: Mutex<State>,
}

impl RecordingHost {
    pub const WORLD: WorldId = WorldId(0);

    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn painter(self: &Arc<Self>) -> Painter {
        Painter::new(self.clone(), self.clone())
    }

    pub fn reject_state(&self, state: &str) {
        self.state().rejected.insert(state.to_string());
    }

    pub fn reject_surfaces(&self) {
        self.state().reject_surfaces = true;
    }

    pub fn disconnect(&self) {
        self.state().disconnected = true;
    }

    pub fn set_block(&self, pos: BlockPos, state: BlockState) {
        self.state().blocks.insert(pos, state);
    }

    pub fn set_pose(&self, viewer: ViewerId, pose: Pose) {
        self.state().poses.insert(viewer, pose);
    }

    pub fn remove_pose(&self, viewer: ViewerId) {
        self.state().poses.remove(&viewer);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.state().sent.clone()
    }

    pub fn clear_sent(&self) {
        self.state().sent.clear();
    }

    pub fn messages(&self, viewer: ViewerId) -> Vec<String> {
        self.state()
            .messages
            .iter()
            .filter(|(v, _)| *v == viewer)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn grants(&self, viewer: ViewerId) -> Vec<String> {
        self.state()
            .grants
            .iter()
            .filter(|(v, _)| *v == viewer)
            .map(|(_, id)| id.clone())
            .collect()
    }

    pub fn held_resyncs(&self) -> usize {
        self.state().held_resyncs
    }
}

impl DisplayChannel for RecordingHost {
    fn send_block_change(&self, viewer: ViewerId, pos: BlockPos, state: &BlockState) -> Result<(), EnvError> {
        let mut s = self.state();
        if s.disconnected {
            return Err(EnvError::offline(viewer));
        }
        if s.rejected.contains(state.as_str()) {
            return Err(EnvError::adaptation(state.to_string()));
        }
        s.sent.push(Sent::Block(viewer, pos, state.clone()));
        Ok(())
    }

    fn send_surface(&self, viewer: ViewerId, pos: BlockPos, facing: BlockFace, texture: &str) -> Result<(), EnvError> {
        let mut s = self.state();
        if s.disconnected {
            return Err(EnvError::offline(viewer));
        }
        if s.reject_surfaces {
            return Err(EnvError::adaptation("surface"));
        }
        s.sent.push(Sent::Surface(viewer, pos, facing, texture.to_string()));
        Ok(())
    }

    fn acknowledge(&self, viewer: ViewerId, sequence: i32) -> Result<(), EnvError> {
        let mut s = self.state();
        if s.disconnected {
            return Err(EnvError::offline(viewer));
        }
        s.sent.push(Sent::Ack(viewer, sequence));
        Ok(())
    }
}

impl WorldView for RecordingHost {
    fn block_at(&self, _world: WorldId, pos: BlockPos) -> BlockState {
        self.state().blocks.get(&pos).cloned().unwrap_or_else(BlockState::air)
    }

    fn pose_of(&self, viewer: ViewerId) -> Option<Pose> {
        self.state().poses.get(&viewer).copied()
    }
}

impl ViewerChannel for RecordingHost {
    fn notify(&self, viewer: ViewerId, text: &str) {
        self.state().messages.push((viewer, text.to_string()));
    }

    fn grant(&self, viewer: ViewerId, item: &CatalogItem) {
        self.state().grants.push((viewer, item.id.clone()));
    }

    fn resync_held_item(&self, _viewer: ViewerId) {
        self.state().held_resyncs += 1;
    }
}

/// `count` items of one category, named `item-0..`.
pub fn items(count: usize) -> Vec<Arc<CatalogItem>> {
    (0..count)
        .map(|i| {
            Arc::new(CatalogItem {
                id: format!("item-{}", i),
                name: format!("Item {}", i),
                category: Category::Animals,
                tags: vec!["test".to_string()],
                texture: format!("tex-{}", i),
            })
        })
        .collect()
}

/// Viewer standing at the origin of `RecordingHost::WORLD`, looking south.
pub fn origin_pose() -> Pose {
    Pose::new(RecordingHost::WORLD, 0.5, 64.0, 0.5, 0.0)
}

/// Manually advanced clock; `sleep` advances it instead of waiting.
#[derive(Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
}

impl ManualClock {
    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

#[async_trait]
impl MosaicContext for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
        tokio::task::yield_now().await;
    }

    fn spawn<F>(&self, _name: &str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(future);
    }
}
