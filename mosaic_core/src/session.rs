//! One viewer's wall: layout, paging, cell indices and teardown.
//!
//! A session is not internally synchronised. The registry hands it out
//! under its own lock, so every call for one viewer is serialised.

use crate::config::LayoutParameters;
use crate::error::SessionError;
use crate::geometry::{Cell, WallLayout};
use crate::painter::{Painter, RestoreAction};
use crate::spatial_index::{pack_key, CellIndex};
use mosaic_env::{BlockFace, BlockPos, BlockState, CatalogItem, Pose, ViewerId, WorldId};
use nalgebra::Vector3;
use std::sync::Arc;
use tracing::debug;

/// Lifecycle of a session. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Pending,
    Shown,
    Closed,
}

pub struct Session {
    viewer: ViewerId,
    world: WorldId,
    params: LayoutParameters,
    items: Vec<Arc<CatalogItem>>,
    layout: WallLayout,

    page_size: usize,
    number_of_pages: usize,
    current_page: usize,

    /// Every painted cell -> how to paint it again
    restore_by_key: CellIndex<RestoreAction>,

    /// Display cells currently showing an item
    item_by_key: CellIndex<Arc<CatalogItem>>,

    auxiliary_painted: bool,
    content_painted: bool,
    state: SessionState,
}

impl Session {
    /// Plans the wall in front of `pose`. Nothing is painted until `show`.
    pub fn new(viewer: ViewerId, pose: &Pose, items: Vec<Arc<CatalogItem>>, params: LayoutParameters) -> Self {
        let layout = WallLayout::plan(pose, &params);
        let page_size = params.page_size();
        let number_of_pages = items.len().div_ceil(page_size).max(1);

        Self {
            viewer,
            world: pose.world,
            params,
            items,
            layout,
            page_size,
            number_of_pages,
            current_page: 0,
            restore_by_key: CellIndex::new(),
            item_by_key: CellIndex::new(),
            auxiliary_painted: false,
            content_painted: false,
            state: SessionState::Pending,
        }
    }

    pub fn viewer(&self) -> ViewerId {
        self.viewer
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn layout(&self) -> &WallLayout {
        &self.layout
    }

    pub fn facing(&self) -> BlockFace {
        self.layout.facing
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn number_of_pages(&self) -> usize {
        self.number_of_pages
    }

    /// Zero-based index of the page on display.
    pub fn current_page(&self) -> usize {
        self.current_page
    }

    /// Number of cells with a stored restore action.
    pub fn painted_cells(&self) -> usize {
        self.restore_by_key.len()
    }

    /// Number of display cells currently showing an item.
    pub fn displayed_items(&self) -> usize {
        self.item_by_key.len()
    }

    /// Paints the wall. The wall and corridor are painted on the first
    /// call only; the display cells are repainted for the current page on
    /// every call.
    pub fn show(&mut self, painter: &Painter) -> Result<(), SessionError> {
        if self.state == SessionState::Closed {
            return Err(SessionError::Closed);
        }

        if !self.auxiliary_painted {
            self.auxiliary_painted = true;
            self.paint_auxiliary(painter);
        }

        self.paint_page(painter);
        self.state = SessionState::Shown;
        Ok(())
    }

    fn paint_auxiliary(&mut self, painter: &Painter) {
        let wall_surface = RestoreAction::Block(self.params.wall_surface.clone());
        for cell in &self.layout.wall {
            capture_and_replay(&mut self.restore_by_key, painter, self.viewer, cell, wall_surface.clone());
        }

        let air = RestoreAction::Block(BlockState::air());
        for cell in &self.layout.corridor {
            capture_and_replay(&mut self.restore_by_key, painter, self.viewer, cell, air.clone());
        }

        debug!(
            viewer = %self.viewer,
            wall = self.layout.wall.len(),
            corridor = self.layout.corridor.len(),
            "Painted wall and corridor"
        );
    }

    fn paint_page(&mut self, painter: &Painter) {
        self.content_painted = true;

        let towards_viewer = self.layout.facing.opposite();
        let first = self.current_page * self.page_size;

        for (slot, cell) in self.layout.display_reading_order().enumerate() {
            let action = match self.items.get(first + slot) {
                Some(item) => {
                    self.item_by_key.insert(cell.key, Arc::clone(item));
                    RestoreAction::Surface {
                        facing: towards_viewer,
                        item: Arc::clone(item),
                    }
                }
                None => {
                    self.item_by_key.remove(cell.key);
                    RestoreAction::Block(BlockState::air())
                }
            };
            capture_and_replay(&mut self.restore_by_key, painter, self.viewer, cell, action);
        }

        debug!(
            viewer = %self.viewer,
            page = self.current_page + 1,
            pages = self.number_of_pages,
            shown = self.item_by_key.len(),
            "Painted page"
        );
    }

    /// Moves one page forward. Fails without repainting on the last page.
    pub fn next_page(&mut self, painter: &Painter) -> Result<usize, SessionError> {
        if self.state == SessionState::Closed {
            return Err(SessionError::Closed);
        }
        if self.current_page + 1 >= self.number_of_pages {
            return Err(SessionError::AtLastPage(self.number_of_pages));
        }

        self.current_page += 1;
        self.show(painter)?;
        Ok(self.current_page)
    }

    /// Moves one page back. Fails without repainting on the first page.
    pub fn previous_page(&mut self, painter: &Painter) -> Result<usize, SessionError> {
        if self.state == SessionState::Closed {
            return Err(SessionError::Closed);
        }
        if self.current_page == 0 {
            return Err(SessionError::AtFirstPage);
        }

        self.current_page -= 1;
        self.show(painter)?;
        Ok(self.current_page)
    }

    /// Squared distance from the wall's bottom centre to `pose`, or `None`
    /// when the pose is in another world and cannot be compared.
    pub fn distance_squared_to(&self, pose: &Pose) -> Option<f64> {
        if pose.world != self.world {
            return None;
        }

        let anchor = self.layout.bottom_center;
        let anchor = Vector3::new(anchor.x as f64, anchor.y as f64, anchor.z as f64);
        Some((Vector3::new(pose.x, pose.y, pose.z) - anchor).norm_squared())
    }

    /// The item shown at `pos`, if any.
    pub fn cell_content_at(&self, pos: BlockPos) -> Option<&Arc<CatalogItem>> {
        self.item_by_key.get(pack_key(pos))
    }

    /// True if `pos` is one of the cells this session painted.
    pub fn covers(&self, pos: BlockPos) -> bool {
        self.restore_by_key.contains(pack_key(pos))
    }

    /// The client predicted a change at `pos`. Painted cells get their fake
    /// content re-sent; anything else gets its live content, since the
    /// vetoed action never reaches the world and nothing else would
    /// correct the client.
    pub fn on_attempted_mutation(&self, painter: &Painter, pos: BlockPos) {
        match self.restore_by_key.get(pack_key(pos)) {
            Some(action) => painter.replay(self.viewer, pos, action),
            None => painter.resync_cell(self.viewer, self.world, pos),
        }
    }

    /// Restores every painted cell from live world content and forgets all
    /// overlay state. Calling it again has no effect.
    ///
    /// Content is read at close time, so a real change made to a covered
    /// cell while the overlay was up is what the viewer ends up seeing.
    pub fn close(&mut self, painter: &Painter) {
        if self.auxiliary_painted {
            self.auxiliary_painted = false;
            for cell in self.layout.wall.iter().chain(&self.layout.corridor) {
                painter.resync_cell(self.viewer, self.world, cell.pos);
            }
        }

        if self.content_painted {
            self.content_painted = false;
            for cell in &self.layout.display {
                painter.resync_cell(self.viewer, self.world, cell.pos);
            }
        }

        if self.state != SessionState::Closed {
            debug!(viewer = %self.viewer, "Closed session");
        }

        self.restore_by_key.clear();
        self.item_by_key.clear();
        self.state = SessionState::Closed;
    }
}

fn capture_and_replay(
    restore_by_key: &mut CellIndex<RestoreAction>,
    painter: &Painter,
    viewer: ViewerId,
    cell: &Cell,
    action: RestoreAction,
) {
    painter.replay(viewer, cell.pos, &action);
    restore_by_key.insert(cell.key, action);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{items, origin_pose, RecordingHost, Sent};
    use approx::assert_relative_eq;
    use mosaic_env::WorldId;

    fn session(count: usize) -> Session {
        Session::new(ViewerId::from_seed(1), &origin_pose(), items(count), LayoutParameters::default())
    }

    fn surfaces(sent: &[Sent]) -> usize {
        sent.iter().filter(|s| matches!(s, Sent::Surface(..))).count()
    }

    fn air_blocks(sent: &[Sent]) -> usize {
        sent.iter()
            .filter(|s| matches!(s, Sent::Block(_, _, state) if state.is_air()))
            .count()
    }

    #[test]
    fn test_number_of_pages() {
        assert_eq!(session(0).number_of_pages(), 1);
        assert_eq!(session(1).number_of_pages(), 1);
        assert_eq!(session(40).number_of_pages(), 1);
        assert_eq!(session(41).number_of_pages(), 2);
        assert_eq!(session(45).number_of_pages(), 2);
    }

    #[test]
    fn test_first_show_paints_everything() {
        let host = RecordingHost::new();
        let painter = host.painter();
        let mut s = session(45);

        s.show(&painter).unwrap();
        let sent = host.sent();

        let wall = sent
            .iter()
            .filter(|m| matches!(m, Sent::Block(_, _, state) if state.as_str() == "minecraft:coal_block"))
            .count();
        assert_eq!(wall, 40);
        assert_eq!(air_blocks(&sent), 160);
        assert_eq!(surfaces(&sent), 40);
        assert_eq!(s.painted_cells(), 240);
        assert_eq!(s.displayed_items(), 40);
        assert_eq!(s.state(), SessionState::Shown);
    }

    #[test]
    fn test_second_page_partially_filled() {
        let host = RecordingHost::new();
        let painter = host.painter();
        let mut s = session(45);
        s.show(&painter).unwrap();
        host.clear_sent();

        assert_eq!(s.next_page(&painter), Ok(1));
        let sent = host.sent();

        assert_eq!(surfaces(&sent), 5);
        assert_eq!(air_blocks(&sent), 35);
        assert_eq!(sent.len(), 40);
        assert_eq!(s.displayed_items(), 5);
        assert_eq!(s.painted_cells(), 240);
    }

    #[test]
    fn test_empty_catalog_clears_all_display_cells() {
        let host = RecordingHost::new();
        let mut s = session(0);
        s.show(&host.painter()).unwrap();

        let display: Vec<BlockPos> = s.layout().display.iter().map(|c| c.pos).collect();
        let cleared = host
            .sent()
            .into_iter()
            .filter(|m| matches!(m, Sent::Block(_, pos, state) if state.is_air() && display.contains(pos)))
            .count();
        assert_eq!(cleared, 40);
        assert_eq!(s.displayed_items(), 0);
    }

    #[test]
    fn test_paging_clamps_at_both_ends() {
        let host = RecordingHost::new();
        let painter = host.painter();
        let mut s = session(45);
        s.show(&painter).unwrap();
        host.clear_sent();

        assert_eq!(s.previous_page(&painter), Err(SessionError::AtFirstPage));
        assert_eq!(s.next_page(&painter), Ok(1));
        host.clear_sent();
        assert_eq!(s.next_page(&painter), Err(SessionError::AtLastPage(2)));
        assert!(host.sent().is_empty());
        assert_eq!(s.current_page(), 1);
        assert_eq!(s.previous_page(&painter), Ok(0));
        assert_eq!(s.displayed_items(), 40);
    }

    #[test]
    fn test_slot_zero_is_top_left() {
        let host = RecordingHost::new();
        let mut s = session(3);
        s.show(&host.painter()).unwrap();

        let top_left = s.layout().display[4 * 8].pos;
        let bottom_left = s.layout().display[0].pos;
        assert_eq!(s.cell_content_at(top_left).map(|i| i.id.as_str()), Some("item-0"));
        assert_eq!(s.cell_content_at(s.layout().display[4 * 8 + 2].pos).map(|i| i.id.as_str()), Some("item-2"));
        assert!(s.cell_content_at(bottom_left).is_none());
    }

    #[test]
    fn test_surfaces_face_the_viewer() {
        let host = RecordingHost::new();
        let mut s = session(1);
        s.show(&host.painter()).unwrap();

        assert_eq!(s.facing(), BlockFace::South);
        let facing = host.sent().into_iter().find_map(|m| match m {
            Sent::Surface(_, _, facing, _) => Some(facing),
            _ => None,
        });
        assert_eq!(facing, Some(BlockFace::North));
    }

    #[test]
    fn test_close_is_idempotent() {
        let host = RecordingHost::new();
        let painter = host.painter();
        let mut s = session(45);
        s.show(&painter).unwrap();
        host.clear_sent();

        s.close(&painter);
        assert_eq!(host.sent().len(), 240);
        assert_eq!(s.painted_cells(), 0);
        assert_eq!(s.displayed_items(), 0);

        host.clear_sent();
        s.close(&painter);
        assert!(host.sent().is_empty());
        assert_eq!(s.state(), SessionState::Closed);
        assert_eq!(s.show(&painter), Err(SessionError::Closed));
        assert_eq!(s.next_page(&painter), Err(SessionError::Closed));
    }

    #[test]
    fn test_close_restores_live_content() {
        let host = RecordingHost::new();
        let painter = host.painter();
        let mut s = session(1);
        s.show(&painter).unwrap();

        let wall_cell = s.layout().wall[0].pos;
        host.set_block(wall_cell, BlockState::new("minecraft:oak_planks"));
        host.clear_sent();
        s.close(&painter);

        assert!(host
            .sent()
            .contains(&Sent::Block(s.viewer(), wall_cell, BlockState::new("minecraft:oak_planks"))));
    }

    #[test]
    fn test_close_before_show_sends_nothing() {
        let host = RecordingHost::new();
        let mut s = session(3);
        s.close(&host.painter());
        assert!(host.sent().is_empty());
    }

    #[test]
    fn test_attempted_mutation_reasserts_fake_content() {
        let host = RecordingHost::new();
        let painter = host.painter();
        let mut s = session(2);
        s.show(&painter).unwrap();
        host.clear_sent();

        let wall = s.layout().wall[0].pos;
        let top_left = s.layout().display[32].pos;
        let outside = BlockPos::new(50, 64, 50);
        host.set_block(outside, BlockState::new("minecraft:dirt"));

        s.on_attempted_mutation(&painter, wall);
        s.on_attempted_mutation(&painter, top_left);
        s.on_attempted_mutation(&painter, outside);

        let viewer = s.viewer();
        assert_eq!(
            host.sent(),
            vec![
                Sent::Block(viewer, wall, BlockState::new("minecraft:coal_block")),
                Sent::Surface(viewer, top_left, BlockFace::North, "tex-0".to_string()),
                Sent::Block(viewer, outside, BlockState::new("minecraft:dirt")),
            ]
        );
    }

    #[test]
    fn test_distance_squared() {
        let s = session(1);
        // Anchor is (0, 64, 4) for a viewer at the origin looking south.
        let d = s.distance_squared_to(&origin_pose()).unwrap();
        assert_relative_eq!(d, 0.25 + 3.5 * 3.5, epsilon = 1e-9);

        let elsewhere = Pose::new(WorldId(9), 0.0, 64.0, 4.0, 0.0);
        assert_eq!(s.distance_squared_to(&elsewhere), None);
    }
}
