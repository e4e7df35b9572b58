//! The layout planner - turns a viewer pose into the cells of one wall.
//!
//! ```text
//!            row 1  W W W W      W = wall cell
//!            row 0  W W W W
//!                   D D D D      D = display cell (one step towards viewer)
//!                   . . . .      . = corridor cells, cleared to air
//!                   . . V .      V = viewer (included in the corridor)
//!                   . . . .
//! ```
//!
//! The wall is built `distance + 1` steps along the viewer's facing,
//! spreads towards the viewer's right starting `columns / 2` cells to the
//! left of centre, and grows upwards from the viewer's feet.

use crate::config::LayoutParameters;
use crate::spatial_index::pack_key;
use mosaic_env::{BlockFace, BlockPos, Pose};

/// One overlay coordinate together with its packed index key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    pub pos: BlockPos,
    pub key: u64,
}

impl Cell {
    pub fn new(pos: BlockPos) -> Self {
        Self { pos, key: pack_key(pos) }
    }
}

/// Quantizes a yaw (degrees) into the cardinal direction the wall is built
/// towards. Boundaries are inclusive and checked in order, so 45 and 135
/// are west, -45 and -135 are east; everything past ±135 is north.
pub fn decide_facing(yaw: f32) -> BlockFace {
    if (45.0..=135.0).contains(&yaw) {
        return BlockFace::West;
    }

    if (-135.0..=-45.0).contains(&yaw) {
        return BlockFace::East;
    }

    if (-45.0..=45.0).contains(&yaw) {
        return BlockFace::South;
    }

    BlockFace::North
}

/// The face 90° counter-clockwise of `face`, seen from above.
///
/// ```text
///          N
///          ^
///     W <--+--> E
///          v
///          S
/// ```
///
/// # Panics
/// On `Up`/`Down`, which `decide_facing` never yields.
pub fn left_orthogonal(face: BlockFace) -> BlockFace {
    match face {
        BlockFace::North => BlockFace::West,
        BlockFace::West => BlockFace::South,
        BlockFace::South => BlockFace::East,
        BlockFace::East => BlockFace::North,
        other => panic!("Unexpected face {:?}; walls are only built towards cardinal faces", other),
    }
}

/// All cells of one wall, computed once at session start.
#[derive(Debug, Clone)]
pub struct WallLayout {
    /// Direction the wall is built towards (never recomputed)
    pub facing: BlockFace,

    /// Bottom centre of the wall; reference anchor for distance checks
    pub bottom_center: BlockPos,

    /// Wall cells in `row * columns + col` order (row 0 at the bottom,
    /// col 0 at the viewer's left)
    pub wall: Vec<Cell>,

    /// Display cells, parallel to `wall`
    pub display: Vec<Cell>,

    /// Corridor cells, `distance + 1` consecutive entries per grid slot
    pub corridor: Vec<Cell>,

    rows: usize,
    columns: usize,
}

impl WallLayout {
    /// Plans a wall in front of `pose`.
    pub fn plan(pose: &Pose, params: &LayoutParameters) -> Self {
        let facing = decide_facing(pose.yaw);
        let left = left_orthogonal(facing);
        let right = left.opposite();
        let towards_viewer = facing.opposite();

        // Extents are capped by `WallConfig::validate`, so these fit in i32.
        let wall_distance = params.distance as i32 + 1;
        let half_width = (params.columns / 2) as i32;

        let bottom_center = pose.block_pos().shifted(facing, wall_distance);
        let bottom_left = bottom_center.shifted(left, half_width);

        let page_size = params.page_size();
        let mut wall = Vec::with_capacity(page_size);
        let mut display = Vec::with_capacity(page_size);
        let mut corridor = Vec::with_capacity(page_size * (params.distance + 1));

        for row in 0..params.rows {
            for col in 0..params.columns {
                let wall_pos = bottom_left.shifted(right, col as i32).raised(row as i32);

                wall.push(Cell::new(wall_pos));
                display.push(Cell::new(wall_pos.shifted(towards_viewer, 1)));

                // Offset 1 is the display cell; the run ends one past the
                // viewer so the whole sightline is clear.
                for depth_offset in 2..=wall_distance + 1 {
                    corridor.push(Cell::new(wall_pos.shifted(towards_viewer, depth_offset)));
                }
            }
        }

        Self {
            facing,
            bottom_center,
            wall,
            display,
            corridor,
            rows: params.rows,
            columns: params.columns,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Display cells in reading order: top row first, each row left to
    /// right. The position in this iterator is the slot index.
    pub fn display_reading_order(&self) -> impl Iterator<Item = &Cell> + '_ {
        (0..self.rows)
            .rev()
            .flat_map(move |row| self.display[row * self.columns..(row + 1) * self.columns].iter())
    }
}
