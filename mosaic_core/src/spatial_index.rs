//! Packed coordinate keys and the ordered cell index built on them.

use mosaic_env::BlockPos;
use std::collections::BTreeMap;

/// Low 26 bits of a horizontal component.
const HORIZONTAL_MASK: u64 = 0x3FF_FFFF;
/// Explicit sign flag stored above the 26 magnitude bits.
const HORIZONTAL_SIGN: u64 = 0x400_0000;
const VERTICAL_MASK: u64 = 0x3FF;
const VERTICAL_BIAS: i32 = 128;

const X_SHIFT: u32 = 10;
const Z_SHIFT: u32 = 10 + 27;

/// Lowest vertical coordinate that packs without collision.
pub const MIN_Y: i32 = -VERTICAL_BIAS;
/// Highest vertical coordinate that packs without collision.
pub const MAX_Y: i32 = 1023 - VERTICAL_BIAS;
/// Horizontal coordinates must lie within `±MAX_HORIZONTAL`.
pub const MAX_HORIZONTAL: i32 = 67_108_863;

fn pack_horizontal(v: i32) -> u64 {
    let magnitude = (v as i64 as u64) & HORIZONTAL_MASK;
    if v < 0 {
        magnitude | HORIZONTAL_SIGN
    } else {
        magnitude
    }
}

/// Packs a block coordinate into a single integer key.
///
/// Layout (low to high): 10 bits `y + 128`, 27 bits `x`, 27 bits `z`,
/// each horizontal part carrying its own sign flag.
pub fn pack_key(pos: BlockPos) -> u64 {
    (((pos.y + VERTICAL_BIAS) as i64 as u64) & VERTICAL_MASK)
        | (pack_horizontal(pos.x) << X_SHIFT)
        | (pack_horizontal(pos.z) << Z_SHIFT)
}

/// Ordered map from packed key to payload.
///
/// Ordering carries no meaning; a `BTreeMap` just keeps debug dumps stable.
#[derive(Debug, Clone)]
pub struct CellIndex<T> {
    entries: BTreeMap<u64, T>,
}

impl<T> CellIndex<T> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Inserts or overwrites, returning the previous payload.
    pub fn insert(&mut self, key: u64, value: T) -> Option<T> {
        self.entries.insert(key, value)
    }

    pub fn remove(&mut self, key: u64) -> Option<T> {
        self.entries.remove(&key)
    }

    pub fn get(&self, key: u64) -> Option<&T> {
        self.entries.get(&key)
    }

    pub fn contains(&self, key: u64) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<T> Default for CellIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutParameters;
    use crate::geometry::WallLayout;
    use mosaic_env::{BlockState, Pose, WorldId};
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn coord() -> impl Strategy<Value = BlockPos> {
        (-MAX_HORIZONTAL..=MAX_HORIZONTAL, MIN_Y..=MAX_Y, -MAX_HORIZONTAL..=MAX_HORIZONTAL)
            .prop_map(|(x, y, z)| BlockPos::new(x, y, z))
    }

    #[test]
    fn test_known_keys() {
        assert_eq!(pack_key(BlockPos::new(0, -128, 0)), 0);
        assert_eq!(pack_key(BlockPos::new(0, 0, 0)), 128);
        assert_eq!(pack_key(BlockPos::new(1, 0, 0)), 128 | (1 << 10));
        assert_eq!(pack_key(BlockPos::new(0, 0, 1)), 128 | (1 << 37));
    }

    #[test]
    fn test_sign_flag_separates_mirrored_coordinates() {
        assert_ne!(pack_key(BlockPos::new(5, 64, 0)), pack_key(BlockPos::new(-5, 64, 0)));
        assert_ne!(pack_key(BlockPos::new(0, 64, 5)), pack_key(BlockPos::new(0, 64, -5)));
        assert_ne!(
            pack_key(BlockPos::new(MAX_HORIZONTAL, 0, 0)),
            pack_key(BlockPos::new(-MAX_HORIZONTAL, 0, 0))
        );
        assert_ne!(pack_key(BlockPos::new(-1, 0, 0)), pack_key(BlockPos::new(0, 0, -1)));
    }

    #[test]
    fn test_vertical_extremes() {
        assert_ne!(pack_key(BlockPos::new(0, MIN_Y, 0)), pack_key(BlockPos::new(0, MAX_Y, 0)));
        assert_eq!(pack_key(BlockPos::new(0, MAX_Y, 0)), 1023);
    }

    #[test]
    fn test_index_operations() {
        let mut index = CellIndex::new();
        let key = pack_key(BlockPos::new(3, 70, -9));

        assert!(!index.contains(key));
        assert_eq!(index.insert(key, "a"), None);
        assert_eq!(index.insert(key, "b"), Some("a"));
        assert_eq!(index.get(key), Some(&"b"));
        assert_eq!(index.len(), 1);
        assert_eq!(index.remove(key), Some("b"));
        assert_eq!(index.get(key), None);
        assert!(index.is_empty());
    }

    proptest! {
        #[test]
        fn prop_pack_key_is_injective(a in coord(), b in coord()) {
            prop_assert_eq!(a == b, pack_key(a) == pack_key(b));
        }

        #[test]
        fn prop_neighbours_never_collide(p in coord()) {
            let key = pack_key(p);
            if p.x < MAX_HORIZONTAL {
                prop_assert_ne!(key, pack_key(BlockPos::new(p.x + 1, p.y, p.z)));
            }
            if p.y < MAX_Y {
                prop_assert_ne!(key, pack_key(BlockPos::new(p.x, p.y + 1, p.z)));
            }
            if p.z < MAX_HORIZONTAL {
                prop_assert_ne!(key, pack_key(BlockPos::new(p.x, p.y, p.z + 1)));
            }
        }

        #[test]
        fn prop_planned_cells_have_unique_keys(
            x in -30_000_000.0f64..30_000_000.0,
            y in -120.0f64..880.0,
            z in -30_000_000.0f64..30_000_000.0,
            yaw in -180.0f32..=180.0,
            rows in 1usize..6,
            columns in 1usize..9,
            distance in 0usize..5,
        ) {
            let params = LayoutParameters::new(rows, columns, distance, BlockState::new("minecraft:stone"));
            let layout = WallLayout::plan(&Pose::new(WorldId(0), x, y, z, yaw), &params);

            let mut positions = HashSet::new();
            let mut keys = HashSet::new();
            for cell in layout.wall.iter().chain(&layout.display).chain(&layout.corridor) {
                positions.insert(cell.pos);
                keys.insert(cell.key);
            }
            prop_assert_eq!(positions.len(), keys.len());
        }
    }
}
