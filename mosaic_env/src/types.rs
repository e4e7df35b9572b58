//! Common types for the Mosaic environment abstraction.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a connected viewer.
///
/// Uses UUID v4 for global uniqueness without coordination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ViewerId(pub Uuid);

impl ViewerId {
    /// Creates a new random ViewerId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a deterministic ViewerId from a seed (for simulation).
    pub fn from_seed(seed: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&seed.to_le_bytes());
        bytes[8..16].copy_from_slice(&seed.wrapping_mul(0x517cc1b727220a95).to_le_bytes());
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for ViewerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ViewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Show first 8 chars for readability
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Identifier of a world (coordinate namespace) on the host.
///
/// Coordinates from two different worlds are never comparable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldId(pub u32);

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "world#{}", self.0)
    }
}

/// An integer block coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Moves `steps` blocks along `face`.
    pub fn shifted(self, face: BlockFace, steps: i32) -> Self {
        let (dx, dy, dz) = face.offset();
        Self {
            x: self.x + dx * steps,
            y: self.y + dy * steps,
            z: self.z + dz * steps,
        }
    }

    /// Moves `dy` blocks vertically.
    pub fn raised(self, dy: i32) -> Self {
        Self { y: self.y + dy, ..self }
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// One of the six faces of a block.
///
/// Axis convention: north is -z, south is +z, east is +x, west is -x.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockFace {
    North,
    South,
    East,
    West,
    Up,
    Down,
}

impl BlockFace {
    /// Unit step `(dx, dy, dz)` for this face.
    pub const fn offset(self) -> (i32, i32, i32) {
        match self {
            BlockFace::North => (0, 0, -1),
            BlockFace::South => (0, 0, 1),
            BlockFace::East => (1, 0, 0),
            BlockFace::West => (-1, 0, 0),
            BlockFace::Up => (0, 1, 0),
            BlockFace::Down => (0, -1, 0),
        }
    }

    pub const fn opposite(self) -> Self {
        match self {
            BlockFace::North => BlockFace::South,
            BlockFace::South => BlockFace::North,
            BlockFace::East => BlockFace::West,
            BlockFace::West => BlockFace::East,
            BlockFace::Up => BlockFace::Down,
            BlockFace::Down => BlockFace::Up,
        }
    }
}

/// Opaque block content as understood by the host, e.g. `minecraft:coal_block`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockState(pub String);

impl BlockState {
    pub const AIR: &'static str = "minecraft:air";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The empty state, used to clear cells and as the safe fallback.
    pub fn air() -> Self {
        Self(Self::AIR.to_string())
    }

    pub fn is_air(&self) -> bool {
        self.0 == Self::AIR
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A viewer's location and heading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub world: WorldId,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Degrees; 0 faces south (+z), 90 faces west (-x), -90 faces east (+x).
    pub yaw: f32,
}

impl Pose {
    pub fn new(world: WorldId, x: f64, y: f64, z: f64, yaw: f32) -> Self {
        Self { world, x, y, z, yaw }
    }

    /// The block the pose stands in.
    pub fn block_pos(&self) -> BlockPos {
        BlockPos::new(self.x.floor() as i32, self.y.floor() as i32, self.z.floor() as i32)
    }
}

/// Catalog categories a viewer may browse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Alphabet,
    Animals,
    Blocks,
    Decoration,
    FoodDrinks,
    Humans,
    Humanoid,
    Miscellaneous,
    Monsters,
    Plants,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::Alphabet,
        Category::Animals,
        Category::Blocks,
        Category::Decoration,
        Category::FoodDrinks,
        Category::Humans,
        Category::Humanoid,
        Category::Miscellaneous,
        Category::Monsters,
        Category::Plants,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Category::Alphabet => "ALPHABET",
            Category::Animals => "ANIMALS",
            Category::Blocks => "BLOCKS",
            Category::Decoration => "DECORATION",
            Category::FoodDrinks => "FOOD_DRINKS",
            Category::Humans => "HUMANS",
            Category::Humanoid => "HUMANOID",
            Category::Miscellaneous => "MISCELLANEOUS",
            Category::Monsters => "MONSTERS",
            Category::Plants => "PLANTS",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Category {
    type Err = String;

    /// Case-insensitive match against the category names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| s.to_string())
    }
}

/// A selectable catalog entry. Owned by the content provider; sessions hold
/// it behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    pub category: Category,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Display texture payload (e.g. a base64 skin property).
    pub texture: String,
}
