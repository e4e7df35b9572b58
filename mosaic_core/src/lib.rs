//! Mosaic Core - client-only virtual display walls
//!
//! A wall is a grid of catalog items painted in front of one viewer using
//! client-side block updates only. The server world is never mutated:
//! 1. **Geometry**: a pose and layout parameters become wall, display and corridor cells
//! 2. **Spatial index**: every cell gets a packed 64-bit key for O(log n) lookup
//! 3. **Sessions**: paint, paginate, intercept and restore per viewer
//!
//! The registry keeps at most one session per viewer and is safe to drive
//! from the tick thread and the network thread at once.

pub mod catalog;
pub mod command;
pub mod config;
pub mod error;
pub mod geometry;
pub mod interception;
pub mod painter;
pub mod registry;
pub mod runtime;
pub mod session;
pub mod spatial_index;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types for convenience
pub use catalog::{CatalogProvider, InMemoryCatalog};
pub use command::{Requester, SessionCommand};
pub use config::{LayoutParameters, WallConfig};
pub use error::{ConfigError, RequestError, SessionError};
pub use geometry::{decide_facing, left_orthogonal, Cell, WallLayout};
pub use interception::{Intent, IntentKind, OutgoingVerdict, Verdict};
pub use painter::{Painter, RestoreAction};
pub use registry::{ScrollDirection, SessionRegistry, SessionSummary};
pub use runtime::{run_distance_sweep, spawn_distance_sweep};
pub use session::{Session, SessionState};
pub use spatial_index::{pack_key, CellIndex};
