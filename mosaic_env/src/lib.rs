//! Mosaic Environment Abstraction Layer
//!
//! This crate provides the narrow capability interfaces that let the Mosaic
//! overlay engine run against a real host (server process + client transport)
//! or against the deterministic simulation harness.
//!
//! # Core Concept: Capabilities, not a host API
//!
//! The overlay engine never touches the host directly. Everything it needs is
//! one of four capabilities:
//! - Time (`now()`, `sleep()`) via [`MosaicContext`]
//! - Live world readback (`block_at()`, `pose_of()`) via [`WorldView`]
//! - Client-only display updates and acknowledgements via [`DisplayChannel`]
//! - Viewer messages and item grants via [`ViewerChannel`]
//!
//! # Example
//!
//! ```ignore
//! use mosaic_env::{DisplayChannel, BlockPos, BlockState, ViewerId};
//!
//! fn paint_wall(display: &dyn DisplayChannel, viewer: ViewerId) {
//!     let _ = display.send_block_change(viewer, BlockPos::new(0, 64, 0), &BlockState::new("minecraft:stone"));
//! }
//! ```

mod context;
mod display;
mod world;
mod types;
mod error;
mod tokio_impl;

pub use context::MosaicContext;
pub use display::{BlockEncoder, ChannelDisplay, DisplayChannel, DisplayUpdate, PaletteEncoder};
pub use world::{ViewerChannel, WorldView};
pub use types::{BlockFace, BlockPos, BlockState, CatalogItem, Category, Pose, ViewerId, WorldId};
pub use error::EnvError;
pub use tokio_impl::TokioContext;
