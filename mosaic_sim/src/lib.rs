//! Mosaic Deterministic Simulation Harness
//!
//! Runs the overlay engine against a simulated server: a flat world, a
//! set of connected clients that keep their own view of it, and a
//! virtual clock. Every scenario checks the two properties that matter:
//! - **The world is never written**: vetoed actions never land and
//!   overlay content only ever exists on one client
//! - **Clients converge back**: once a wall goes away, every cell it
//!   covered shows live world content again
//!
//! # Usage
//!
//! ```ignore
//! use mosaic_core::WallConfig;
//! use mosaic_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42, WallConfig::default()).run(ScenarioId::Browse);
//! assert!(result.passed);
//! ```

mod context;
mod error;
mod host;
mod runner;
pub mod scenarios;

pub use context::SimContext;
pub use error::SimError;
pub use host::{ClientCell, SimHost, GROUND_Y};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner, WORLD};
