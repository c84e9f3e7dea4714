//! Farm catalog, plot allocation, and growth timing for the Plantation farm system.
//!
//! This crate holds everything about farms that is static or purely derived:
//! which farm types exist, where each player's plot lies in the world, which
//! farm instance sits under a given world position, and when a farm becomes
//! harvestable again. None of it performs I/O or holds mutable state.
//!
//! # Modules
//!
//! - [`catalog`] -- Validated, immutable table of farm type definitions.
//! - [`error`] -- Error types for catalog and allocator construction.
//! - [`growth`] -- Lazy growth timing (`ready_at`, `is_ready`).
//! - [`spatial`] -- Owner-to-plot allocation and position-to-index mapping.

pub mod catalog;
pub mod error;
pub mod growth;
pub mod spatial;

// Re-export primary types at crate root.
pub use catalog::Catalog;
pub use error::WorldError;
pub use growth::{BASE_EFFICIENCY_PCT, growth_duration, is_ready, ready_at};
pub use spatial::{PlantationArea, PlotAllocator, PlotConfig, SubGrid, aabb_contains};
