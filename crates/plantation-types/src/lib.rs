//! Shared type definitions for the Plantation farm system.
//!
//! This crate is the single source of truth for the types that cross crate
//! boundaries: identifiers, catalog definitions, and the result/snapshot
//! values consumed by the presentation layer. Presentation-facing types flow
//! to `TypeScript` via `ts-rs`.
//!
//! # Modules
//!
//! - [`ids`] -- Owner UUID wrapper and catalog string keys
//! - [`enums`] -- Upgrade tracks and material sources
//! - [`structs`] -- Tiers, storage keys, world positions, catalog definitions
//! - [`results`] -- Harvest/upgrade results and farm snapshots

pub mod enums;
pub mod ids;
pub mod results;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{MaterialSource, UpgradeTrack};
pub use ids::{FarmTypeId, MaterialId, OwnerId};
pub use results::{
    FarmSnapshot, HarvestDrop, HarvestOutcome, HarvestResult, LedgerSlot, MaterialDebit,
    MaterialRequirement, SaleReceipt, UpgradeCost, UpgradeReceipt,
};
pub use structs::{
    FarmTypeDef, MaterialDrop, PlayerStats, PlotLayout, StorageKey, Tier, WorldPos,
};
