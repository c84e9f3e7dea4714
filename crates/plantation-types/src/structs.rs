//! Core value types: catalog definitions, storage keys, and world positions.
//!
//! Catalog structs ([`FarmTypeDef`], [`MaterialDrop`], [`PlotLayout`]) are
//! deserialized straight from configuration and are never mutated after the
//! catalog is built.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::{FarmTypeId, MaterialId};

// ---------------------------------------------------------------------------
// Tier
// ---------------------------------------------------------------------------

/// Quality rank of a material, always in `1..=3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Tier(u8);

impl Tier {
    /// Lowest tier.
    pub const MIN: Self = Self(1);
    /// Highest tier.
    pub const MAX: Self = Self(3);

    /// Build a tier, returning `None` outside `1..=3`.
    pub const fn new(value: u8) -> Option<Self> {
        if value >= Self::MIN.0 && value <= Self::MAX.0 {
            Some(Self(value))
        } else {
            None
        }
    }

    /// The numeric rank.
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Tier {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("tier must be between 1 and 3, got {value}"))
    }
}

impl From<Tier> for u8 {
    fn from(tier: Tier) -> Self {
        tier.0
    }
}

impl core::fmt::Display for Tier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "T{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// StorageKey
// ---------------------------------------------------------------------------

/// Ledger slot key: a material at a specific tier.
///
/// The same material at two tiers occupies two independent slots.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct StorageKey {
    /// The material.
    pub material: MaterialId,
    /// The tier of the material.
    #[ts(as = "u8")]
    pub tier: Tier,
}

impl StorageKey {
    /// Build a key from a material and tier.
    pub fn new(material: impl Into<MaterialId>, tier: Tier) -> Self {
        Self {
            material: material.into(),
            tier,
        }
    }
}

impl core::fmt::Display for StorageKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}@{}", self.material, self.tier)
    }
}

// ---------------------------------------------------------------------------
// WorldPos
// ---------------------------------------------------------------------------

/// A point in world space. `y` is the vertical axis.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct WorldPos {
    /// East-west coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
    /// North-south coordinate.
    pub z: f64,
}

impl WorldPos {
    /// Build a position from its three coordinates.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

// ---------------------------------------------------------------------------
// Catalog definitions
// ---------------------------------------------------------------------------

/// Placement of one farm type's cell grid inside a player's plot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotLayout {
    /// X offset of the first cell from the plot's minimum corner.
    pub offset_x: f64,
    /// Z offset of the first cell from the plot's minimum corner.
    pub offset_z: f64,
    /// Number of rows (along z).
    pub rows: u32,
    /// Number of columns (along x).
    pub columns: u32,
    /// Distance between neighbouring cell centres.
    pub cell_spacing: f64,
}

/// One entry of a farm type's drop table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialDrop {
    /// Material produced on success.
    pub material: MaterialId,
    /// Tier of the produced material.
    pub tier: Tier,
    /// Base chance per harvest, as a percentage in `0..=100`.
    pub base_rate: Decimal,
    /// Currency paid per unit when stored material is sold.
    #[serde(default)]
    pub sell_price: Decimal,
}

impl MaterialDrop {
    /// The ledger slot this drop feeds.
    pub fn storage_key(&self) -> StorageKey {
        StorageKey::new(self.material.clone(), self.tier)
    }
}

/// Static definition of one kind of farm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarmTypeDef {
    /// Catalog key.
    pub id: FarmTypeId,
    /// Human-readable name.
    pub display_name: String,
    /// Currency charged to claim an instance.
    pub unlock_cost: Decimal,
    /// Maximum number of instances one player may hold.
    pub max_instances: u32,
    /// Growth duration in seconds at efficiency 100%.
    pub base_growth_secs: u64,
    /// Storage capacity at level 1 with no storage upgrades.
    pub storage_capacity: u32,
    /// Cell grid placement inside the plot.
    pub layout: PlotLayout,
    /// Ordered drop table.
    pub drops: Vec<MaterialDrop>,
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// Per-owner aggregate counters persisted in `player_stats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PlayerStats {
    /// Number of successful harvests.
    pub total_harvests: u64,
    /// Number of material units that entered farm storage.
    pub materials_collected: u64,
    /// Currency spent on claims and upgrades.
    #[ts(as = "String")]
    pub currency_spent: Decimal,
    /// Currency earned by selling stored materials.
    #[ts(as = "String")]
    pub currency_earned: Decimal,
}
