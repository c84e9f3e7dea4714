//! Result and snapshot types handed to the presentation layer.
//!
//! The presentation layer never mutates farm state; it renders these values
//! and sends trigger calls back. All of them derive [`TS`] so the client
//! bindings stay in sync with the server.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{MaterialSource, UpgradeTrack};
use crate::ids::{FarmTypeId, OwnerId};
use crate::structs::{StorageKey, WorldPos};

// ---------------------------------------------------------------------------
// Harvest
// ---------------------------------------------------------------------------

/// One ledger slot that grew during a harvest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct HarvestDrop {
    /// The slot that received the units.
    pub key: StorageKey,
    /// Units added to the slot.
    pub delta: u32,
}

/// Outcome of a successful drop-table evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct HarvestResult {
    /// Slots that received units, in drop-table order.
    pub drops: Vec<HarvestDrop>,
    /// Successful rolls that were discarded because storage filled up.
    pub discarded: u32,
    /// Experience granted to the instance.
    pub experience_gained: u64,
    /// The new last-harvest timestamp.
    pub harvested_at: DateTime<Utc>,
}

impl HarvestResult {
    /// Total units added across all slots.
    pub fn total_units(&self) -> u64 {
        self.drops
            .iter()
            .fold(0_u64, |acc, d| acc.saturating_add(u64::from(d.delta)))
    }
}

/// What happened when a harvest was triggered.
///
/// `NotReady` and `StorageFull` are normal steady states, not failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "status", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum HarvestOutcome {
    /// The drop table was evaluated once.
    Harvested(HarvestResult),
    /// The growth cycle has not completed yet.
    NotReady {
        /// When the farm becomes harvestable.
        ready_at: DateTime<Utc>,
    },
    /// Storage is at capacity; the farm is paused until emptied or upgraded.
    StorageFull {
        /// Current storage capacity.
        capacity: u32,
    },
}

impl HarvestOutcome {
    /// The drops applied by this call (empty unless harvested).
    pub fn drops(&self) -> &[HarvestDrop] {
        match self {
            Self::Harvested(result) => &result.drops,
            Self::NotReady { .. } | Self::StorageFull { .. } => &[],
        }
    }

    /// Whether the drop table was evaluated.
    pub const fn is_harvested(&self) -> bool {
        matches!(self, Self::Harvested(_))
    }
}

// ---------------------------------------------------------------------------
// Upgrades
// ---------------------------------------------------------------------------

/// A material quantity required by an upgrade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct MaterialRequirement {
    /// The slot required.
    pub key: StorageKey,
    /// Units required.
    pub quantity: u32,
}

/// Price of taking a track to its next level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct UpgradeCost {
    /// The track being priced.
    pub track: UpgradeTrack,
    /// The level the track would reach.
    pub next_level: u32,
    /// Currency to withdraw.
    #[ts(as = "String")]
    pub currency: Decimal,
    /// Materials to debit, ordered lowest tier first.
    pub materials: Vec<MaterialRequirement>,
}

/// A material debit performed while applying an upgrade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct MaterialDebit {
    /// The slot debited.
    pub key: StorageKey,
    /// Units debited.
    pub quantity: u32,
    /// Where the units came from.
    pub source: MaterialSource,
}

/// Record of a successfully applied upgrade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct UpgradeReceipt {
    /// The upgraded track.
    pub track: UpgradeTrack,
    /// The level the track reached.
    pub new_level: u32,
    /// Currency withdrawn.
    #[ts(as = "String")]
    pub currency_spent: Decimal,
    /// Material debits in the order they were applied.
    pub debits: Vec<MaterialDebit>,
}

/// Record of stored materials sold at catalog prices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SaleReceipt {
    /// Slots emptied by the sale.
    pub sold: Vec<LedgerSlot>,
    /// Currency deposited.
    #[ts(as = "String")]
    pub earned: Decimal,
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Quantity held in one storage slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LedgerSlot {
    /// The slot.
    pub key: StorageKey,
    /// Units stored.
    pub quantity: u32,
}

/// Read-only view of a farm instance for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct FarmSnapshot {
    /// Owning player.
    pub owner: OwnerId,
    /// Farm type.
    pub farm_type: FarmTypeId,
    /// Instance index within the owner's farms of this type.
    pub index: u32,
    /// Current level.
    pub level: u32,
    /// Experience accumulated towards the next level.
    pub experience: u64,
    /// Efficiency multiplier as a percentage (100 = 1.0x).
    pub efficiency_pct: u32,
    /// Storage upgrade level.
    pub storage_level: u32,
    /// Speed upgrade level.
    pub speed_level: u32,
    /// Quality upgrade level.
    pub quality_level: u32,
    /// Storage capacity at the current level and upgrades.
    pub capacity: u32,
    /// Units currently stored.
    pub stored: u32,
    /// Timestamp of the last harvest (or creation).
    pub last_harvest: DateTime<Utc>,
    /// When the next harvest becomes possible.
    pub ready_at: DateTime<Utc>,
    /// World location of the farm.
    pub location: WorldPos,
    /// Non-empty storage slots.
    pub storage: Vec<LedgerSlot>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::Tier;

    #[test]
    fn non_harvested_outcomes_have_no_drops() {
        let outcome = HarvestOutcome::StorageFull { capacity: 500 };
        assert!(outcome.drops().is_empty());
        assert!(!outcome.is_harvested());
    }

    #[test]
    fn total_units_sums_deltas() {
        let result = HarvestResult {
            drops: vec![
                HarvestDrop {
                    key: StorageKey::new("wild_berry", Tier::MIN),
                    delta: 1,
                },
                HarvestDrop {
                    key: StorageKey::new("honey", Tier::MAX),
                    delta: 1,
                },
            ],
            discarded: 0,
            experience_gained: 40,
            harvested_at: Utc::now(),
        };
        assert_eq!(result.total_units(), 2);
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let outcome = HarvestOutcome::StorageFull { capacity: 10 };
        let json = serde_json::to_string(&outcome).unwrap_or_default();
        assert!(json.contains("\"status\":\"storage_full\""));
    }
}
