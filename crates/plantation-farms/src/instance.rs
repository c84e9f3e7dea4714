//! Farm instances: the mutable per-player production unit.
//!
//! A [`FarmInstance`] is owned by exactly one player and identified within
//! that player's farms by its [`FarmKey`] (farm type plus instance index).
//! It carries its progression (level, experience, upgrade tracks), its
//! growth clock and its storage ledger.
//!
//! Invariants maintained by every mutation in this crate:
//!
//! - the ledger total never exceeds [`FarmInstance::capacity`],
//! - `index` stays in `1..=max_instances`,
//! - `level` stays in `1..=max_level`,
//! - `last_harvest` never moves backwards.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use plantation_ledger::total_load;
use plantation_types::{
    FarmSnapshot, FarmTypeDef, FarmTypeId, LedgerSlot, OwnerId, StorageKey, UpgradeTrack, WorldPos,
};
use plantation_world::{BASE_EFFICIENCY_PCT, growth};

use crate::config::EconomyConfig;
use crate::error::FarmError;

/// Identity of an instance within one owner's farms.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FarmKey {
    /// Farm type.
    pub farm_type: FarmTypeId,
    /// Instance index, starting at 1.
    pub index: u32,
}

impl FarmKey {
    /// Build a key.
    pub fn new(farm_type: impl Into<FarmTypeId>, index: u32) -> Self {
        Self {
            farm_type: farm_type.into(),
            index,
        }
    }
}

impl std::fmt::Display for FarmKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.farm_type, self.index)
    }
}

/// A player's farm.
#[derive(Debug, Clone, PartialEq)]
pub struct FarmInstance {
    /// Owning player.
    pub owner: OwnerId,
    /// Type and index.
    pub key: FarmKey,
    /// Current level, starting at 1.
    pub level: u32,
    /// Experience accumulated towards the next level.
    pub experience: u64,
    /// Growth efficiency in percent, derived from `speed_level`.
    pub efficiency_pct: u32,
    /// Storage track level.
    pub storage_level: u32,
    /// Speed track level.
    pub speed_level: u32,
    /// Quality track level.
    pub quality_level: u32,
    /// Start of the current growth cycle.
    pub last_harvest: DateTime<Utc>,
    /// Where the farm sits in the world.
    pub location: WorldPos,
    /// Stored materials.
    pub storage: BTreeMap<StorageKey, u32>,
}

impl FarmInstance {
    /// A fresh level-1 instance whose first growth cycle starts at `now`.
    pub fn new(owner: OwnerId, key: FarmKey, location: WorldPos, now: DateTime<Utc>) -> Self {
        Self {
            owner,
            key,
            level: 1,
            experience: 0,
            efficiency_pct: BASE_EFFICIENCY_PCT,
            storage_level: 0,
            speed_level: 0,
            quality_level: 0,
            last_harvest: now,
            location,
            storage: BTreeMap::new(),
        }
    }

    /// Farm type of this instance.
    pub const fn farm_type(&self) -> &FarmTypeId {
        &self.key.farm_type
    }

    /// Instance index.
    pub const fn index(&self) -> u32 {
        self.key.index
    }

    /// Current level of an upgrade track.
    pub const fn track_level(&self, track: UpgradeTrack) -> u32 {
        match track {
            UpgradeTrack::Storage => self.storage_level,
            UpgradeTrack::Speed => self.speed_level,
            UpgradeTrack::Quality => self.quality_level,
        }
    }

    /// Set a track level, recomputing efficiency for the speed track.
    pub(crate) fn set_track_level(
        &mut self,
        track: UpgradeTrack,
        level: u32,
        config: &EconomyConfig,
    ) -> Result<(), FarmError> {
        match track {
            UpgradeTrack::Storage => self.storage_level = level,
            UpgradeTrack::Quality => self.quality_level = level,
            UpgradeTrack::Speed => {
                self.efficiency_pct = config
                    .efficiency_pct(level)
                    .ok_or(FarmError::ArithmeticOverflow)?;
                self.speed_level = level;
            }
        }
        Ok(())
    }

    /// Storage capacity at the current level and storage upgrades.
    ///
    /// # Errors
    ///
    /// Returns [`FarmError::ArithmeticOverflow`] if the capacity overflows.
    pub fn capacity(&self, def: &FarmTypeDef, config: &EconomyConfig) -> Result<u32, FarmError> {
        config
            .storage_capacity(def.storage_capacity, self.level, self.storage_level)
            .ok_or(FarmError::ArithmeticOverflow)
    }

    /// Total units in storage.
    pub fn stored(&self) -> u32 {
        total_load(&self.storage).unwrap_or(u32::MAX)
    }

    /// Units stored in one slot.
    pub fn stored_in(&self, key: &StorageKey) -> u32 {
        self.storage.get(key).copied().unwrap_or(0)
    }

    /// When the current growth cycle completes.
    ///
    /// Returns `None` if the ready time overflows (the farm never becomes ready).
    pub fn ready_at(&self, def: &FarmTypeDef) -> Option<DateTime<Utc>> {
        growth::ready_at(self.last_harvest, def.base_growth_secs, self.efficiency_pct)
    }

    /// Remove up to `quantity` units from a slot and return how many were taken.
    pub fn take_stored(&mut self, key: &StorageKey, quantity: u32) -> u32 {
        let held = self.stored_in(key);
        let taken = held.min(quantity);
        let remaining = held.saturating_sub(taken);
        if remaining == 0 {
            self.storage.remove(key);
        } else {
            self.storage.insert(key.clone(), remaining);
        }
        taken
    }

    /// Put back units previously taken with [`take_stored`](Self::take_stored).
    pub fn return_stored(&mut self, key: &StorageKey, quantity: u32) {
        if quantity == 0 {
            return;
        }
        let slot = self.storage.entry(key.clone()).or_insert(0);
        *slot = slot.saturating_add(quantity);
    }

    /// Read-only view for the presentation layer.
    pub fn snapshot(&self, def: &FarmTypeDef, config: &EconomyConfig) -> FarmSnapshot {
        FarmSnapshot {
            owner: self.owner,
            farm_type: self.key.farm_type.clone(),
            index: self.key.index,
            level: self.level,
            experience: self.experience,
            efficiency_pct: self.efficiency_pct,
            storage_level: self.storage_level,
            speed_level: self.speed_level,
            quality_level: self.quality_level,
            capacity: self.capacity(def, config).unwrap_or(u32::MAX),
            stored: self.stored(),
            last_harvest: self.last_harvest,
            ready_at: self.ready_at(def).unwrap_or(DateTime::<Utc>::MAX_UTC),
            location: self.location,
            storage: self
                .storage
                .iter()
                .filter(|(_, qty)| **qty > 0)
                .map(|(key, qty)| LedgerSlot {
                    key: key.clone(),
                    quantity: *qty,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use plantation_types::Tier;
    use plantation_world::Catalog;

    use super::*;

    fn berry_def() -> FarmTypeDef {
        Catalog::default_catalog()
            .into_iter()
            .find(|d| d.id.as_str() == "berry_orchard")
            .unwrap_or_else(|| panic!("berry_orchard missing"))
    }

    fn instance() -> FarmInstance {
        FarmInstance::new(
            OwnerId::new(),
            FarmKey::new("berry_orchard", 1),
            WorldPos::default(),
            Utc::now(),
        )
    }

    #[test]
    fn new_instance_defaults() {
        let farm = instance();
        assert_eq!(farm.level, 1);
        assert_eq!(farm.experience, 0);
        assert_eq!(farm.efficiency_pct, 100);
        assert_eq!(farm.stored(), 0);
    }

    #[test]
    fn ready_at_uses_efficiency() {
        let def = berry_def();
        let mut farm = instance();
        let base = farm.ready_at(&def);
        assert_eq!(base, Some(farm.last_harvest + TimeDelta::seconds(300)));

        let cfg = EconomyConfig::default();
        let _ = farm.set_track_level(UpgradeTrack::Speed, 1, &cfg);
        assert_eq!(farm.efficiency_pct, 125);
        assert_eq!(
            farm.ready_at(&def),
            Some(farm.last_harvest + TimeDelta::seconds(240))
        );
    }

    #[test]
    fn take_and_return_stored() {
        let mut farm = instance();
        let key = StorageKey::new("wild_berry", Tier::MIN);
        farm.storage.insert(key.clone(), 10);
        assert_eq!(farm.take_stored(&key, 4), 4);
        assert_eq!(farm.take_stored(&key, 100), 6);
        assert!(farm.storage.is_empty());
        farm.return_stored(&key, 2);
        assert_eq!(farm.stored_in(&key), 2);
    }

    #[test]
    fn snapshot_reflects_state() {
        let def = berry_def();
        let cfg = EconomyConfig::default();
        let mut farm = instance();
        farm.storage.insert(StorageKey::new("wild_berry", Tier::MIN), 3);
        let snap = farm.snapshot(&def, &cfg);
        assert_eq!(snap.capacity, 500);
        assert_eq!(snap.stored, 3);
        assert_eq!(snap.storage.len(), 1);
        assert_eq!(snap.index, 1);
    }

    #[test]
    fn key_display() {
        assert_eq!(FarmKey::new("wheat_field", 3).to_string(), "wheat_field#3");
    }
}
