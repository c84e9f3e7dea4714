//! Player inventory capability.
//!
//! The farm system only ever asks an inventory three things: how much of a
//! material the player carries, to remove some of it, and to take in
//! collected materials. `add` never fails; whatever does not fit is handed
//! back as the returned overflow so the caller can keep it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use plantation_types::{OwnerId, StorageKey};

use crate::error::LedgerError;

/// Access to a player's carried materials.
pub trait PlayerInventory: Send + Sync {
    /// Quantity of `key` the owner carries.
    fn quantity(&self, owner: OwnerId, key: &StorageKey) -> u32;

    /// Remove exactly `quantity` units.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientMaterial`] if the owner carries
    /// fewer units; nothing is removed in that case.
    fn remove(&self, owner: OwnerId, key: &StorageKey, quantity: u32) -> Result<(), LedgerError>;

    /// Add up to `quantity` units and return the number that did not fit.
    fn add(&self, owner: OwnerId, key: &StorageKey, quantity: u32) -> u32;
}

/// Sum of every slot in a carried-materials map.
///
/// Returns `None` if the sum overflows `u32`.
pub fn total_load(items: &BTreeMap<StorageKey, u32>) -> Option<u32> {
    items.values().try_fold(0_u32, |acc, qty| acc.checked_add(*qty))
}

// ---------------------------------------------------------------------------
// InMemoryInventory
// ---------------------------------------------------------------------------

/// Process-local inventory with a per-owner unit capacity.
#[derive(Debug)]
pub struct InMemoryInventory {
    capacity: u32,
    items: Mutex<HashMap<OwnerId, BTreeMap<StorageKey, u32>>>,
}

impl InMemoryInventory {
    /// Create an inventory where each owner can carry `capacity` units in total.
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            items: Mutex::new(HashMap::new()),
        }
    }

    /// Total units carried by `owner`.
    pub fn load(&self, owner: OwnerId) -> u32 {
        let Ok(items) = self.items.lock() else {
            return 0;
        };
        items.get(&owner).and_then(total_load).unwrap_or(0)
    }
}

impl PlayerInventory for InMemoryInventory {
    fn quantity(&self, owner: OwnerId, key: &StorageKey) -> u32 {
        let Ok(items) = self.items.lock() else {
            return 0;
        };
        items
            .get(&owner)
            .and_then(|carried| carried.get(key))
            .copied()
            .unwrap_or(0)
    }

    fn remove(&self, owner: OwnerId, key: &StorageKey, quantity: u32) -> Result<(), LedgerError> {
        let Ok(mut items) = self.items.lock() else {
            return Err(LedgerError::Refused("inventory lock poisoned".to_owned()));
        };
        let carried = items.entry(owner).or_default();
        let current = carried.get(key).copied().unwrap_or(0);
        let remaining =
            current
                .checked_sub(quantity)
                .ok_or_else(|| LedgerError::InsufficientMaterial {
                    owner,
                    key: key.clone(),
                    requested: u64::from(quantity),
                    available: u64::from(current),
                })?;
        if remaining == 0 {
            carried.remove(key);
        } else {
            carried.insert(key.clone(), remaining);
        }
        Ok(())
    }

    fn add(&self, owner: OwnerId, key: &StorageKey, quantity: u32) -> u32 {
        let Ok(mut items) = self.items.lock() else {
            return quantity;
        };
        let carried = items.entry(owner).or_default();
        let load = total_load(carried).unwrap_or(u32::MAX);
        let room = self.capacity.saturating_sub(load);
        let accepted = quantity.min(room);
        if accepted > 0 {
            let slot = carried.entry(key.clone()).or_insert(0);
            // Bounded by capacity, so this cannot overflow.
            *slot = slot.saturating_add(accepted);
        }
        quantity.saturating_sub(accepted)
    }
}

#[cfg(test)]
mod tests {
    use plantation_types::Tier;

    use super::*;

    fn berry() -> StorageKey {
        StorageKey::new("wild_berry", Tier::MIN)
    }

    #[test]
    fn add_within_capacity() {
        let inv = InMemoryInventory::new(100);
        let owner = OwnerId::new();
        assert_eq!(inv.add(owner, &berry(), 40), 0);
        assert_eq!(inv.quantity(owner, &berry()), 40);
        assert_eq!(inv.load(owner), 40);
    }

    #[test]
    fn add_returns_overflow() {
        let inv = InMemoryInventory::new(50);
        let owner = OwnerId::new();
        assert_eq!(inv.add(owner, &berry(), 30), 0);
        let other = StorageKey::new("wheat", Tier::MIN);
        assert_eq!(inv.add(owner, &other, 30), 10);
        assert_eq!(inv.quantity(owner, &other), 20);
        assert_eq!(inv.load(owner), 50);
    }

    #[test]
    fn remove_exact_or_nothing() {
        let inv = InMemoryInventory::new(100);
        let owner = OwnerId::new();
        let _ = inv.add(owner, &berry(), 5);
        assert!(inv.remove(owner, &berry(), 6).is_err());
        assert_eq!(inv.quantity(owner, &berry()), 5);
        assert!(inv.remove(owner, &berry(), 5).is_ok());
        assert_eq!(inv.quantity(owner, &berry()), 0);
    }

    #[test]
    fn total_load_sums_slots() {
        let mut items = BTreeMap::new();
        items.insert(berry(), 3);
        items.insert(StorageKey::new("wheat", Tier::MAX), 4);
        assert_eq!(total_load(&items), Some(7));
        items.insert(StorageKey::new("wheat", Tier::MIN), u32::MAX);
        assert_eq!(total_load(&items), None);
    }
}
