//! External material pool capability.
//!
//! Some deployments keep a shared stockpile of materials outside the player's
//! carried inventory. Upgrades draw on it after the inventory is exhausted.
//! When no pool exists, [`NoMaterialPool`] reports zero of everything and
//! refuses every change.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use plantation_types::{OwnerId, StorageKey};

use crate::error::LedgerError;

/// Access to an owner's external material stockpile.
pub trait MaterialPool: Send + Sync {
    /// Quantity of `key` available to `owner`.
    fn quantity(&self, owner: OwnerId, key: &StorageKey) -> u64;

    /// Apply a signed change and return the new quantity.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientMaterial`] if a negative change
    /// exceeds the held quantity, or [`LedgerError::PoolUnavailable`] if the
    /// pool cannot be changed.
    fn adjust_quantity(&self, owner: OwnerId, key: &StorageKey, delta: i64)
    -> Result<u64, LedgerError>;
}

/// The pool used when none is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMaterialPool;

impl MaterialPool for NoMaterialPool {
    fn quantity(&self, _owner: OwnerId, _key: &StorageKey) -> u64 {
        0
    }

    fn adjust_quantity(
        &self,
        _owner: OwnerId,
        _key: &StorageKey,
        delta: i64,
    ) -> Result<u64, LedgerError> {
        if delta == 0 {
            Ok(0)
        } else {
            Err(LedgerError::PoolUnavailable)
        }
    }
}

// ---------------------------------------------------------------------------
// InMemoryMaterialPool
// ---------------------------------------------------------------------------

/// Process-local material pool.
#[derive(Debug, Default)]
pub struct InMemoryMaterialPool {
    stock: Mutex<HashMap<OwnerId, BTreeMap<StorageKey, u64>>>,
}

impl InMemoryMaterialPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }
}

impl MaterialPool for InMemoryMaterialPool {
    fn quantity(&self, owner: OwnerId, key: &StorageKey) -> u64 {
        let Ok(stock) = self.stock.lock() else {
            return 0;
        };
        stock
            .get(&owner)
            .and_then(|slots| slots.get(key))
            .copied()
            .unwrap_or(0)
    }

    fn adjust_quantity(
        &self,
        owner: OwnerId,
        key: &StorageKey,
        delta: i64,
    ) -> Result<u64, LedgerError> {
        let Ok(mut stock) = self.stock.lock() else {
            return Err(LedgerError::Refused("material pool lock poisoned".to_owned()));
        };
        let slots = stock.entry(owner).or_default();
        let current = slots.get(key).copied().unwrap_or(0);
        let magnitude = delta.unsigned_abs();
        let updated = if delta.is_negative() {
            current
                .checked_sub(magnitude)
                .ok_or_else(|| LedgerError::InsufficientMaterial {
                    owner,
                    key: key.clone(),
                    requested: magnitude,
                    available: current,
                })?
        } else {
            current
                .checked_add(magnitude)
                .ok_or(LedgerError::ArithmeticOverflow)?
        };
        if updated == 0 {
            slots.remove(key);
        } else {
            slots.insert(key.clone(), updated);
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use plantation_types::Tier;

    use super::*;

    fn shard() -> StorageKey {
        StorageKey::new("crystal_shard", Tier::MIN)
    }

    #[test]
    fn null_pool_is_empty_and_refuses_changes() {
        let pool = NoMaterialPool;
        let owner = OwnerId::new();
        assert_eq!(pool.quantity(owner, &shard()), 0);
        assert!(matches!(
            pool.adjust_quantity(owner, &shard(), -1),
            Err(LedgerError::PoolUnavailable)
        ));
        assert_eq!(pool.adjust_quantity(owner, &shard(), 0).ok(), Some(0));
    }

    #[test]
    fn adjust_up_and_down() {
        let pool = InMemoryMaterialPool::new();
        let owner = OwnerId::new();
        assert_eq!(pool.adjust_quantity(owner, &shard(), 12).ok(), Some(12));
        assert_eq!(pool.adjust_quantity(owner, &shard(), -5).ok(), Some(7));
        assert_eq!(pool.quantity(owner, &shard()), 7);
    }

    #[test]
    fn overdraw_leaves_quantity_unchanged() {
        let pool = InMemoryMaterialPool::new();
        let owner = OwnerId::new();
        let _ = pool.adjust_quantity(owner, &shard(), 3);
        assert!(pool.adjust_quantity(owner, &shard(), -4).is_err());
        assert_eq!(pool.quantity(owner, &shard()), 3);
    }

    #[test]
    fn tiers_are_separate_slots() {
        let pool = InMemoryMaterialPool::new();
        let owner = OwnerId::new();
        let t2 = StorageKey::new("crystal_shard", Tier::MAX);
        let _ = pool.adjust_quantity(owner, &shard(), 3);
        assert_eq!(pool.quantity(owner, &t2), 0);
    }
}
