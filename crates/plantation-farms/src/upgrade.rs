//! The upgrade economy: track upgrades and instance leveling.
//!
//! # Tracks
//!
//! Storage, speed and quality each run from level 0 to
//! `max_track_level`. Raising a track costs currency and materials priced by
//! the track's [`UpgradeCurve`](crate::config::UpgradeCurve).
//!
//! Applying an upgrade is all-or-nothing. Affordability is checked first;
//! then currency is withdrawn and materials are debited lowest tier first,
//! each from the player inventory before the external pool. If any
//! collaborator refuses part-way, every debit already made is restored
//! before the error is returned.
//!
//! # Leveling
//!
//! Harvests accumulate experience. [`level_up`] spends
//! `required_experience(level + 1)` to raise the instance one level.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use plantation_ledger::Collaborators;
use plantation_types::{
    MaterialDebit, MaterialRequirement, MaterialSource, StorageKey, Tier, UpgradeCost,
    UpgradeReceipt, UpgradeTrack,
};

use crate::config::EconomyConfig;
use crate::error::{FarmError, LevelKind};
use crate::instance::FarmInstance;

// ---------------------------------------------------------------------------
// Pricing
// ---------------------------------------------------------------------------

/// Price of raising `track` one level on `farm`.
///
/// # Errors
///
/// Returns [`FarmError::MaxLevelReached`] if the track is already at
/// `max_track_level`, or [`FarmError::ArithmeticOverflow`].
pub fn upgrade_cost(
    farm: &FarmInstance,
    track: UpgradeTrack,
    config: &EconomyConfig,
) -> Result<UpgradeCost, FarmError> {
    let level = farm.track_level(track);
    if level >= config.max_track_level {
        return Err(FarmError::MaxLevelReached {
            track: LevelKind::Track(track),
            max: config.max_track_level,
        });
    }
    let next_level = level.checked_add(1).ok_or(FarmError::ArithmeticOverflow)?;
    let curve = config.curve(track);
    let currency = curve
        .currency_at(level)
        .ok_or(FarmError::ArithmeticOverflow)?;

    // Ordered by (tier, material); duplicate slots are merged.
    let mut merged: BTreeMap<(Tier, StorageKey), u32> = BTreeMap::new();
    for material in &curve.materials {
        let quantity = material
            .quantity_at(level)
            .ok_or(FarmError::ArithmeticOverflow)?;
        if quantity == 0 {
            continue;
        }
        let slot = merged
            .entry((material.tier, material.storage_key()))
            .or_insert(0);
        *slot = slot
            .checked_add(quantity)
            .ok_or(FarmError::ArithmeticOverflow)?;
    }
    let materials = merged
        .into_iter()
        .map(|((_, key), quantity)| MaterialRequirement { key, quantity })
        .collect();

    Ok(UpgradeCost {
        track,
        next_level,
        currency,
        materials,
    })
}

// ---------------------------------------------------------------------------
// Applying upgrades
// ---------------------------------------------------------------------------

/// Raise `track` one level, charging `farm.owner` through the collaborators.
///
/// # Errors
///
/// - [`FarmError::MaxLevelReached`] if the track is maxed.
/// - [`FarmError::InsufficientFunds`] if the currency ledger cannot cover the cost.
/// - [`FarmError::InsufficientMaterials`] if inventory and pool together
///   cannot cover a requirement.
/// - [`FarmError::Collaborator`] if a collaborator refuses a debit; all
///   earlier debits have been restored.
pub fn apply_upgrade(
    farm: &mut FarmInstance,
    track: UpgradeTrack,
    config: &EconomyConfig,
    collab: Collaborators<'_>,
) -> Result<UpgradeReceipt, FarmError> {
    let cost = upgrade_cost(farm, track, config)?;
    let owner = farm.owner;

    if !collab.currency.has(owner, cost.currency) {
        return Err(FarmError::InsufficientFunds {
            required: cost.currency,
            available: collab.currency.balance(owner),
        });
    }
    for req in &cost.materials {
        let in_inventory = u64::from(collab.inventory.quantity(owner, &req.key));
        let in_pool = collab.pool.quantity(owner, &req.key);
        let available = in_inventory.saturating_add(in_pool);
        if available < u64::from(req.quantity) {
            return Err(FarmError::InsufficientMaterials {
                key: req.key.clone(),
                required: req.quantity,
                available,
            });
        }
    }

    let mut journal = DebitJournal::new(owner);
    if let Err(e) = debit_all(&cost, collab, &mut journal) {
        journal.rollback(collab);
        tracing::warn!(
            owner = %owner,
            farm = %farm.key,
            track = %track,
            error = %e,
            "Upgrade refused mid-way, debits restored"
        );
        return Err(e);
    }

    if let Err(e) = farm.set_track_level(track, cost.next_level, config) {
        journal.rollback(collab);
        return Err(e);
    }

    tracing::debug!(
        owner = %owner,
        farm = %farm.key,
        track = %track,
        level = cost.next_level,
        "Upgrade applied"
    );

    Ok(UpgradeReceipt {
        track,
        new_level: cost.next_level,
        currency_spent: journal.currency,
        debits: journal.debits,
    })
}

/// Withdraw the currency and every material, recording each step.
fn debit_all(
    cost: &UpgradeCost,
    collab: Collaborators<'_>,
    journal: &mut DebitJournal,
) -> Result<(), FarmError> {
    let owner = journal.owner;
    if cost.currency > Decimal::ZERO {
        collab.currency.withdraw(owner, cost.currency)?;
        journal.currency = cost.currency;
    }

    for req in &cost.materials {
        let held = collab.inventory.quantity(owner, &req.key);
        let from_inventory = held.min(req.quantity);
        if from_inventory > 0 {
            collab.inventory.remove(owner, &req.key, from_inventory)?;
            journal.debits.push(MaterialDebit {
                key: req.key.clone(),
                quantity: from_inventory,
                source: MaterialSource::Inventory,
            });
        }

        let from_pool = req.quantity.saturating_sub(from_inventory);
        if from_pool > 0 {
            let delta = i64::from(from_pool)
                .checked_neg()
                .ok_or(FarmError::ArithmeticOverflow)?;
            collab.pool.adjust_quantity(owner, &req.key, delta)?;
            journal.debits.push(MaterialDebit {
                key: req.key.clone(),
                quantity: from_pool,
                source: MaterialSource::Pool,
            });
        }
    }
    Ok(())
}

/// Debits made so far by one upgrade, so they can be undone.
struct DebitJournal {
    owner: plantation_types::OwnerId,
    currency: Decimal,
    debits: Vec<MaterialDebit>,
}

impl DebitJournal {
    const fn new(owner: plantation_types::OwnerId) -> Self {
        Self {
            owner,
            currency: Decimal::ZERO,
            debits: Vec::new(),
        }
    }

    /// Restore every recorded debit, newest first.
    fn rollback(&self, collab: Collaborators<'_>) {
        for debit in self.debits.iter().rev() {
            match debit.source {
                MaterialSource::Inventory => {
                    let leftover = collab.inventory.add(self.owner, &debit.key, debit.quantity);
                    if leftover > 0 {
                        tracing::warn!(
                            owner = %self.owner,
                            key = %debit.key,
                            leftover,
                            "Inventory could not take back all refunded units"
                        );
                    }
                }
                MaterialSource::Pool => {
                    let restored = collab.pool.adjust_quantity(
                        self.owner,
                        &debit.key,
                        i64::from(debit.quantity),
                    );
                    if let Err(e) = restored {
                        tracing::warn!(owner = %self.owner, key = %debit.key, error = %e, "Pool refund failed");
                    }
                }
            }
        }
        if self.currency > Decimal::ZERO {
            if let Err(e) = collab.currency.deposit(self.owner, self.currency) {
                tracing::warn!(owner = %self.owner, error = %e, "Currency refund failed");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Leveling
// ---------------------------------------------------------------------------

/// Spend experience to raise the instance one level. Returns the new level.
///
/// # Errors
///
/// Returns [`FarmError::MaxLevelReached`] at `max_level`, or
/// [`FarmError::InsufficientExperience`] if the requirement is not met.
pub fn level_up(farm: &mut FarmInstance, config: &EconomyConfig) -> Result<u32, FarmError> {
    if farm.level >= config.max_level {
        return Err(FarmError::MaxLevelReached {
            track: LevelKind::Level,
            max: config.max_level,
        });
    }
    let next = farm.level.checked_add(1).ok_or(FarmError::ArithmeticOverflow)?;
    let required = config
        .required_experience(next)
        .ok_or(FarmError::ArithmeticOverflow)?;
    let remaining =
        farm.experience
            .checked_sub(required)
            .ok_or(FarmError::InsufficientExperience {
                required,
                available: farm.experience,
            })?;
    farm.experience = remaining;
    farm.level = next;
    tracing::debug!(owner = %farm.owner, farm = %farm.key, level = next, "Farm leveled up");
    Ok(next)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
