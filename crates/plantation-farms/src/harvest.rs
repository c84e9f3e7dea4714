//! The harvest engine.
//!
//! A harvest evaluates the farm type's drop table exactly once per completed
//! growth cycle. Growth is lazy: readiness is computed from the last-harvest
//! timestamp at call time, and missed cycles are never back-filled.
//!
//! # Drop rolls
//!
//! Every drop-table entry rolls independently. A roll is a uniform integer
//! in `[0, 10000)` basis points and succeeds when it falls below
//!
//! ```text
//! base_rate% * 100 * (1 + level_bonus * (level - 1)) * (1 + quality_bonus * quality)
//! ```
//!
//! Each success adds one unit to the entry's `(material, tier)` slot and
//! grants `experience_per_tier * tier` experience. Successes that arrive
//! after storage has filled are discarded and counted.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use plantation_types::{FarmTypeDef, HarvestDrop, HarvestOutcome, HarvestResult};

use crate::config::EconomyConfig;
use crate::error::FarmError;
use crate::instance::FarmInstance;

/// Size of the roll space in basis points.
const ROLL_SPACE_BP: u32 = 10_000;

/// Harvest a farm at `now`.
///
/// Returns [`HarvestOutcome::NotReady`] or [`HarvestOutcome::StorageFull`]
/// without touching the instance if a precondition fails. Otherwise the drop
/// table is evaluated, storage and experience are updated, and
/// `last_harvest` becomes `now`.
///
/// # Errors
///
/// Returns [`FarmError::ArithmeticOverflow`] if a capacity, threshold,
/// storage or experience computation overflows. The instance is unchanged.
pub fn harvest(
    farm: &mut FarmInstance,
    def: &FarmTypeDef,
    config: &EconomyConfig,
    now: DateTime<Utc>,
    rng: &mut impl rand::Rng,
) -> Result<HarvestOutcome, FarmError> {
    let Some(ready_at) = farm.ready_at(def) else {
        return Ok(HarvestOutcome::NotReady {
            ready_at: DateTime::<Utc>::MAX_UTC,
        });
    };
    if now < ready_at {
        return Ok(HarvestOutcome::NotReady { ready_at });
    }

    let capacity = farm.capacity(def, config)?;
    let mut stored = farm.stored();
    if stored >= capacity {
        tracing::debug!(
            owner = %farm.owner,
            farm = %farm.key,
            capacity,
            "Harvest skipped, storage full"
        );
        return Ok(HarvestOutcome::StorageFull { capacity });
    }

    let mut drops: Vec<HarvestDrop> = Vec::new();
    let mut discarded: u32 = 0;
    let mut experience_gained: u64 = 0;

    for entry in &def.drops {
        let threshold = config
            .drop_threshold_bp(entry.base_rate, farm.level, farm.quality_level)
            .ok_or(FarmError::ArithmeticOverflow)?;
        let roll: u32 = rng.random_range(0..ROLL_SPACE_BP);
        if Decimal::from(roll) >= threshold {
            continue;
        }
        if stored >= capacity {
            discarded = discarded.saturating_add(1);
            continue;
        }

        let key = entry.storage_key();
        stored = stored.checked_add(1).ok_or(FarmError::ArithmeticOverflow)?;

        let xp = config
            .experience_per_tier
            .checked_mul(u64::from(entry.tier.get()))
            .ok_or(FarmError::ArithmeticOverflow)?;
        experience_gained = experience_gained
            .checked_add(xp)
            .ok_or(FarmError::ArithmeticOverflow)?;

        match drops.iter_mut().find(|d| d.key == key) {
            Some(existing) => existing.delta = existing.delta.saturating_add(1),
            None => drops.push(HarvestDrop { key, delta: 1 }),
        }
    }

    // Every fallible step runs before the farm is touched.
    let experience = farm
        .experience
        .checked_add(experience_gained)
        .ok_or(FarmError::ArithmeticOverflow)?;
    let slots = drops
        .iter()
        .map(|d| {
            let current = farm.storage.get(&d.key).copied().unwrap_or(0);
            current
                .checked_add(d.delta)
                .map(|total| (d.key.clone(), total))
                .ok_or(FarmError::ArithmeticOverflow)
        })
        .collect::<Result<Vec<_>, _>>()?;

    farm.storage.extend(slots);
    farm.experience = experience;
    // `now >= ready_at >= last_harvest`, so the clock only moves forward.
    farm.last_harvest = now;

    tracing::debug!(
        owner = %farm.owner,
        farm = %farm.key,
        slots = drops.len(),
        discarded,
        experience_gained,
        "Harvest evaluated"
    );

    Ok(HarvestOutcome::Harvested(HarvestResult {
        drops,
        discarded,
        experience_gained,
        harvested_at: now,
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use rust_decimal_macros::dec;

    use plantation_types::{MaterialDrop, OwnerId, StorageKey, Tier, WorldPos};
    use plantation_world::Catalog;

    use super::*;
    use crate::instance::FarmKey;

    fn epoch() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default()
    }

    fn def(id: &str) -> FarmTypeDef {
        Catalog::default_catalog()
            .into_iter()
            .find(|d| d.id.as_str() == id)
            .unwrap_or_else(|| panic!("{id} missing"))
    }

    /// Berry orchard with zero growth time and a single 70% tier-1 drop.
    fn instant_berry() -> FarmTypeDef {
        let mut d = def("berry_orchard");
        d.base_growth_secs = 0;
        d.storage_capacity = 100_000;
        d.drops = vec![MaterialDrop {
            material: "wild_berry".into(),
            tier: Tier::MIN,
            base_rate: dec!(70),
            sell_price: dec!(2),
        }];
        d
    }

    fn farm(def: &FarmTypeDef, now: DateTime<Utc>) -> FarmInstance {
        FarmInstance::new(
            OwnerId::new(),
            FarmKey::new(def.id.clone(), 1),
            WorldPos::default(),
            now,
        )
    }

    #[test]
    fn not_ready_before_growth_completes() {
        let d = def("berry_orchard");
        let cfg = EconomyConfig::default();
        let mut f = farm(&d, epoch());
        let mut rng = SmallRng::seed_from_u64(1);
        let outcome = harvest(&mut f, &d, &cfg, epoch() + TimeDelta::seconds(299), &mut rng);
        assert!(matches!(outcome, Ok(HarvestOutcome::NotReady { .. })));
        assert_eq!(f.last_harvest, epoch());
    }

    #[test]
    fn second_harvest_at_same_instant_yields_nothing() {
        let d = def("berry_orchard");
        let cfg = EconomyConfig::default();
        let mut f = farm(&d, epoch());
        let mut rng = SmallRng::seed_from_u64(7);
        let now = epoch() + TimeDelta::seconds(300);

        let first = harvest(&mut f, &d, &cfg, now, &mut rng);
        assert!(first.as_ref().is_ok_and(HarvestOutcome::is_harvested));
        let stored = f.stored();

        let second = harvest(&mut f, &d, &cfg, now, &mut rng);
        assert!(second.as_ref().is_ok_and(|o| o.drops().is_empty()));
        assert_eq!(f.stored(), stored);
    }

    #[test]
    fn missed_cycles_are_not_back_filled() {
        let d = def("berry_orchard");
        let cfg = EconomyConfig::default();
        let mut f = farm(&d, epoch());
        let mut rng = SmallRng::seed_from_u64(3);
        // Ten cycles elapsed, still one evaluation.
        let now = epoch() + TimeDelta::seconds(3000);
        let outcome = harvest(&mut f, &d, &cfg, now, &mut rng);
        let units = match outcome {
            Ok(HarvestOutcome::Harvested(r)) => r.total_units(),
            _ => u64::MAX,
        };
        assert!(units <= u64::try_from(d.drops.len()).unwrap_or(0));
        assert_eq!(f.last_harvest, now);
    }

    #[test]
    fn full_storage_pauses_the_farm() {
        let d = def("berry_orchard");
        let cfg = EconomyConfig::default();
        let mut f = farm(&d, epoch());
        f.storage.insert(StorageKey::new("wild_berry", Tier::MIN), 500);
        let mut rng = SmallRng::seed_from_u64(9);
        let outcome = harvest(&mut f, &d, &cfg, epoch() + TimeDelta::days(1), &mut rng);
        assert!(matches!(
            outcome,
            Ok(HarvestOutcome::StorageFull { capacity: 500 })
        ));
        assert_eq!(f.last_harvest, epoch());
        assert_eq!(f.stored(), 500);
    }

    #[test]
    fn overflow_drops_are_discarded() {
        let mut d = def("berry_orchard");
        d.base_growth_secs = 0;
        d.storage_capacity = 1;
        d.drops = vec![
            MaterialDrop {
                material: "wild_berry".into(),
                tier: Tier::MIN,
                base_rate: dec!(100),
                sell_price: dec!(0),
            },
            MaterialDrop {
                material: "sweet_berry".into(),
                tier: Tier::MIN,
                base_rate: dec!(100),
                sell_price: dec!(0),
            },
        ];
        let cfg = EconomyConfig::default();
        let mut f = farm(&d, epoch());
        let mut rng = SmallRng::seed_from_u64(11);
        let outcome = harvest(&mut f, &d, &cfg, epoch(), &mut rng);
        match outcome {
            Ok(HarvestOutcome::Harvested(r)) => {
                assert_eq!(r.total_units(), 1);
                assert_eq!(r.discarded, 1);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(f.stored(), 1);
    }

    #[test]
    fn storage_never_exceeds_capacity() {
        let mut d = def("wheat_field");
        d.base_growth_secs = 0;
        d.storage_capacity = 17;
        let cfg = EconomyConfig::default();
        let mut f = farm(&d, epoch());
        let mut rng = SmallRng::seed_from_u64(5);
        for step in 0..200 {
            let now = epoch() + TimeDelta::seconds(step);
            let _ = harvest(&mut f, &d, &cfg, now, &mut rng);
            assert!(f.stored() <= 17);
        }
        assert_eq!(f.stored(), 17);
    }

    #[test]
    fn seventy_percent_drop_lands_within_three_sigma() {
        let d = instant_berry();
        let cfg = EconomyConfig::default();
        let mut f = farm(&d, epoch());
        let mut rng = SmallRng::seed_from_u64(42);
        for step in 0..1000 {
            let _ = harvest(&mut f, &d, &cfg, epoch() + TimeDelta::seconds(step), &mut rng);
        }
        // n = 1000, p = 0.7: mean 700, sigma ~= 14.5
        let total = f.stored();
        assert!((657..=743).contains(&total), "total {total}");
    }

    #[test]
    fn zero_and_full_rates_are_deterministic() {
        let mut d = instant_berry();
        if let Some(entry) = d.drops.first_mut() {
            entry.base_rate = dec!(0);
        }
        let cfg = EconomyConfig::default();
        let mut f = farm(&d, epoch());
        let mut rng = SmallRng::seed_from_u64(0);
        for step in 0..50 {
            let _ = harvest(&mut f, &d, &cfg, epoch() + TimeDelta::seconds(step), &mut rng);
        }
        assert_eq!(f.stored(), 0);

        if let Some(entry) = d.drops.first_mut() {
            entry.base_rate = dec!(100);
        }
        for step in 50..100 {
            let _ = harvest(&mut f, &d, &cfg, epoch() + TimeDelta::seconds(step), &mut rng);
        }
        assert_eq!(f.stored(), 50);
    }

    #[test]
    fn experience_scales_with_tier() {
        let mut d = instant_berry();
        d.drops = vec![MaterialDrop {
            material: "golden_berry".into(),
            tier: Tier::MAX,
            base_rate: dec!(100),
            sell_price: dec!(0),
        }];
        let cfg = EconomyConfig::default();
        let mut f = farm(&d, epoch());
        let mut rng = SmallRng::seed_from_u64(0);
        let outcome = harvest(&mut f, &d, &cfg, epoch(), &mut rng);
        assert!(matches!(
            outcome,
            Ok(HarvestOutcome::Harvested(ref r)) if r.experience_gained == 30
        ));
        assert_eq!(f.experience, 30);
    }

    #[test]
    fn overflowing_experience_leaves_farm_untouched() {
        let mut d = instant_berry();
        d.drops = vec![MaterialDrop {
            material: "wild_berry".into(),
            tier: Tier::MIN,
            base_rate: dec!(100),
            sell_price: dec!(0),
        }];
        let cfg = EconomyConfig::default();
        let mut f = farm(&d, epoch());
        f.experience = u64::MAX;
        f.storage.insert(StorageKey::new("wild_berry", Tier::MIN), 4);
        let before = f.clone();

        let mut rng = SmallRng::seed_from_u64(0);
        let outcome = harvest(&mut f, &d, &cfg, epoch() + TimeDelta::seconds(5), &mut rng);
        assert!(matches!(outcome, Err(FarmError::ArithmeticOverflow)));
        assert_eq!(f, before);
    }

    #[test]
    fn speed_upgrade_shortens_the_cycle() {
        let d = def("berry_orchard");
        let cfg = EconomyConfig::default();
        let mut f = farm(&d, epoch());
        let before = f.ready_at(&d).map(|t| t - f.last_harvest);
        let _ = f.set_track_level(plantation_types::UpgradeTrack::Speed, 1, &cfg);
        let after = f.ready_at(&d).map(|t| t - f.last_harvest);
        assert!(after < before);
    }
}
