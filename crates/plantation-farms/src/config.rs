//! Economy coefficients and upgrade cost curves.
//!
//! Everything that shapes progression is data: the leveling curve, the
//! per-level and per-upgrade bonuses, and one [`UpgradeCurve`] per track.
//! [`EconomyConfig::default`] carries the built-in balance; the server can
//! override any part of it from YAML.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use plantation_types::{MaterialId, StorageKey, Tier, UpgradeTrack};
use plantation_world::BASE_EFFICIENCY_PCT;

use crate::error::FarmError;

/// Percent denominator.
const PCT: u32 = 100;

// ---------------------------------------------------------------------------
// Upgrade curves
// ---------------------------------------------------------------------------

/// One material requirement of an upgrade track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurveMaterial {
    /// Required material.
    pub material: MaterialId,
    /// Required tier.
    pub tier: Tier,
    /// Quantity at current level 0.
    pub base_quantity: u32,
    /// Additional quantity per current level.
    #[serde(default)]
    pub per_level: u32,
}

impl CurveMaterial {
    /// The ledger slot this requirement draws from.
    pub fn storage_key(&self) -> StorageKey {
        StorageKey::new(self.material.clone(), self.tier)
    }

    /// Units required when the track is currently at `level`.
    pub fn quantity_at(&self, level: u32) -> Option<u32> {
        self.per_level
            .checked_mul(level)
            .and_then(|extra| self.base_quantity.checked_add(extra))
    }
}

/// Cost curve of one upgrade track.
///
/// Taking the track from level `L` to `L + 1` costs
/// `base_cost * (100 + growth_pct)^L / 100^L` currency plus each
/// material's `base_quantity + per_level * L`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeCurve {
    /// Currency cost of the first upgrade.
    pub base_cost: Decimal,
    /// Compound growth of the currency cost per level, in percent.
    #[serde(default)]
    pub growth_pct: u32,
    /// Material requirements.
    #[serde(default)]
    pub materials: Vec<CurveMaterial>,
}

impl UpgradeCurve {
    /// Currency cost when the track is currently at `level`.
    pub fn currency_at(&self, level: u32) -> Option<Decimal> {
        let factor = Decimal::from(PCT.checked_add(self.growth_pct)?);
        let hundred = Decimal::from(PCT);
        let mut cost = self.base_cost;
        for _ in 0..level {
            cost = cost.checked_mul(factor)?.checked_div(hundred)?;
        }
        Some(cost.round_dp(2))
    }
}

// ---------------------------------------------------------------------------
// EconomyConfig
// ---------------------------------------------------------------------------

/// Progression and upgrade coefficients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    /// Highest instance level.
    pub max_level: u32,
    /// Highest level of each upgrade track.
    pub max_track_level: u32,
    /// Drop chance bonus per instance level above 1, in percent.
    pub level_bonus_pct: u32,
    /// Drop chance bonus per quality upgrade, in percent.
    pub quality_bonus_pct: u32,
    /// Efficiency bonus per speed upgrade, in percent.
    pub speed_bonus_pct: u32,
    /// Storage capacity gained per instance level above 1.
    pub storage_per_level: u32,
    /// Storage capacity gained per storage upgrade.
    pub storage_per_upgrade: u32,
    /// Experience granted per harvested unit, multiplied by its tier.
    pub experience_per_tier: u64,
    /// Linear term of the experience requirement.
    pub xp_base: u64,
    /// Step term of the experience requirement.
    pub xp_step: u64,
    /// Storage track cost curve.
    pub storage: UpgradeCurve,
    /// Speed track cost curve.
    pub speed: UpgradeCurve,
    /// Quality track cost curve.
    pub quality: UpgradeCurve,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            max_level: 10,
            max_track_level: 5,
            level_bonus_pct: 20,
            quality_bonus_pct: 15,
            speed_bonus_pct: 25,
            storage_per_level: 50,
            storage_per_upgrade: 100,
            experience_per_tier: 10,
            xp_base: 100,
            xp_step: 50,
            storage: UpgradeCurve {
                base_cost: Decimal::new(200, 0),
                growth_pct: 50,
                materials: vec![requirement("wheat", Tier::MIN, 20, 10)],
            },
            speed: UpgradeCurve {
                base_cost: Decimal::new(300, 0),
                growth_pct: 60,
                materials: vec![
                    requirement("wild_berry", Tier::MIN, 25, 10),
                    requirement("sweet_berry", tier(2), 5, 3),
                ],
            },
            quality: UpgradeCurve {
                base_cost: Decimal::new(400, 0),
                growth_pct: 75,
                materials: vec![
                    requirement("crystal_shard", Tier::MIN, 10, 5),
                    requirement("crystal_shard", tier(2), 2, 2),
                ],
            },
        }
    }
}

fn requirement(material: &str, tier: Tier, base_quantity: u32, per_level: u32) -> CurveMaterial {
    CurveMaterial {
        material: material.into(),
        tier,
        base_quantity,
        per_level,
    }
}

fn tier(value: u8) -> Tier {
    Tier::new(value).unwrap_or(Tier::MIN)
}

impl EconomyConfig {
    /// Check the configuration for values that would break progression.
    ///
    /// # Errors
    ///
    /// Returns [`FarmError::InvalidConfig`] describing the first problem.
    pub fn validate(&self) -> Result<(), FarmError> {
        if self.max_level == 0 {
            return Err(FarmError::InvalidConfig("max_level must be at least 1".to_owned()));
        }
        for track in UpgradeTrack::ALL {
            let curve = self.curve(track);
            if curve.base_cost.is_sign_negative() {
                return Err(FarmError::InvalidConfig(format!(
                    "{track} base_cost must not be negative"
                )));
            }
            for level in 0..self.max_track_level {
                if curve.currency_at(level).is_none()
                    || curve.materials.iter().any(|m| m.quantity_at(level).is_none())
                {
                    return Err(FarmError::InvalidConfig(format!(
                        "{track} cost overflows at level {level}"
                    )));
                }
            }
        }
        for level in 2..=self.max_level {
            if self.required_experience(level).is_none() {
                return Err(FarmError::InvalidConfig(format!(
                    "experience requirement overflows at level {level}"
                )));
            }
        }
        Ok(())
    }

    /// The cost curve of a track.
    pub const fn curve(&self, track: UpgradeTrack) -> &UpgradeCurve {
        match track {
            UpgradeTrack::Storage => &self.storage,
            UpgradeTrack::Speed => &self.speed,
            UpgradeTrack::Quality => &self.quality,
        }
    }

    /// Experience needed to reach `level`: `xp_base * L + xp_step * (L - 1)`.
    pub fn required_experience(&self, level: u32) -> Option<u64> {
        let l = u64::from(level);
        let linear = self.xp_base.checked_mul(l)?;
        let step = self.xp_step.checked_mul(l.checked_sub(1)?)?;
        linear.checked_add(step)
    }

    /// Efficiency percentage at a speed upgrade level.
    pub fn efficiency_pct(&self, speed_level: u32) -> Option<u32> {
        self.speed_bonus_pct
            .checked_mul(speed_level)?
            .checked_add(BASE_EFFICIENCY_PCT)
    }

    /// Storage capacity at an instance level and storage upgrade level.
    pub fn storage_capacity(&self, base: u32, level: u32, storage_level: u32) -> Option<u32> {
        let from_level = self
            .storage_per_level
            .checked_mul(level.saturating_sub(1))?;
        let from_upgrades = self.storage_per_upgrade.checked_mul(storage_level)?;
        base.checked_add(from_level)?.checked_add(from_upgrades)
    }

    /// Success threshold of a drop, in basis points out of 10 000.
    ///
    /// `base_rate% * 100 * (1 + level_bonus * (level - 1)) * (1 + quality_bonus * q)`.
    pub fn drop_threshold_bp(&self, base_rate: Decimal, level: u32, quality_level: u32) -> Option<Decimal> {
        let hundred = Decimal::from(PCT);
        let level_pct = self
            .level_bonus_pct
            .checked_mul(level.saturating_sub(1))?
            .checked_add(PCT)?;
        let quality_pct = self
            .quality_bonus_pct
            .checked_mul(quality_level)?
            .checked_add(PCT)?;
        base_rate
            .checked_mul(hundred)?
            .checked_mul(Decimal::from(level_pct))?
            .checked_div(hundred)?
            .checked_mul(Decimal::from(quality_pct))?
            .checked_div(hundred)
    }
}
