//! The farm catalog: an immutable lookup table of farm type definitions.
//!
//! The catalog is built once at startup from configuration (or from
//! [`Catalog::default_catalog`]) and shared read-only afterwards. Building it
//! validates every definition so the rest of the system can rely on:
//!
//! - unique farm type keys,
//! - `max_instances >= 1`,
//! - drop rates in `0..=100` and non-negative prices,
//! - a cell grid with at least `max_instances` cells and a positive spacing.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use plantation_types::{FarmTypeDef, FarmTypeId, MaterialDrop, PlotLayout, Tier};

use crate::error::WorldError;

/// Upper bound of a drop rate, in percent.
const MAX_RATE_PCT: u32 = 100;

/// Validated, read-only collection of farm type definitions.
#[derive(Debug, Clone)]
pub struct Catalog {
    /// Definitions keyed by farm type id.
    types: BTreeMap<FarmTypeId, FarmTypeDef>,
}

impl Catalog {
    /// Build a catalog from a list of definitions.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::DuplicateFarmType`] if two definitions share a
    /// key, or [`WorldError::InvalidFarmType`] if any definition is invalid.
    pub fn new(defs: Vec<FarmTypeDef>) -> Result<Self, WorldError> {
        let mut types = BTreeMap::new();
        for def in defs {
            validate(&def)?;
            if types.contains_key(&def.id) {
                return Err(WorldError::DuplicateFarmType(def.id));
            }
            types.insert(def.id.clone(), def);
        }
        Ok(Self { types })
    }

    /// Look up a farm type by key.
    pub fn get(&self, id: &FarmTypeId) -> Option<&FarmTypeDef> {
        self.types.get(id)
    }

    /// Look up a farm type by key, failing if it is not present.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::UnknownFarmType`] if the key is not present.
    pub fn require(&self, id: &FarmTypeId) -> Result<&FarmTypeDef, WorldError> {
        self.types
            .get(id)
            .ok_or_else(|| WorldError::UnknownFarmType(id.clone()))
    }

    /// Iterate over all definitions in key order.
    pub fn iter(&self) -> impl Iterator<Item = &FarmTypeDef> {
        self.types.values()
    }

    /// Number of farm types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether the catalog has no farm types.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// The built-in catalog used when configuration does not provide one.
    pub fn default_catalog() -> Vec<FarmTypeDef> {
        vec![
            FarmTypeDef {
                id: FarmTypeId::new("berry_orchard"),
                display_name: "Berry Orchard".to_owned(),
                unlock_cost: Decimal::new(500, 0),
                max_instances: 6,
                base_growth_secs: 300,
                storage_capacity: 500,
                layout: PlotLayout {
                    offset_x: 4.0,
                    offset_z: 4.0,
                    rows: 2,
                    columns: 3,
                    cell_spacing: 6.0,
                },
                drops: vec![
                    drop_entry("wild_berry", Tier::MIN, 70, 2),
                    drop_entry("sweet_berry", tier(2), 20, 8),
                    drop_entry("golden_berry", Tier::MAX, 3, 40),
                ],
            },
            FarmTypeDef {
                id: FarmTypeId::new("wheat_field"),
                display_name: "Wheat Field".to_owned(),
                unlock_cost: Decimal::new(750, 0),
                max_instances: 8,
                base_growth_secs: 600,
                storage_capacity: 800,
                layout: PlotLayout {
                    offset_x: 4.0,
                    offset_z: 24.0,
                    rows: 2,
                    columns: 4,
                    cell_spacing: 6.0,
                },
                drops: vec![
                    drop_entry("wheat", Tier::MIN, 85, 1),
                    drop_entry("wheat", tier(2), 15, 5),
                    drop_entry("seed_pouch", Tier::MIN, 10, 3),
                ],
            },
            FarmTypeDef {
                id: FarmTypeId::new("crystal_garden"),
                display_name: "Crystal Garden".to_owned(),
                unlock_cost: Decimal::new(5000, 0),
                max_instances: 3,
                base_growth_secs: 3600,
                storage_capacity: 150,
                layout: PlotLayout {
                    offset_x: 36.0,
                    offset_z: 4.0,
                    rows: 2,
                    columns: 2,
                    cell_spacing: 8.0,
                },
                drops: vec![
                    drop_entry("crystal_shard", Tier::MIN, 50, 10),
                    drop_entry("crystal_shard", tier(2), 12, 45),
                    drop_entry("prism_core", Tier::MAX, 2, 300),
                ],
            },
        ]
    }
}

/// Shorthand for the default catalog's drop entries.
fn drop_entry(material: &str, tier: Tier, rate_pct: i64, price: i64) -> MaterialDrop {
    MaterialDrop {
        material: material.into(),
        tier,
        base_rate: Decimal::new(rate_pct, 0),
        sell_price: Decimal::new(price, 0),
    }
}

/// Tier literal for the default catalog; falls back to the lowest tier.
fn tier(value: u8) -> Tier {
    Tier::new(value).unwrap_or(Tier::MIN)
}

/// Check a single definition.
fn validate(def: &FarmTypeDef) -> Result<(), WorldError> {
    let invalid = |reason: String| WorldError::InvalidFarmType {
        id: def.id.clone(),
        reason,
    };

    if def.id.as_str().is_empty() {
        return Err(invalid("empty id".to_owned()));
    }
    if def.max_instances == 0 {
        return Err(invalid("max_instances must be at least 1".to_owned()));
    }
    if def.unlock_cost.is_sign_negative() {
        return Err(invalid("unlock_cost must not be negative".to_owned()));
    }

    let layout = &def.layout;
    let cells = layout
        .rows
        .checked_mul(layout.columns)
        .ok_or(WorldError::ArithmeticOverflow)?;
    if cells < def.max_instances {
        return Err(invalid(format!(
            "layout has {cells} cells but max_instances is {}",
            def.max_instances
        )));
    }
    if !(layout.cell_spacing.is_finite() && layout.cell_spacing > 0.0) {
        return Err(invalid("cell_spacing must be positive".to_owned()));
    }
    if !(layout.offset_x.is_finite() && layout.offset_z.is_finite())
        || layout.offset_x < 0.0
        || layout.offset_z < 0.0
    {
        return Err(invalid("layout offsets must be non-negative".to_owned()));
    }

    let max_rate = Decimal::from(MAX_RATE_PCT);
    for entry in &def.drops {
        if entry.base_rate.is_sign_negative() || entry.base_rate > max_rate {
            return Err(invalid(format!(
                "drop rate {} for {} is outside 0..=100",
                entry.base_rate,
                entry.storage_key()
            )));
        }
        if entry.sell_price.is_sign_negative() {
            return Err(invalid(format!(
                "sell price for {} must not be negative",
                entry.storage_key()
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn catalog() -> Catalog {
        Catalog::new(Catalog::default_catalog()).unwrap_or_else(|_| Catalog {
            types: BTreeMap::new(),
        })
    }

    #[test]
    fn default_catalog_is_valid() {
        let result = Catalog::new(Catalog::default_catalog());
        assert!(result.is_ok(), "{result:?}");
        assert_eq!(catalog().len(), 3);
    }

    #[test]
    fn lookup_by_key() {
        let cat = catalog();
        let berry = cat.get(&FarmTypeId::new("berry_orchard"));
        assert_eq!(berry.map(|d| d.max_instances), Some(6));
        assert!(cat.require(&FarmTypeId::new("moon_farm")).is_err());
    }

    #[test]
    fn duplicate_keys_rejected() {
        let mut defs = Catalog::default_catalog();
        let first = defs.first().cloned();
        if let Some(def) = first {
            defs.push(def);
        }
        assert!(matches!(
            Catalog::new(defs),
            Err(WorldError::DuplicateFarmType(_))
        ));
    }

    #[test]
    fn too_few_cells_rejected() {
        let mut defs = Catalog::default_catalog();
        if let Some(def) = defs.first_mut() {
            def.max_instances = 7; // 2x3 layout has 6 cells
        }
        assert!(matches!(
            Catalog::new(defs),
            Err(WorldError::InvalidFarmType { .. })
        ));
    }

    #[test]
    fn rate_above_hundred_rejected() {
        let mut defs = Catalog::default_catalog();
        if let Some(entry) = defs.first_mut().and_then(|d| d.drops.first_mut()) {
            entry.base_rate = dec!(100.5);
        }
        assert!(Catalog::new(defs).is_err());
    }

    #[test]
    fn zero_instances_rejected() {
        let mut defs = Catalog::default_catalog();
        if let Some(def) = defs.last_mut() {
            def.max_instances = 0;
        }
        assert!(Catalog::new(defs).is_err());
    }

    #[test]
    fn same_material_different_tiers_are_separate_slots() {
        let cat = catalog();
        let wheat = cat.get(&FarmTypeId::new("wheat_field"));
        let keys: Vec<_> = wheat
            .map(|d| d.drops.iter().map(MaterialDrop::storage_key).collect())
            .unwrap_or_default();
        assert_eq!(keys.len(), 3);
        assert_ne!(keys.first(), keys.get(1));
    }
}
