//! Durable representation of a farm instance.
//!
//! [`StoredFarm`] is the store-neutral row shape: structured progression
//! columns plus the storage ledger. Each backend maps it onto its own
//! layout (`farm_instances` + `farm_storage` in `PostgreSQL`, one hash field
//! per farm in `Dragonfly`).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use plantation_types::{FarmTypeId, OwnerId, StorageKey, WorldPos};

use crate::error::DbError;
use crate::ledger_codec;

/// One persisted farm instance.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFarm {
    /// Owning player.
    pub owner: OwnerId,
    /// Farm type key.
    pub farm_type: FarmTypeId,
    /// Instance index.
    pub index: u32,
    /// Instance level.
    pub level: u32,
    /// Accumulated experience.
    pub experience: u64,
    /// Efficiency percentage.
    pub efficiency_pct: u32,
    /// Storage track level.
    pub storage_level: u32,
    /// Speed track level.
    pub speed_level: u32,
    /// Quality track level.
    pub quality_level: u32,
    /// Start of the current growth cycle.
    pub last_harvest: DateTime<Utc>,
    /// World location.
    pub location: WorldPos,
    /// Storage ledger.
    pub storage: BTreeMap<StorageKey, u32>,
}

impl StoredFarm {
    /// The `(farm_type, index)` part of the primary key.
    pub fn slot(&self) -> (FarmTypeId, u32) {
        (self.farm_type.clone(), self.index)
    }

    /// Field name used for this farm inside a per-owner hash.
    pub fn field(&self) -> String {
        format!("{}#{}", self.farm_type, self.index)
    }
}

/// JSON document form of a [`StoredFarm`], with the ledger as an encoded blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FarmDocument {
    /// Farm type key.
    pub farm_type: FarmTypeId,
    /// Instance index.
    pub index: u32,
    /// Instance level.
    pub level: u32,
    /// Accumulated experience.
    pub experience: u64,
    /// Efficiency percentage.
    pub efficiency_pct: u32,
    /// Storage track level.
    pub storage_level: u32,
    /// Speed track level.
    pub speed_level: u32,
    /// Quality track level.
    pub quality_level: u32,
    /// Start of the current growth cycle.
    pub last_harvest: DateTime<Utc>,
    /// World location.
    pub location: WorldPos,
    /// Ledger encoded with [`ledger_codec::encode`].
    pub ledger: Vec<u8>,
}

impl FarmDocument {
    /// Convert a farm into its document form.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Codec`] if the ledger cannot be encoded.
    pub fn from_farm(farm: &StoredFarm) -> Result<Self, DbError> {
        Ok(Self {
            farm_type: farm.farm_type.clone(),
            index: farm.index,
            level: farm.level,
            experience: farm.experience,
            efficiency_pct: farm.efficiency_pct,
            storage_level: farm.storage_level,
            speed_level: farm.speed_level,
            quality_level: farm.quality_level,
            last_harvest: farm.last_harvest,
            location: farm.location,
            ledger: ledger_codec::encode(&farm.storage)?,
        })
    }

    /// Decode the document back into a farm of `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Codec`] if the ledger blob is malformed.
    pub fn into_farm(self, owner: OwnerId) -> Result<StoredFarm, DbError> {
        let storage = ledger_codec::decode(&self.ledger)?;
        Ok(StoredFarm {
            owner,
            farm_type: self.farm_type,
            index: self.index,
            level: self.level,
            experience: self.experience,
            efficiency_pct: self.efficiency_pct,
            storage_level: self.storage_level,
            speed_level: self.speed_level,
            quality_level: self.quality_level,
            last_harvest: self.last_harvest,
            location: self.location,
            storage,
        })
    }
}
