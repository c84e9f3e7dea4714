//! The plantation store: resident farm state per owner.
//!
//! Each owner has one slot behind its own mutex in a concurrent map. A slot
//! moves `Unloaded -> Loading -> Loaded`; until it is loaded,
//! [`PlantationStore::get_farms`] returns nothing and no instance can be
//! created, so a fresh instance never shadows a durable row.
//!
//! Slot locks are never held across an `.await`: a save snapshots the rows
//! under the lock, releases it, then writes. A revision counter on each slot
//! lets the periodic flush skip owners that have not changed.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use plantation_db::{DbError, FarmRepository, StoredFarm};
use plantation_farms::{FarmError, FarmInstance, FarmKey};
use plantation_types::{FarmTypeId, OwnerId, PlayerStats, WorldPos};
use plantation_world::Catalog;

use crate::error::StoreError;

/// Load progress of an owner's slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Never loaded, or the last load failed.
    Unloaded,
    /// A load is in flight.
    Loading,
    /// Durable rows have been merged in.
    Loaded,
}

#[derive(Debug)]
struct Slot {
    state: LoadState,
    farms: BTreeMap<FarmKey, FarmInstance>,
    stats: PlayerStats,
    revision: u64,
    saved_revision: u64,
}

impl Slot {
    const fn new() -> Self {
        Self {
            state: LoadState::Unloaded,
            farms: BTreeMap::new(),
            stats: PlayerStats {
                total_harvests: 0,
                materials_collected: 0,
                currency_spent: rust_decimal::Decimal::ZERO,
                currency_earned: rust_decimal::Decimal::ZERO,
            },
            revision: 0,
            saved_revision: 0,
        }
    }

    const fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    const fn is_dirty(&self) -> bool {
        self.revision != self.saved_revision
    }
}

type SlotRef = Arc<Mutex<Slot>>;

/// Resident farm state of every active owner.
pub struct PlantationStore<R> {
    repo: Arc<R>,
    catalog: Arc<Catalog>,
    slots: RwLock<HashMap<OwnerId, SlotRef>>,
}

impl<R: FarmRepository> PlantationStore<R> {
    /// Create an empty store over a repository.
    pub fn new(repo: Arc<R>, catalog: Arc<Catalog>) -> Self {
        Self {
            repo,
            catalog,
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// The farm catalog.
    pub const fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// The durable repository.
    pub const fn repository(&self) -> &Arc<R> {
        &self.repo
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    /// Read `owner`'s farms and stats from the durable store into memory.
    ///
    /// A no-op if the owner is already loaded or loading.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::PersistenceUnavailable`] if the read fails; the
    /// slot is left unloaded so a later call retries.
    pub async fn load_farms(&self, owner: OwnerId) -> Result<(), StoreError> {
        let slot = self.slot_or_insert(owner)?;
        {
            let Ok(mut guard) = slot.lock() else {
                return Err(StoreError::Poisoned);
            };
            if guard.state != LoadState::Unloaded {
                return Ok(());
            }
            guard.state = LoadState::Loading;
        }

        let fetched = self.fetch(owner).await;

        let Ok(mut guard) = slot.lock() else {
            return Err(StoreError::Poisoned);
        };
        match fetched {
            Err(source) => {
                guard.state = LoadState::Unloaded;
                tracing::warn!(owner = %owner, error = %source, "Farm load failed");
                Err(StoreError::PersistenceUnavailable { owner, source })
            }
            Ok((rows, stats)) => {
                let mut merged = 0_usize;
                for row in rows {
                    let Some(farm) = self.accept_row(owner, row) else {
                        continue;
                    };
                    guard.farms.insert(farm.key.clone(), farm);
                    merged = merged.saturating_add(1);
                }
                if let Some(stats) = stats {
                    guard.stats = add_stats(&stats, &guard.stats);
                }
                guard.state = LoadState::Loaded;
                tracing::debug!(
                    owner = %owner,
                    count = merged,
                    resident = guard.farms.len(),
                    "Farms loaded"
                );
                Ok(())
            }
        }
    }

    /// Start [`load_farms`](Self::load_farms) on the current runtime without
    /// waiting for it.
    ///
    /// Returns `None` when called outside a tokio runtime.
    pub fn spawn_load(self: &Arc<Self>, owner: OwnerId) -> Option<JoinHandle<()>> {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(owner = %owner, "No runtime available for background load");
            return None;
        };
        let store = Arc::clone(self);
        Some(runtime.spawn(async move {
            // Failures are logged by `load_farms` and retried on the next trigger.
            let _ = store.load_farms(owner).await;
        }))
    }

    async fn fetch(&self, owner: OwnerId) -> Result<(Vec<StoredFarm>, Option<PlayerStats>), DbError> {
        let rows = self.repo.load_farms(owner).await?;
        let stats = self.repo.load_stats(owner).await?;
        Ok((rows, stats))
    }

    fn accept_row(&self, owner: OwnerId, row: StoredFarm) -> Option<FarmInstance> {
        let Some(def) = self.catalog.get(&row.farm_type) else {
            tracing::warn!(
                owner = %owner,
                farm_type = %row.farm_type,
                index = row.index,
                "Skipping stored farm of unknown type"
            );
            return None;
        };
        if row.index == 0 || row.index > def.max_instances {
            tracing::warn!(
                owner = %owner,
                farm_type = %row.farm_type,
                index = row.index,
                "Skipping stored farm with out-of-range index"
            );
            return None;
        }
        Some(from_record(row))
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Load progress of `owner`.
    pub fn load_state(&self, owner: OwnerId) -> LoadState {
        let Ok(Some(slot)) = self.slot(owner) else {
            return LoadState::Unloaded;
        };
        slot.lock().map_or(LoadState::Unloaded, |guard| guard.state)
    }

    /// Whether `owner`'s durable rows have been merged in.
    pub fn is_loaded(&self, owner: OwnerId) -> bool {
        self.load_state(owner) == LoadState::Loaded
    }

    /// Resident farms of `owner`, in key order. Empty until loaded.
    pub fn get_farms(&self, owner: OwnerId) -> Vec<FarmInstance> {
        let Ok(Some(slot)) = self.slot(owner) else {
            return Vec::new();
        };
        let Ok(guard) = slot.lock() else {
            return Vec::new();
        };
        if guard.state != LoadState::Loaded {
            return Vec::new();
        }
        guard.farms.values().cloned().collect()
    }

    /// Read one loaded instance under the slot lock.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotLoaded`] or [`StoreError::FarmNotFound`].
    pub fn with_farm<T>(
        &self,
        owner: OwnerId,
        key: &FarmKey,
        f: impl FnOnce(&FarmInstance) -> T,
    ) -> Result<T, StoreError> {
        let slot = self.slot(owner)?.ok_or(StoreError::NotLoaded(owner))?;
        let Ok(guard) = slot.lock() else {
            return Err(StoreError::Poisoned);
        };
        if guard.state != LoadState::Loaded {
            return Err(StoreError::NotLoaded(owner));
        }
        guard
            .farms
            .get(key)
            .map(f)
            .ok_or_else(|| StoreError::FarmNotFound(key.clone()))
    }

    /// Owners with a resident slot.
    pub fn resident_owners(&self) -> Vec<OwnerId> {
        let Ok(slots) = self.slots.read() else {
            return Vec::new();
        };
        slots.keys().copied().collect()
    }

    /// Whether `owner` has changes that have not been saved.
    pub fn is_dirty(&self, owner: OwnerId) -> bool {
        let Ok(Some(slot)) = self.slot(owner) else {
            return false;
        };
        slot.lock().is_ok_and(|guard| guard.is_dirty())
    }

    /// Aggregate counters of `owner`.
    pub fn stats(&self, owner: OwnerId) -> PlayerStats {
        let Ok(Some(slot)) = self.slot(owner) else {
            return PlayerStats::default();
        };
        slot.lock()
            .map(|guard| guard.stats.clone())
            .unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Add a fresh instance in memory. It reaches the durable store on the
    /// next save.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotLoaded`] until the owner's durable rows are merged in.
    /// - [`StoreError::UnknownFarmType`] if the type is not in the catalog.
    /// - [`FarmError::InvalidInstanceIndex`] if `index` is outside `1..=max_instances`.
    /// - [`FarmError::InstanceLimitReached`] if the owner holds the maximum.
    /// - [`StoreError::InstanceExists`] if the key is taken.
    pub fn create_farm(
        &self,
        owner: OwnerId,
        farm_type: &FarmTypeId,
        index: u32,
        location: WorldPos,
        now: DateTime<Utc>,
    ) -> Result<FarmKey, StoreError> {
        let def = self
            .catalog
            .get(farm_type)
            .ok_or_else(|| StoreError::UnknownFarmType(farm_type.clone()))?;
        if index == 0 || index > def.max_instances {
            return Err(FarmError::InvalidInstanceIndex {
                farm_type: farm_type.clone(),
                index,
                max: def.max_instances,
            }
            .into());
        }

        let slot = self.slot(owner)?.ok_or(StoreError::NotLoaded(owner))?;
        let Ok(mut guard) = slot.lock() else {
            return Err(StoreError::Poisoned);
        };
        if guard.state != LoadState::Loaded {
            return Err(StoreError::NotLoaded(owner));
        }
        let held = guard
            .farms
            .keys()
            .filter(|key| &key.farm_type == farm_type)
            .count();
        if held >= usize::try_from(def.max_instances).unwrap_or(usize::MAX) {
            return Err(FarmError::InstanceLimitReached {
                farm_type: farm_type.clone(),
                max: def.max_instances,
            }
            .into());
        }
        let key = FarmKey::new(farm_type.clone(), index);
        if guard.farms.contains_key(&key) {
            return Err(StoreError::InstanceExists(key));
        }

        guard
            .farms
            .insert(key.clone(), FarmInstance::new(owner, key.clone(), location, now));
        guard.touch();
        tracing::debug!(owner = %owner, farm = %key, "Farm created");
        Ok(key)
    }

    /// Run `f` on one loaded instance and the owner's counters under the
    /// slot lock. The slot is marked changed only when `f` succeeds and
    /// actually altered the instance or the counters.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotLoaded`], [`StoreError::FarmNotFound`], or whatever
    /// `f` returns.
    pub fn with_farm_mut<T>(
        &self,
        owner: OwnerId,
        key: &FarmKey,
        f: impl FnOnce(&mut FarmInstance, &mut PlayerStats) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let slot = self.slot(owner)?.ok_or(StoreError::NotLoaded(owner))?;
        let Ok(mut guard) = slot.lock() else {
            return Err(StoreError::Poisoned);
        };
        if guard.state != LoadState::Loaded {
            return Err(StoreError::NotLoaded(owner));
        }
        let slot = &mut *guard;
        let farm = slot
            .farms
            .get_mut(key)
            .ok_or_else(|| StoreError::FarmNotFound(key.clone()))?;
        let before = (farm.clone(), slot.stats.clone());
        let out = f(&mut *farm, &mut slot.stats)?;
        if *farm != before.0 || slot.stats != before.1 {
            slot.touch();
        }
        Ok(out)
    }

    /// Update `owner`'s counters.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if the slot lock is poisoned.
    pub fn record_stats(
        &self,
        owner: OwnerId,
        f: impl FnOnce(&mut PlayerStats),
    ) -> Result<(), StoreError> {
        let slot = self.slot_or_insert(owner)?;
        let Ok(mut guard) = slot.lock() else {
            return Err(StoreError::Poisoned);
        };
        f(&mut guard.stats);
        guard.touch();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Saving and eviction
    // -----------------------------------------------------------------------

    /// Write every resident farm of `owner` and its counters.
    ///
    /// Counters are only written once the owner is loaded, so a partial
    /// in-memory tally never replaces the durable one. Returns the number of
    /// farms written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::PersistenceUnavailable`] if the write fails.
    pub async fn save_farms(&self, owner: OwnerId) -> Result<usize, StoreError> {
        self.save(owner, true).await
    }

    /// Like [`save_farms`](Self::save_farms), but skips owners without
    /// unsaved changes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::PersistenceUnavailable`] if the write fails.
    pub async fn save_if_dirty(&self, owner: OwnerId) -> Result<usize, StoreError> {
        self.save(owner, false).await
    }

    async fn save(&self, owner: OwnerId, force: bool) -> Result<usize, StoreError> {
        let Some(slot) = self.slot(owner)? else {
            return Ok(0);
        };
        let (rows, stats, revision) = {
            let Ok(guard) = slot.lock() else {
                return Err(StoreError::Poisoned);
            };
            if !force && !guard.is_dirty() {
                return Ok(0);
            }
            let rows: Vec<StoredFarm> = guard.farms.values().map(to_record).collect();
            let stats = (guard.state == LoadState::Loaded).then(|| guard.stats.clone());
            (rows, stats, guard.revision)
        };

        self.write(owner, &rows, stats.as_ref())
            .await
            .map_err(|source| {
                tracing::warn!(owner = %owner, error = %source, "Farm save failed");
                StoreError::PersistenceUnavailable { owner, source }
            })?;

        if let Ok(mut guard) = slot.lock() {
            guard.saved_revision = guard.saved_revision.max(revision);
        }
        tracing::debug!(owner = %owner, count = rows.len(), "Farms saved");
        Ok(rows.len())
    }

    async fn write(
        &self,
        owner: OwnerId,
        rows: &[StoredFarm],
        stats: Option<&PlayerStats>,
    ) -> Result<(), DbError> {
        if !rows.is_empty() {
            self.repo.upsert_farms(owner, rows).await?;
        }
        if let Some(stats) = stats {
            self.repo.upsert_stats(owner, stats).await?;
        }
        Ok(())
    }

    /// Save `owner` and drop their slot (session end).
    ///
    /// The owner stays resident if the save fails, or if they changed while
    /// the save was in flight.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::PersistenceUnavailable`] if the save fails.
    pub async fn unload(&self, owner: OwnerId) -> Result<(), StoreError> {
        self.save(owner, true).await?;

        let Ok(mut slots) = self.slots.write() else {
            return Err(StoreError::Poisoned);
        };
        let changed = slots
            .get(&owner)
            .is_some_and(|slot| slot.lock().is_ok_and(|guard| guard.is_dirty()));
        if changed {
            tracing::debug!(owner = %owner, "Owner changed during unload, kept resident");
            return Ok(());
        }
        slots.remove(&owner);
        tracing::debug!(owner = %owner, "Owner unloaded");
        Ok(())
    }

    /// Delete every durable row of `owner` and drop their slot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::PersistenceUnavailable`] if the delete fails;
    /// resident state is kept in that case.
    pub async fn reset_owner(&self, owner: OwnerId) -> Result<(), StoreError> {
        self.repo
            .delete_owner(owner)
            .await
            .map_err(|source| StoreError::PersistenceUnavailable { owner, source })?;
        if let Ok(mut slots) = self.slots.write() {
            slots.remove(&owner);
        }
        tracing::info!(owner = %owner, "Owner reset");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Slot map
    // -----------------------------------------------------------------------

    fn slot(&self, owner: OwnerId) -> Result<Option<SlotRef>, StoreError> {
        let Ok(slots) = self.slots.read() else {
            return Err(StoreError::Poisoned);
        };
        Ok(slots.get(&owner).cloned())
    }

    fn slot_or_insert(&self, owner: OwnerId) -> Result<SlotRef, StoreError> {
        if let Some(slot) = self.slot(owner)? {
            return Ok(slot);
        }
        let Ok(mut slots) = self.slots.write() else {
            return Err(StoreError::Poisoned);
        };
        Ok(Arc::clone(
            slots
                .entry(owner)
                .or_insert_with(|| Arc::new(Mutex::new(Slot::new()))),
        ))
    }
}

// ---------------------------------------------------------------------------
// Row conversion
// ---------------------------------------------------------------------------

/// Durable row of an instance.
pub fn to_record(farm: &FarmInstance) -> StoredFarm {
    StoredFarm {
        owner: farm.owner,
        farm_type: farm.key.farm_type.clone(),
        index: farm.key.index,
        level: farm.level,
        experience: farm.experience,
        efficiency_pct: farm.efficiency_pct,
        storage_level: farm.storage_level,
        speed_level: farm.speed_level,
        quality_level: farm.quality_level,
        last_harvest: farm.last_harvest,
        location: farm.location,
        storage: farm.storage.clone(),
    }
}

/// Instance rebuilt from a durable row.
pub fn from_record(row: StoredFarm) -> FarmInstance {
    FarmInstance {
        owner: row.owner,
        key: FarmKey::new(row.farm_type, row.index),
        level: row.level,
        experience: row.experience,
        efficiency_pct: row.efficiency_pct,
        storage_level: row.storage_level,
        speed_level: row.speed_level,
        quality_level: row.quality_level,
        last_harvest: row.last_harvest,
        location: row.location,
        storage: row.storage,
    }
}

fn add_stats(a: &PlayerStats, b: &PlayerStats) -> PlayerStats {
    PlayerStats {
        total_harvests: a.total_harvests.saturating_add(b.total_harvests),
        materials_collected: a.materials_collected.saturating_add(b.materials_collected),
        currency_spent: a.currency_spent.saturating_add(b.currency_spent),
        currency_earned: a.currency_earned.saturating_add(b.currency_earned),
    }
}
