//! The foreground trigger API.
//!
//! [`Plantation`] is what the presentation layer talks to. Every trigger is
//! synchronous: it runs against resident state under the owner's slot lock
//! and returns before the caller sees a result. Durable I/O only happens in
//! [`Plantation::session_started`] and in the reconciler.
//!
//! Triggers that depend on the clock or on randomness have an `_at` or
//! `_with` variant taking `now` and an RNG, so tests can drive them
//! deterministically.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use plantation_db::FarmRepository;
use plantation_farms::{
    EconomyConfig, FarmError, FarmKey, apply_upgrade, harvest, level_up, upgrade_cost,
};
use plantation_ledger::{Collaborators, CurrencyLedger, MaterialPool, PlayerInventory};
use plantation_types::{
    FarmSnapshot, FarmTypeDef, FarmTypeId, HarvestOutcome, LedgerSlot, OwnerId, SaleReceipt,
    StorageKey, UpgradeCost, UpgradeReceipt, UpgradeTrack, WorldPos,
};
use plantation_world::{Catalog, PlantationArea, PlotAllocator};

use crate::error::StoreError;
use crate::store::{LoadState, PlantationStore};

/// Owned handles to the host's currency ledger, inventory and material pool.
#[derive(Clone)]
pub struct CollaboratorSet {
    /// The currency ledger.
    pub currency: Arc<dyn CurrencyLedger>,
    /// The player inventory.
    pub inventory: Arc<dyn PlayerInventory>,
    /// The external material pool.
    pub pool: Arc<dyn MaterialPool>,
}

impl std::fmt::Debug for CollaboratorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollaboratorSet").finish_non_exhaustive()
    }
}

/// Farm service for every player.
pub struct Plantation<R> {
    store: Arc<PlantationStore<R>>,
    plots: PlotAllocator,
    economy: EconomyConfig,
    collaborators: CollaboratorSet,
}

impl<R: FarmRepository> Plantation<R> {
    /// Compose the service.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Farm`] if the economy configuration is invalid,
    /// or [`StoreError::World`] if a catalog layout does not fit the plot.
    pub fn new(
        store: Arc<PlantationStore<R>>,
        plots: PlotAllocator,
        economy: EconomyConfig,
        collaborators: CollaboratorSet,
    ) -> Result<Self, StoreError> {
        economy.validate()?;
        plots.check_catalog(store.catalog())?;
        Ok(Self {
            store,
            plots,
            economy,
            collaborators,
        })
    }

    /// The resident store.
    pub const fn store(&self) -> &Arc<PlantationStore<R>> {
        &self.store
    }

    /// The farm catalog.
    pub fn catalog(&self) -> &Catalog {
        self.store.catalog()
    }

    /// The economy configuration.
    pub const fn economy(&self) -> &EconomyConfig {
        &self.economy
    }

    // -----------------------------------------------------------------------
    // Sessions and queries
    // -----------------------------------------------------------------------

    /// Load `owner`'s farms and return their snapshots.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::PersistenceUnavailable`] if the load fails.
    pub async fn session_started(&self, owner: OwnerId) -> Result<Vec<FarmSnapshot>, StoreError> {
        self.store.load_farms(owner).await?;
        tracing::info!(owner = %owner, "Session started");
        Ok(self.farms(owner))
    }

    /// Snapshots of every resident farm of `owner`.
    pub fn farms(&self, owner: OwnerId) -> Vec<FarmSnapshot> {
        self.store
            .get_farms(owner)
            .iter()
            .filter_map(|farm| {
                self.catalog()
                    .get(farm.farm_type())
                    .map(|def| farm.snapshot(def, &self.economy))
            })
            .collect()
    }

    /// `owner`'s plot with the cell grid of every farm type.
    pub fn plot_of(&self, owner: OwnerId) -> PlantationArea {
        self.plots.plot_of(owner, self.catalog())
    }

    /// Price of raising `track` one level on a farm.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotLoaded`], [`StoreError::FarmNotFound`], or
    /// [`FarmError::MaxLevelReached`].
    pub fn upgrade_quote(
        &self,
        owner: OwnerId,
        farm_type: &FarmTypeId,
        index: u32,
        track: UpgradeTrack,
    ) -> Result<UpgradeCost, StoreError> {
        self.ready(owner)?;
        let key = FarmKey::new(farm_type.clone(), index);
        self.store
            .with_farm(owner, &key, |farm| upgrade_cost(farm, track, &self.economy))?
            .map_err(StoreError::from)
    }

    // -----------------------------------------------------------------------
    // Claiming
    // -----------------------------------------------------------------------

    /// Buy a farm of `farm_type` on the cell under `pos`.
    ///
    /// # Errors
    ///
    /// See [`claim_farm_at`](Self::claim_farm_at).
    pub fn claim_farm(
        &self,
        owner: OwnerId,
        farm_type: &FarmTypeId,
        pos: WorldPos,
    ) -> Result<FarmSnapshot, StoreError> {
        self.claim_farm_at(owner, farm_type, pos, Utc::now())
    }

    /// Buy a farm whose first growth cycle starts at `now`.
    ///
    /// The unlock cost is withdrawn first and refunded if the instance
    /// cannot be created.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotLoaded`] until the owner's farms are loaded.
    /// - [`StoreError::UnknownFarmType`] or [`StoreError::OutsidePlot`].
    /// - [`FarmError::InsufficientFunds`] if the unlock cost is not covered.
    /// - Any error of [`PlantationStore::create_farm`].
    pub fn claim_farm_at(
        &self,
        owner: OwnerId,
        farm_type: &FarmTypeId,
        pos: WorldPos,
        now: DateTime<Utc>,
    ) -> Result<FarmSnapshot, StoreError> {
        self.ready(owner)?;
        let def = self.def(farm_type)?;
        let grid = self.plots.sub_grid(owner, def);
        if !grid.covers(pos) {
            return Err(StoreError::OutsidePlot { owner });
        }
        let index = grid.index_at(pos);
        let location = grid.position_of(index).unwrap_or(pos);

        let cost = def.unlock_cost;
        let currency = self.collaborators.currency.as_ref();
        if !currency.has(owner, cost) {
            return Err(FarmError::InsufficientFunds {
                required: cost,
                available: currency.balance(owner),
            }
            .into());
        }
        if cost > Decimal::ZERO {
            currency.withdraw(owner, cost)?;
        }

        let key = match self.store.create_farm(owner, farm_type, index, location, now) {
            Ok(key) => key,
            Err(e) => {
                if cost > Decimal::ZERO {
                    if let Err(refund) = currency.deposit(owner, cost) {
                        tracing::warn!(owner = %owner, error = %refund, "Unlock refund failed");
                    }
                }
                return Err(e);
            }
        };
        self.store.record_stats(owner, |stats| {
            stats.currency_spent = stats.currency_spent.saturating_add(cost);
        })?;

        tracing::info!(
            owner = %owner,
            farm = %key,
            cost = %currency.format(cost),
            "Farm claimed"
        );
        self.store
            .with_farm(owner, &key, |farm| farm.snapshot(def, &self.economy))
    }

    // -----------------------------------------------------------------------
    // Harvesting
    // -----------------------------------------------------------------------

    /// Harvest a farm now.
    ///
    /// # Errors
    ///
    /// See [`request_harvest_with`](Self::request_harvest_with).
    pub fn request_harvest(
        &self,
        owner: OwnerId,
        farm_type: &FarmTypeId,
        index: u32,
    ) -> Result<HarvestOutcome, StoreError> {
        self.request_harvest_with(owner, farm_type, index, Utc::now(), &mut rand::rng())
    }

    /// Harvest a farm at `now` with the given RNG.
    ///
    /// `NotReady` and `StorageFull` come back as outcomes, not errors.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotLoaded`], [`StoreError::UnknownFarmType`],
    /// [`StoreError::FarmNotFound`], or [`FarmError::ArithmeticOverflow`].
    pub fn request_harvest_with(
        &self,
        owner: OwnerId,
        farm_type: &FarmTypeId,
        index: u32,
        now: DateTime<Utc>,
        rng: &mut impl rand::Rng,
    ) -> Result<HarvestOutcome, StoreError> {
        self.ready(owner)?;
        let def = self.def(farm_type)?;
        let key = FarmKey::new(farm_type.clone(), index);
        self.store.with_farm_mut(owner, &key, |farm, stats| {
            let outcome = harvest(farm, def, &self.economy, now, rng)?;
            if let HarvestOutcome::Harvested(result) = &outcome {
                stats.total_harvests = stats.total_harvests.saturating_add(1);
                stats.materials_collected =
                    stats.materials_collected.saturating_add(result.total_units());
            }
            Ok(outcome)
        })
    }

    /// Harvest whichever farm sits under `pos`.
    ///
    /// # Errors
    ///
    /// See [`request_harvest_at_with`](Self::request_harvest_at_with).
    pub fn request_harvest_at(
        &self,
        owner: OwnerId,
        pos: WorldPos,
    ) -> Result<HarvestOutcome, StoreError> {
        self.request_harvest_at_with(owner, pos, Utc::now(), &mut rand::rng())
    }

    /// Harvest whichever farm sits under `pos`, at `now`.
    ///
    /// # Errors
    ///
    /// [`StoreError::OutsidePlot`] if no farm type's cells lie under `pos`,
    /// otherwise as [`request_harvest_with`](Self::request_harvest_with).
    pub fn request_harvest_at_with(
        &self,
        owner: OwnerId,
        pos: WorldPos,
        now: DateTime<Utc>,
        rng: &mut impl rand::Rng,
    ) -> Result<HarvestOutcome, StoreError> {
        let plot = self.plot_of(owner);
        let (farm_type, index) = plot
            .farm_type_at(pos)
            .and_then(|id| plot.layouts.get(id).map(|grid| (id.clone(), grid.index_at(pos))))
            .ok_or(StoreError::OutsidePlot { owner })?;
        self.request_harvest_with(owner, &farm_type, index, now, rng)
    }

    // -----------------------------------------------------------------------
    // Progression
    // -----------------------------------------------------------------------

    /// Raise an upgrade track one level, all or nothing.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotLoaded`], [`StoreError::FarmNotFound`], or any
    /// [`FarmError`] from the upgrade economy.
    pub fn request_upgrade(
        &self,
        owner: OwnerId,
        farm_type: &FarmTypeId,
        index: u32,
        track: UpgradeTrack,
    ) -> Result<UpgradeReceipt, StoreError> {
        self.ready(owner)?;
        let key = FarmKey::new(farm_type.clone(), index);
        let collab = self.collaborators();
        self.store.with_farm_mut(owner, &key, |farm, stats| {
            let receipt = apply_upgrade(farm, track, &self.economy, collab)?;
            stats.currency_spent = stats.currency_spent.saturating_add(receipt.currency_spent);
            Ok(receipt)
        })
    }

    /// Spend experience to raise a farm one level. Returns the new level.
    ///
    /// # Errors
    ///
    /// [`FarmError::InsufficientExperience`] or [`FarmError::MaxLevelReached`].
    pub fn request_level_up(
        &self,
        owner: OwnerId,
        farm_type: &FarmTypeId,
        index: u32,
    ) -> Result<u32, StoreError> {
        self.ready(owner)?;
        let key = FarmKey::new(farm_type.clone(), index);
        self.store.with_farm_mut(owner, &key, |farm, _| {
            level_up(farm, &self.economy).map_err(StoreError::from)
        })
    }

    // -----------------------------------------------------------------------
    // Emptying storage
    // -----------------------------------------------------------------------

    /// Move stored materials into the player inventory as far as it has room.
    /// Returns what was moved.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotLoaded`] or [`StoreError::FarmNotFound`].
    pub fn request_collect(
        &self,
        owner: OwnerId,
        farm_type: &FarmTypeId,
        index: u32,
    ) -> Result<Vec<LedgerSlot>, StoreError> {
        self.ready(owner)?;
        let key = FarmKey::new(farm_type.clone(), index);
        let inventory = self.collaborators.inventory.as_ref();
        self.store.with_farm_mut(owner, &key, |farm, _| {
            let keys: Vec<StorageKey> = farm.storage.keys().cloned().collect();
            let mut moved = Vec::new();
            for slot in keys {
                let held = farm.stored_in(&slot);
                let taken = farm.take_stored(&slot, held);
                let leftover = inventory.add(owner, &slot, taken);
                farm.return_stored(&slot, leftover);
                let quantity = taken.saturating_sub(leftover);
                if quantity > 0 {
                    moved.push(LedgerSlot {
                        key: slot,
                        quantity,
                    });
                }
            }
            tracing::debug!(owner = %owner, farm = %farm.key, slots = moved.len(), "Storage collected");
            Ok(moved)
        })
    }

    /// Sell every stored material that has a catalog price.
    ///
    /// The proceeds are deposited before storage is emptied, so a refused
    /// deposit leaves the farm unchanged.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotLoaded`], [`StoreError::FarmNotFound`],
    /// [`StoreError::Collaborator`] if the deposit is refused, or
    /// [`FarmError::ArithmeticOverflow`].
    pub fn request_sell(
        &self,
        owner: OwnerId,
        farm_type: &FarmTypeId,
        index: u32,
    ) -> Result<SaleReceipt, StoreError> {
        self.ready(owner)?;
        let def = self.def(farm_type)?;
        let prices: BTreeMap<StorageKey, Decimal> = def
            .drops
            .iter()
            .filter(|entry| entry.sell_price > Decimal::ZERO)
            .map(|entry| (entry.storage_key(), entry.sell_price))
            .collect();
        let key = FarmKey::new(farm_type.clone(), index);
        let currency = self.collaborators.currency.as_ref();

        self.store.with_farm_mut(owner, &key, |farm, stats| {
            let mut sold = Vec::new();
            let mut earned = Decimal::ZERO;
            for (slot, price) in &prices {
                let held = farm.stored_in(slot);
                if held == 0 {
                    continue;
                }
                let value = price
                    .checked_mul(Decimal::from(held))
                    .and_then(|v| earned.checked_add(v))
                    .ok_or(FarmError::ArithmeticOverflow)?;
                earned = value;
                sold.push(LedgerSlot {
                    key: slot.clone(),
                    quantity: held,
                });
            }

            if earned > Decimal::ZERO {
                currency.deposit(owner, earned)?;
            }
            for entry in &sold {
                farm.take_stored(&entry.key, entry.quantity);
            }
            stats.currency_earned = stats.currency_earned.saturating_add(earned);
            tracing::debug!(
                owner = %owner,
                farm = %farm.key,
                earned = %currency.format(earned),
                "Storage sold"
            );
            Ok(SaleReceipt { sold, earned })
        })
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn def(&self, farm_type: &FarmTypeId) -> Result<&FarmTypeDef, StoreError> {
        self.catalog()
            .get(farm_type)
            .ok_or_else(|| StoreError::UnknownFarmType(farm_type.clone()))
    }

    fn collaborators(&self) -> Collaborators<'_> {
        Collaborators {
            currency: self.collaborators.currency.as_ref(),
            inventory: self.collaborators.inventory.as_ref(),
            pool: self.collaborators.pool.as_ref(),
        }
    }

    /// Fail with `NotLoaded` unless the owner is loaded, starting a
    /// background load if none is running.
    fn ready(&self, owner: OwnerId) -> Result<(), StoreError> {
        match self.store.load_state(owner) {
            LoadState::Loaded => Ok(()),
            LoadState::Loading => Err(StoreError::NotLoaded(owner)),
            LoadState::Unloaded => {
                let _ = self.store.spawn_load(owner);
                Err(StoreError::NotLoaded(owner))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use rust_decimal_macros::dec;

    use plantation_db::MemoryFarmRepository;
    use plantation_ledger::{InMemoryCurrency, InMemoryInventory, InMemoryMaterialPool};
    use plantation_types::Tier;
    use plantation_world::PlotConfig;

    use super::*;

    struct Fixture {
        service: Plantation<MemoryFarmRepository>,
        currency: Arc<InMemoryCurrency>,
        inventory: Arc<InMemoryInventory>,
        pool: Arc<InMemoryMaterialPool>,
    }

    fn fixture(inventory_capacity: u32) -> Fixture {
        let repo = Arc::new(MemoryFarmRepository::new());
        let catalog = Catalog::new(Catalog::default_catalog())
            .map(Arc::new)
            .unwrap_or_else(|e| panic!("default catalog: {e}"));
        let store = Arc::new(PlantationStore::new(repo, catalog));
        let plots = PlotAllocator::new(PlotConfig::default())
            .unwrap_or_else(|e| panic!("plot config: {e}"));
        let currency = Arc::new(InMemoryCurrency::new("coins"));
        let inventory = Arc::new(InMemoryInventory::new(inventory_capacity));
        let pool = Arc::new(InMemoryMaterialPool::new());
        let collaborators = CollaboratorSet {
            currency: Arc::clone(&currency) as Arc<dyn CurrencyLedger>,
            inventory: Arc::clone(&inventory) as Arc<dyn PlayerInventory>,
            pool: Arc::clone(&pool) as Arc<dyn MaterialPool>,
        };
        let service = Plantation::new(store, plots, EconomyConfig::default(), collaborators)
            .unwrap_or_else(|e| panic!("service: {e}"));
        Fixture {
            service,
            currency,
            inventory,
            pool,
        }
    }

    fn berry() -> FarmTypeId {
        FarmTypeId::new("berry_orchard")
    }

    fn cell(fx: &Fixture, owner: OwnerId, farm_type: &FarmTypeId, index: u32) -> WorldPos {
        let def = fx
            .service
            .catalog()
            .get(farm_type)
            .unwrap_or_else(|| panic!("missing {farm_type}"));
        fx.service
            .plots
            .position_of(owner, def, index)
            .unwrap_or_else(|| panic!("no cell {index}"))
    }

    async fn claimed(fx: &Fixture, balance: Decimal) -> (OwnerId, DateTime<Utc>) {
        let owner = OwnerId::new();
        fx.currency.set_balance(owner, balance);
        assert!(fx.service.session_started(owner).await.is_ok());
        let now = Utc::now();
        let pos = cell(fx, owner, &berry(), 1);
        let claim = fx.service.claim_farm_at(owner, &berry(), pos, now);
        assert!(claim.is_ok(), "claim failed: {claim:?}");
        (owner, now)
    }

    fn stock(fx: &Fixture, owner: OwnerId, slots: &[(&str, u8, u32)]) {
        let key = FarmKey::new(berry(), 1);
        let filled = fx.service.store().with_farm_mut(owner, &key, |farm, _| {
            for (material, tier, qty) in slots {
                let tier = Tier::new(*tier).unwrap_or(Tier::MIN);
                farm.storage.insert(StorageKey::new(*material, tier), *qty);
            }
            Ok(())
        });
        assert!(filled.is_ok());
    }

    #[tokio::test]
    async fn claim_charges_and_places_on_cell() {
        let fx = fixture(64);
        let owner = OwnerId::new();
        fx.currency.set_balance(owner, dec!(1000));
        let _ = fx.service.session_started(owner).await;

        let pos = cell(&fx, owner, &berry(), 3);
        let snapshot = fx.service.claim_farm(owner, &berry(), pos);
        let snapshot = snapshot.unwrap_or_else(|e| panic!("claim: {e}"));
        assert_eq!(snapshot.index, 3);
        assert_eq!(snapshot.location, pos);
        assert_eq!(fx.currency.balance(owner), dec!(500));
        assert_eq!(fx.service.store().stats(owner).currency_spent, dec!(500));
        assert_eq!(fx.service.farms(owner).len(), 1);
    }

    #[tokio::test]
    async fn claim_without_funds_changes_nothing() {
        let fx = fixture(64);
        let owner = OwnerId::new();
        fx.currency.set_balance(owner, dec!(100));
        let _ = fx.service.session_started(owner).await;

        let pos = cell(&fx, owner, &berry(), 1);
        assert!(matches!(
            fx.service.claim_farm(owner, &berry(), pos),
            Err(StoreError::Farm(FarmError::InsufficientFunds { .. }))
        ));
        assert_eq!(fx.currency.balance(owner), dec!(100));
        assert!(fx.service.farms(owner).is_empty());
    }

    #[tokio::test]
    async fn failed_claim_is_refunded() {
        let fx = fixture(64);
        let (owner, now) = claimed(&fx, dec!(1000)).await;
        let pos = cell(&fx, owner, &berry(), 1);

        assert!(matches!(
            fx.service.claim_farm_at(owner, &berry(), pos, now),
            Err(StoreError::InstanceExists(_))
        ));
        assert_eq!(fx.currency.balance(owner), dec!(500));
    }

    #[tokio::test]
    async fn claim_outside_plot_rejected() {
        let fx = fixture(64);
        let owner = OwnerId::new();
        fx.currency.set_balance(owner, dec!(1000));
        let _ = fx.service.session_started(owner).await;

        let far = WorldPos::new(-1.0e6, 64.0, -1.0e6);
        assert!(matches!(
            fx.service.claim_farm(owner, &berry(), far),
            Err(StoreError::OutsidePlot { .. })
        ));
    }

    #[tokio::test]
    async fn triggers_wait_for_load() {
        let fx = fixture(64);
        let owner = OwnerId::new();
        assert!(matches!(
            fx.service.request_harvest(owner, &berry(), 1),
            Err(StoreError::NotLoaded(_))
        ));
        // The failed trigger started a background load.
        for _ in 0..10 {
            if fx.service.store().is_loaded(owner) {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(fx.service.store().is_loaded(owner));
    }

    #[tokio::test]
    async fn harvest_updates_stats_and_is_idempotent() {
        let fx = fixture(64);
        let (owner, now) = claimed(&fx, dec!(1000)).await;
        let mut rng = SmallRng::seed_from_u64(7);

        let early = fx
            .service
            .request_harvest_with(owner, &berry(), 1, now, &mut rng);
        assert!(matches!(early, Ok(HarvestOutcome::NotReady { .. })));

        let later = now + TimeDelta::seconds(300);
        let outcome = fx
            .service
            .request_harvest_with(owner, &berry(), 1, later, &mut rng)
            .unwrap_or_else(|e| panic!("harvest: {e}"));
        let HarvestOutcome::Harvested(result) = outcome else {
            panic!("expected a harvest, got {outcome:?}");
        };
        let stats = fx.service.store().stats(owner);
        assert_eq!(stats.total_harvests, 1);
        assert_eq!(stats.materials_collected, result.total_units());

        let again = fx
            .service
            .request_harvest_with(owner, &berry(), 1, later, &mut rng);
        assert!(matches!(again, Ok(HarvestOutcome::NotReady { .. })));
        assert_eq!(fx.service.store().stats(owner).total_harvests, 1);
    }

    #[tokio::test]
    async fn harvest_by_position() {
        let fx = fixture(64);
        let (owner, now) = claimed(&fx, dec!(1000)).await;
        let mut rng = SmallRng::seed_from_u64(1);
        let pos = cell(&fx, owner, &berry(), 1);

        let outcome = fx.service.request_harvest_at_with(
            owner,
            pos,
            now + TimeDelta::seconds(301),
            &mut rng,
        );
        assert!(matches!(outcome, Ok(HarvestOutcome::Harvested(_))));

        let nowhere = WorldPos::new(1.0e9, 64.0, 1.0e9);
        assert!(matches!(
            fx.service.request_harvest_at_with(owner, nowhere, now, &mut rng),
            Err(StoreError::OutsidePlot { .. })
        ));
    }

    #[tokio::test]
    async fn upgrade_spends_currency_and_materials() {
        let fx = fixture(64);
        let (owner, _) = claimed(&fx, dec!(1000)).await;
        let wheat = StorageKey::new("wheat", Tier::MIN);
        assert_eq!(fx.inventory.add(owner, &wheat, 12), 0);
        let _ = fx.pool.adjust_quantity(owner, &wheat, 8);

        let quote = fx
            .service
            .upgrade_quote(owner, &berry(), 1, UpgradeTrack::Storage)
            .unwrap_or_else(|e| panic!("quote: {e}"));
        assert_eq!(quote.currency, dec!(200));

        let receipt = fx
            .service
            .request_upgrade(owner, &berry(), 1, UpgradeTrack::Storage)
            .unwrap_or_else(|e| panic!("upgrade: {e}"));
        assert_eq!(receipt.new_level, 1);
        assert_eq!(receipt.currency_spent, quote.currency);
        assert_eq!(fx.currency.balance(owner), dec!(300));
        assert_eq!(fx.inventory.quantity(owner, &wheat), 0);
        assert_eq!(fx.pool.quantity(owner, &wheat), 0);
        assert_eq!(fx.service.store().stats(owner).currency_spent, dec!(700));
    }

    #[tokio::test]
    async fn unaffordable_upgrade_changes_nothing() {
        let fx = fixture(64);
        let (owner, _) = claimed(&fx, dec!(600)).await;

        assert!(matches!(
            fx.service
                .request_upgrade(owner, &berry(), 1, UpgradeTrack::Storage),
            Err(StoreError::Farm(FarmError::InsufficientFunds { .. }))
        ));
        assert_eq!(fx.currency.balance(owner), dec!(100));
        let farms = fx.service.farms(owner);
        assert_eq!(farms.first().map(|f| f.storage_level), Some(0));
    }

    #[tokio::test]
    async fn level_up_spends_experience() {
        let fx = fixture(64);
        let (owner, _) = claimed(&fx, dec!(1000)).await;
        let key = FarmKey::new(berry(), 1);
        let _ = fx
            .service
            .store()
            .with_farm_mut(owner, &key, |farm, _| {
                farm.experience = 260;
                Ok(())
            });

        assert_eq!(
            fx.service.request_level_up(owner, &berry(), 1).ok(),
            Some(2)
        );
        assert!(matches!(
            fx.service.request_level_up(owner, &berry(), 1),
            Err(StoreError::Farm(FarmError::InsufficientExperience { .. }))
        ));
        let farms = fx.service.farms(owner);
        assert_eq!(farms.first().map(|f| f.experience), Some(10));
    }

    #[tokio::test]
    async fn collect_stops_at_inventory_capacity() {
        let fx = fixture(6);
        let (owner, _) = claimed(&fx, dec!(1000)).await;
        stock(&fx, owner, &[("wild_berry", 1, 10)]);

        let moved = fx
            .service
            .request_collect(owner, &berry(), 1)
            .unwrap_or_default();
        assert_eq!(moved.iter().map(|s| s.quantity).sum::<u32>(), 6);
        assert_eq!(fx.inventory.load(owner), 6);
        let farms = fx.service.farms(owner);
        assert_eq!(farms.first().map(|f| f.stored), Some(4));
    }

    #[tokio::test]
    async fn sell_deposits_catalog_value() {
        let fx = fixture(64);
        let (owner, _) = claimed(&fx, dec!(500)).await;
        stock(&fx, owner, &[("wild_berry", 1, 10), ("sweet_berry", 2, 3)]);

        let receipt = fx
            .service
            .request_sell(owner, &berry(), 1)
            .unwrap_or_else(|e| panic!("sell: {e}"));
        assert_eq!(receipt.earned, dec!(44));
        assert_eq!(receipt.sold.len(), 2);
        assert_eq!(fx.currency.balance(owner), dec!(44));
        assert_eq!(fx.service.store().stats(owner).currency_earned, dec!(44));
        let farms = fx.service.farms(owner);
        assert_eq!(farms.first().map(|f| f.stored), Some(0));
    }

    #[tokio::test]
    async fn unpriced_materials_are_kept() {
        let fx = fixture(64);
        let (owner, _) = claimed(&fx, dec!(500)).await;
        stock(&fx, owner, &[("wheat", 1, 5)]);

        let receipt = fx.service.request_sell(owner, &berry(), 1);
        assert_eq!(receipt.ok().map(|r| r.earned), Some(Decimal::ZERO));
        let farms = fx.service.farms(owner);
        assert_eq!(farms.first().map(|f| f.stored), Some(5));
    }
}
