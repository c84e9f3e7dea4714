//! The durable store boundary and its in-memory implementation.
//!
//! [`FarmRepository`] is what the plantation store reads from and flushes
//! to. Upserts are idempotent on `(owner, farm_type, instance_index)` and
//! on `owner` for stats, so replaying a save is harmless.
//!
//! [`MemoryFarmRepository`] keeps encoded rows in a map. It backs tests and
//! single-process deployments, and can simulate an unavailable or slow
//! backend.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use plantation_types::{FarmTypeId, OwnerId, PlayerStats};

use crate::error::DbError;
use crate::record::{FarmDocument, StoredFarm};

/// Durable storage of farms and per-owner stats.
pub trait FarmRepository: Send + Sync + 'static {
    /// Every farm of `owner`, ordered by farm type then index.
    fn load_farms(
        &self,
        owner: OwnerId,
    ) -> impl Future<Output = Result<Vec<StoredFarm>, DbError>> + Send;

    /// Insert or replace the given farms of `owner` in one unit of work.
    fn upsert_farms(
        &self,
        owner: OwnerId,
        farms: &[StoredFarm],
    ) -> impl Future<Output = Result<(), DbError>> + Send;

    /// Aggregate counters of `owner`, if any were saved.
    fn load_stats(
        &self,
        owner: OwnerId,
    ) -> impl Future<Output = Result<Option<PlayerStats>, DbError>> + Send;

    /// Insert or replace the counters of `owner`.
    fn upsert_stats(
        &self,
        owner: OwnerId,
        stats: &PlayerStats,
    ) -> impl Future<Output = Result<(), DbError>> + Send;

    /// Remove every farm and the stats of `owner`.
    fn delete_owner(&self, owner: OwnerId) -> impl Future<Output = Result<(), DbError>> + Send;
}

// ---------------------------------------------------------------------------
// MemoryFarmRepository
// ---------------------------------------------------------------------------

type OwnerFarms = BTreeMap<(FarmTypeId, u32), FarmDocument>;

/// Process-local repository.
///
/// Rows are held in their encoded document form so the ledger codec is
/// exercised the same way as with a real backend.
#[derive(Debug, Default)]
pub struct MemoryFarmRepository {
    farms: Mutex<HashMap<OwnerId, OwnerFarms>>,
    stats: Mutex<HashMap<OwnerId, PlayerStats>>,
    unavailable: AtomicBool,
    failing_loads: AtomicU32,
    latency_ms: AtomicU32,
    upsert_calls: AtomicU32,
}

impl MemoryFarmRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail with [`DbError::Unavailable`] until cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make the next `count` loads fail with [`DbError::Unavailable`].
    pub fn fail_next_loads(&self, count: u32) {
        self.failing_loads.store(count, Ordering::SeqCst);
    }

    /// Delay every operation by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        let ms = u32::try_from(latency.as_millis()).unwrap_or(u32::MAX);
        self.latency_ms.store(ms, Ordering::SeqCst);
    }

    /// Number of completed `upsert_farms` calls.
    pub fn upsert_count(&self) -> u32 {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    /// Number of farms stored for `owner`.
    pub fn farm_count(&self, owner: OwnerId) -> usize {
        let Ok(farms) = self.farms.lock() else {
            return 0;
        };
        farms.get(&owner).map_or(0, BTreeMap::len)
    }

    async fn gate(&self) -> Result<(), DbError> {
        let ms = self.latency_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(u64::from(ms))).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DbError::Unavailable("memory repository offline".to_owned()));
        }
        Ok(())
    }

    fn poisoned() -> DbError {
        DbError::Unavailable("memory repository lock poisoned".to_owned())
    }
}

impl FarmRepository for MemoryFarmRepository {
    async fn load_farms(&self, owner: OwnerId) -> Result<Vec<StoredFarm>, DbError> {
        self.gate().await?;
        let pending = self.failing_loads.load(Ordering::SeqCst);
        if pending > 0 {
            self.failing_loads
                .store(pending.saturating_sub(1), Ordering::SeqCst);
            return Err(DbError::Unavailable("injected load failure".to_owned()));
        }

        let docs: Vec<FarmDocument> = {
            let farms = self.farms.lock().map_err(|e| {
                tracing::warn!(error = %e, "Memory repository lock poisoned");
                Self::poisoned()
            })?;
            farms
                .get(&owner)
                .map(|rows| rows.values().cloned().collect())
                .unwrap_or_default()
        };
        docs.into_iter().map(|doc| doc.into_farm(owner)).collect()
    }

    async fn upsert_farms(&self, owner: OwnerId, farms: &[StoredFarm]) -> Result<(), DbError> {
        self.gate().await?;
        let docs = farms
            .iter()
            .map(FarmDocument::from_farm)
            .collect::<Result<Vec<_>, _>>()?;
        {
            let mut stored = self.farms.lock().map_err(|e| {
                tracing::warn!(error = %e, "Memory repository lock poisoned");
                Self::poisoned()
            })?;
            let rows = stored.entry(owner).or_default();
            for doc in docs {
                rows.insert((doc.farm_type.clone(), doc.index), doc);
            }
        }
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load_stats(&self, owner: OwnerId) -> Result<Option<PlayerStats>, DbError> {
        self.gate().await?;
        let stats = self.stats.lock().map_err(|e| {
            tracing::warn!(error = %e, "Memory repository lock poisoned");
            Self::poisoned()
        })?;
        Ok(stats.get(&owner).cloned())
    }

    async fn upsert_stats(&self, owner: OwnerId, stats: &PlayerStats) -> Result<(), DbError> {
        self.gate().await?;
        let mut stored = self.stats.lock().map_err(|e| {
            tracing::warn!(error = %e, "Memory repository lock poisoned");
            Self::poisoned()
        })?;
        stored.insert(owner, stats.clone());
        Ok(())
    }

    async fn delete_owner(&self, owner: OwnerId) -> Result<(), DbError> {
        self.gate().await?;
        if let Ok(mut farms) = self.farms.lock() {
            farms.remove(&owner);
        }
        if let Ok(mut stats) = self.stats.lock() {
            stats.remove(&owner);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal_macros::dec;

    use plantation_types::{StorageKey, Tier, WorldPos};

    use super::*;

    fn farm(owner: OwnerId, index: u32, wheat: u32) -> StoredFarm {
        let mut storage = BTreeMap::new();
        storage.insert(StorageKey::new("wheat", Tier::MIN), wheat);
        StoredFarm {
            owner,
            farm_type: FarmTypeId::new("wheat_field"),
            index,
            level: 1,
            experience: 0,
            efficiency_pct: 100,
            storage_level: 0,
            speed_level: 0,
            quality_level: 0,
            last_harvest: Utc::now(),
            location: WorldPos::default(),
            storage,
        }
    }

    #[tokio::test]
    async fn upsert_then_load() {
        let repo = MemoryFarmRepository::new();
        let owner = OwnerId::new();
        let rows = vec![farm(owner, 1, 5), farm(owner, 2, 7)];
        assert!(repo.upsert_farms(owner, &rows).await.is_ok());
        let loaded = repo.load_farms(owner).await.unwrap_or_default();
        assert_eq!(loaded, rows);
    }

    #[tokio::test]
    async fn upsert_is_idempotent_on_key() {
        let repo = MemoryFarmRepository::new();
        let owner = OwnerId::new();
        let _ = repo.upsert_farms(owner, &[farm(owner, 1, 5)]).await;
        let _ = repo.upsert_farms(owner, &[farm(owner, 1, 9)]).await;
        let loaded = repo.load_farms(owner).await.unwrap_or_default();
        assert_eq!(loaded.len(), 1);
        assert_eq!(
            loaded.first().map(|f| f.storage.values().sum::<u32>()),
            Some(9)
        );
    }

    #[tokio::test]
    async fn stats_round_trip_and_delete() {
        let repo = MemoryFarmRepository::new();
        let owner = OwnerId::new();
        let stats = PlayerStats {
            total_harvests: 3,
            materials_collected: 12,
            currency_spent: dec!(500),
            currency_earned: dec!(24),
        };
        let _ = repo.upsert_stats(owner, &stats).await;
        let _ = repo.upsert_farms(owner, &[farm(owner, 1, 1)]).await;
        assert_eq!(repo.load_stats(owner).await.ok().flatten(), Some(stats));

        assert!(repo.delete_owner(owner).await.is_ok());
        assert_eq!(repo.load_stats(owner).await.ok().flatten(), None);
        assert_eq!(repo.farm_count(owner), 0);
    }

    #[tokio::test]
    async fn injected_failures() {
        let repo = MemoryFarmRepository::new();
        let owner = OwnerId::new();
        repo.fail_next_loads(1);
        assert!(repo.load_farms(owner).await.is_err());
        assert!(repo.load_farms(owner).await.is_ok());

        repo.set_unavailable(true);
        assert!(matches!(
            repo.upsert_farms(owner, &[]).await,
            Err(DbError::Unavailable(_))
        ));
        repo.set_unavailable(false);
        assert!(repo.upsert_farms(owner, &[]).await.is_ok());
    }
}
