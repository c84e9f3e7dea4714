//! Runtime selection between the durable backends.

use plantation_types::{OwnerId, PlayerStats};

use crate::dragonfly::DragonflyFarmRepository;
use crate::error::DbError;
use crate::farm_store::PgFarmRepository;
use crate::record::StoredFarm;
use crate::repository::{FarmRepository, MemoryFarmRepository};

/// A [`FarmRepository`] chosen at startup from configuration.
pub enum AnyRepository {
    /// `PostgreSQL` tables.
    Postgres(PgFarmRepository),
    /// `Dragonfly` hashes.
    Dragonfly(DragonflyFarmRepository),
    /// Process-local map; nothing survives a restart.
    Memory(MemoryFarmRepository),
}

impl AnyRepository {
    /// Short name of the active backend, for logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::Dragonfly(_) => "dragonfly",
            Self::Memory(_) => "memory",
        }
    }

    /// Close the underlying connections, if any.
    pub async fn close(&self) {
        match self {
            Self::Postgres(repo) => repo.pool().close().await,
            Self::Dragonfly(repo) => {
                if let Err(e) = repo.pool().close().await {
                    tracing::warn!(error = %e, "Failed to close Dragonfly connection");
                }
            }
            Self::Memory(_) => {}
        }
    }
}

impl FarmRepository for AnyRepository {
    async fn load_farms(&self, owner: OwnerId) -> Result<Vec<StoredFarm>, DbError> {
        match self {
            Self::Postgres(repo) => repo.load_farms(owner).await,
            Self::Dragonfly(repo) => repo.load_farms(owner).await,
            Self::Memory(repo) => repo.load_farms(owner).await,
        }
    }

    async fn upsert_farms(&self, owner: OwnerId, farms: &[StoredFarm]) -> Result<(), DbError> {
        match self {
            Self::Postgres(repo) => repo.upsert_farms(owner, farms).await,
            Self::Dragonfly(repo) => repo.upsert_farms(owner, farms).await,
            Self::Memory(repo) => repo.upsert_farms(owner, farms).await,
        }
    }

    async fn load_stats(&self, owner: OwnerId) -> Result<Option<PlayerStats>, DbError> {
        match self {
            Self::Postgres(repo) => repo.load_stats(owner).await,
            Self::Dragonfly(repo) => repo.load_stats(owner).await,
            Self::Memory(repo) => repo.load_stats(owner).await,
        }
    }

    async fn upsert_stats(&self, owner: OwnerId, stats: &PlayerStats) -> Result<(), DbError> {
        match self {
            Self::Postgres(repo) => repo.upsert_stats(owner, stats).await,
            Self::Dragonfly(repo) => repo.upsert_stats(owner, stats).await,
            Self::Memory(repo) => repo.upsert_stats(owner, stats).await,
        }
    }

    async fn delete_owner(&self, owner: OwnerId) -> Result<(), DbError> {
        match self {
            Self::Postgres(repo) => repo.delete_owner(owner).await,
            Self::Dragonfly(repo) => repo.delete_owner(owner).await,
            Self::Memory(repo) => repo.delete_owner(owner).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_variant_delegates() {
        let repo = AnyRepository::Memory(MemoryFarmRepository::new());
        assert_eq!(repo.name(), "memory");
        let owner = OwnerId::new();
        assert!(repo.upsert_stats(owner, &PlayerStats::default()).await.is_ok());
        assert_eq!(
            repo.load_stats(owner).await.ok().flatten(),
            Some(PlayerStats::default())
        );
        repo.close().await;
    }
}
