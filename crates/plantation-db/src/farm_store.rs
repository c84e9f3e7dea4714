//! `PostgreSQL` implementation of [`FarmRepository`].
//!
//! Farms live in two tables keyed by `(owner_id, farm_type, instance_index)`:
//! `farm_instances` holds the structured progression columns and
//! `farm_storage` holds the encoded storage ledger. Stats live in
//! `player_stats`. A save writes all of an owner's rows in one transaction
//! using multi-row `UNNEST` upserts.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use plantation_types::{FarmTypeId, OwnerId, PlayerStats, WorldPos};

use crate::error::DbError;
use crate::ledger_codec;
use crate::postgres::PostgresPool;
use crate::record::StoredFarm;
use crate::repository::FarmRepository;

/// A joined row of `farm_instances` and `farm_storage`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FarmRow {
    /// Owner.
    pub owner_id: Uuid,
    /// Farm type key.
    pub farm_type: String,
    /// Instance index.
    pub instance_index: i32,
    /// Level.
    pub level: i32,
    /// Experience.
    pub experience: i64,
    /// Efficiency percentage.
    pub efficiency_pct: i32,
    /// Storage track level.
    pub storage_level: i32,
    /// Speed track level.
    pub speed_level: i32,
    /// Quality track level.
    pub quality_level: i32,
    /// Start of the current growth cycle.
    pub last_harvest: DateTime<Utc>,
    /// Location x.
    pub location_x: f64,
    /// Location y.
    pub location_y: f64,
    /// Location z.
    pub location_z: f64,
    /// Encoded ledger; `None` if no storage row exists yet.
    pub ledger: Option<Vec<u8>>,
}

impl TryFrom<FarmRow> for StoredFarm {
    type Error = DbError;

    fn try_from(row: FarmRow) -> Result<Self, Self::Error> {
        let storage = match row.ledger.as_deref() {
            Some(bytes) => ledger_codec::decode(bytes)?,
            None => BTreeMap::new(),
        };
        Ok(Self {
            owner: OwnerId::from(row.owner_id),
            farm_type: FarmTypeId::new(row.farm_type),
            index: to_u32(row.instance_index, "instance_index")?,
            level: to_u32(row.level, "level")?,
            experience: u64::try_from(row.experience)
                .map_err(|e| DbError::InvalidRow(format!("experience: {e}")))?,
            efficiency_pct: to_u32(row.efficiency_pct, "efficiency_pct")?,
            storage_level: to_u32(row.storage_level, "storage_level")?,
            speed_level: to_u32(row.speed_level, "speed_level")?,
            quality_level: to_u32(row.quality_level, "quality_level")?,
            last_harvest: row.last_harvest,
            location: WorldPos::new(row.location_x, row.location_y, row.location_z),
            storage,
        })
    }
}

/// Decode `rows`, dropping any that do not convert.
///
/// A skipped row stays in the database untouched until a farm with the same
/// key is saved over it.
fn decode_rows(owner: OwnerId, rows: Vec<FarmRow>) -> Vec<StoredFarm> {
    rows.into_iter()
        .filter_map(|row| {
            let farm_type = row.farm_type.clone();
            let index = row.instance_index;
            match StoredFarm::try_from(row) {
                Ok(farm) => Some(farm),
                Err(e) => {
                    tracing::warn!(
                        owner = %owner,
                        farm_type = %farm_type,
                        index,
                        error = %e,
                        "Skipping undecodable farm row"
                    );
                    None
                }
            }
        })
        .collect()
}

/// A row of `player_stats`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StatsRow {
    /// Successful harvests.
    pub total_harvests: i64,
    /// Units that entered farm storage.
    pub materials_collected: i64,
    /// Currency spent.
    pub currency_spent: Decimal,
    /// Currency earned.
    pub currency_earned: Decimal,
}

impl From<StatsRow> for PlayerStats {
    fn from(row: StatsRow) -> Self {
        Self {
            total_harvests: u64::try_from(row.total_harvests).unwrap_or(0),
            materials_collected: u64::try_from(row.materials_collected).unwrap_or(0),
            currency_spent: row.currency_spent,
            currency_earned: row.currency_earned,
        }
    }
}

fn to_u32(value: i32, column: &str) -> Result<u32, DbError> {
    u32::try_from(value).map_err(|e| DbError::InvalidRow(format!("{column}: {e}")))
}

fn to_i32(value: u32, column: &str) -> Result<i32, DbError> {
    i32::try_from(value).map_err(|e| DbError::InvalidRow(format!("{column}: {e}")))
}

/// `PostgreSQL`-backed farm repository.
#[derive(Clone)]
pub struct PgFarmRepository {
    pool: PostgresPool,
}

impl PgFarmRepository {
    /// Create a repository over a connected pool.
    pub const fn new(pool: PostgresPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    pub const fn pool(&self) -> &PostgresPool {
        &self.pool
    }
}

impl FarmRepository for PgFarmRepository {
    async fn load_farms(&self, owner: OwnerId) -> Result<Vec<StoredFarm>, DbError> {
        let rows = sqlx::query_as::<_, FarmRow>(
            r"SELECT f.owner_id, f.farm_type, f.instance_index, f.level, f.experience,
                     f.efficiency_pct, f.storage_level, f.speed_level, f.quality_level,
                     f.last_harvest, f.location_x, f.location_y, f.location_z, s.ledger
              FROM farm_instances f
              LEFT JOIN farm_storage s
                USING (owner_id, farm_type, instance_index)
              WHERE f.owner_id = $1
              ORDER BY f.farm_type, f.instance_index",
        )
        .bind(owner.into_inner())
        .fetch_all(self.pool.pool())
        .await?;

        tracing::debug!(owner = %owner, count = rows.len(), "Loaded farm rows");
        Ok(decode_rows(owner, rows))
    }

    async fn upsert_farms(&self, owner: OwnerId, farms: &[StoredFarm]) -> Result<(), DbError> {
        if farms.is_empty() {
            return Ok(());
        }

        let len = farms.len();
        let mut farm_types = Vec::with_capacity(len);
        let mut indices = Vec::with_capacity(len);
        let mut levels = Vec::with_capacity(len);
        let mut experience = Vec::with_capacity(len);
        let mut efficiency = Vec::with_capacity(len);
        let mut storage_levels = Vec::with_capacity(len);
        let mut speed_levels = Vec::with_capacity(len);
        let mut quality_levels = Vec::with_capacity(len);
        let mut last_harvests = Vec::with_capacity(len);
        let mut xs = Vec::with_capacity(len);
        let mut ys = Vec::with_capacity(len);
        let mut zs = Vec::with_capacity(len);
        let mut ledgers = Vec::with_capacity(len);

        for farm in farms {
            farm_types.push(farm.farm_type.as_str().to_owned());
            indices.push(to_i32(farm.index, "instance_index")?);
            levels.push(to_i32(farm.level, "level")?);
            experience.push(
                i64::try_from(farm.experience)
                    .map_err(|e| DbError::InvalidRow(format!("experience: {e}")))?,
            );
            efficiency.push(to_i32(farm.efficiency_pct, "efficiency_pct")?);
            storage_levels.push(to_i32(farm.storage_level, "storage_level")?);
            speed_levels.push(to_i32(farm.speed_level, "speed_level")?);
            quality_levels.push(to_i32(farm.quality_level, "quality_level")?);
            last_harvests.push(farm.last_harvest);
            xs.push(farm.location.x);
            ys.push(farm.location.y);
            zs.push(farm.location.z);
            ledgers.push(ledger_codec::encode(&farm.storage)?);
        }

        let mut tx = self.pool.pool().begin().await?;

        sqlx::query(
            r"INSERT INTO farm_instances (owner_id, farm_type, instance_index, level, experience, efficiency_pct, storage_level, speed_level, quality_level, last_harvest, location_x, location_y, location_z)
              SELECT $1::UUID, * FROM UNNEST($2::TEXT[], $3::INTEGER[], $4::INTEGER[], $5::BIGINT[], $6::INTEGER[], $7::INTEGER[], $8::INTEGER[], $9::INTEGER[], $10::TIMESTAMPTZ[], $11::DOUBLE PRECISION[], $12::DOUBLE PRECISION[], $13::DOUBLE PRECISION[])
              ON CONFLICT (owner_id, farm_type, instance_index) DO UPDATE SET
                level = EXCLUDED.level,
                experience = EXCLUDED.experience,
                efficiency_pct = EXCLUDED.efficiency_pct,
                storage_level = EXCLUDED.storage_level,
                speed_level = EXCLUDED.speed_level,
                quality_level = EXCLUDED.quality_level,
                last_harvest = EXCLUDED.last_harvest,
                location_x = EXCLUDED.location_x,
                location_y = EXCLUDED.location_y,
                location_z = EXCLUDED.location_z,
                updated_at = now()",
        )
        .bind(owner.into_inner())
        .bind(&farm_types)
        .bind(&indices)
        .bind(&levels)
        .bind(&experience)
        .bind(&efficiency)
        .bind(&storage_levels)
        .bind(&speed_levels)
        .bind(&quality_levels)
        .bind(&last_harvests)
        .bind(&xs)
        .bind(&ys)
        .bind(&zs)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"INSERT INTO farm_storage (owner_id, farm_type, instance_index, ledger)
              SELECT $1::UUID, * FROM UNNEST($2::TEXT[], $3::INTEGER[], $4::BYTEA[])
              ON CONFLICT (owner_id, farm_type, instance_index) DO UPDATE SET
                ledger = EXCLUDED.ledger",
        )
        .bind(owner.into_inner())
        .bind(&farm_types)
        .bind(&indices)
        .bind(&ledgers)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(owner = %owner, count = len, "Upserted farm rows (batch UNNEST)");
        Ok(())
    }

    async fn load_stats(&self, owner: OwnerId) -> Result<Option<PlayerStats>, DbError> {
        let row = sqlx::query_as::<_, StatsRow>(
            r"SELECT total_harvests, materials_collected, currency_spent, currency_earned
              FROM player_stats
              WHERE owner_id = $1",
        )
        .bind(owner.into_inner())
        .fetch_optional(self.pool.pool())
        .await?;
        Ok(row.map(PlayerStats::from))
    }

    async fn upsert_stats(&self, owner: OwnerId, stats: &PlayerStats) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO player_stats (owner_id, total_harvests, materials_collected, currency_spent, currency_earned)
              VALUES ($1, $2, $3, $4, $5)
              ON CONFLICT (owner_id) DO UPDATE SET
                total_harvests = EXCLUDED.total_harvests,
                materials_collected = EXCLUDED.materials_collected,
                currency_spent = EXCLUDED.currency_spent,
                currency_earned = EXCLUDED.currency_earned,
                updated_at = now()",
        )
        .bind(owner.into_inner())
        .bind(i64::try_from(stats.total_harvests).unwrap_or(i64::MAX))
        .bind(i64::try_from(stats.materials_collected).unwrap_or(i64::MAX))
        .bind(stats.currency_spent)
        .bind(stats.currency_earned)
        .execute(self.pool.pool())
        .await?;
        Ok(())
    }

    async fn delete_owner(&self, owner: OwnerId) -> Result<(), DbError> {
        let mut tx = self.pool.pool().begin().await?;
        // farm_storage rows go with their farm_instances row (ON DELETE CASCADE).
        sqlx::query("DELETE FROM farm_instances WHERE owner_id = $1")
            .bind(owner.into_inner())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM player_stats WHERE owner_id = $1")
            .bind(owner.into_inner())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        tracing::info!(owner = %owner, "Deleted owner farm data");
        Ok(())
    }
}
