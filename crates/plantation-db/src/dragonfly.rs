//! `Dragonfly` (Redis-compatible) farm storage.
//!
//! An alternative durable backend for deployments that already run
//! `Dragonfly` with persistence enabled. Each owner gets a hash with one
//! field per farm, so an upsert only rewrites the fields it touches.
//!
//! # Key Patterns
//!
//! | Pattern | Type | Description |
//! |---------|------|-------------|
//! | `plantation:{owner}:farms` | Hash | `{farm_type}#{index}` -> JSON [`FarmDocument`] |
//! | `plantation:{owner}:stats` | JSON | [`PlayerStats`] |

use std::collections::HashMap;

use fred::prelude::*;
use serde::Serialize;
use serde::de::DeserializeOwned;

use plantation_types::{OwnerId, PlayerStats};

use crate::error::DbError;
use crate::record::{FarmDocument, StoredFarm};
use crate::repository::FarmRepository;

/// Connection handle to a `Dragonfly` (Redis-compatible) instance.
#[derive(Clone)]
pub struct DragonflyPool {
    client: Client,
}

impl DragonflyPool {
    /// Connect to `Dragonfly` at `redis://host:port[/db]`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if the URL cannot be parsed, or
    /// [`DbError::Dragonfly`] if the connection fails.
    pub async fn connect(url: &str) -> Result<Self, DbError> {
        let config = Config::from_url(url)
            .map_err(|e| DbError::Config(format!("Invalid Dragonfly URL: {e}")))?;

        let client = Builder::from_config(config).build()?;
        client.init().await?;

        tracing::info!("Connected to Dragonfly");
        Ok(Self { client })
    }

    /// Serialize `value` as JSON and store it at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Serialization`] or [`DbError::Dragonfly`].
    pub async fn set_json<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<(), DbError> {
        let json = serde_json::to_string(value)?;
        let _: () = self.client.set(key, json.as_str(), None, None, false).await?;
        Ok(())
    }

    /// Read the JSON value at `key`, if present.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Serialization`] or [`DbError::Dragonfly`].
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, DbError> {
        let value: Option<String> = self.client.get(key).await?;
        value
            .map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(DbError::from)
    }

    /// Write several fields of a hash.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the write fails.
    pub async fn hset_fields(&self, key: &str, fields: HashMap<String, String>) -> Result<(), DbError> {
        if fields.is_empty() {
            return Ok(());
        }
        let _: () = self.client.hset(key, fields).await?;
        Ok(())
    }

    /// Read every field of a hash (empty if the key does not exist).
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the read fails.
    pub async fn hgetall_fields(&self, key: &str) -> Result<HashMap<String, String>, DbError> {
        let fields: HashMap<String, String> = self.client.hgetall(key).await?;
        Ok(fields)
    }

    /// Delete keys.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the delete fails.
    pub async fn delete(&self, keys: Vec<String>) -> Result<(), DbError> {
        let _: u32 = self.client.del(keys).await?;
        Ok(())
    }

    /// Gracefully close the connection.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the client fails to quit.
    pub async fn close(&self) -> Result<(), DbError> {
        self.client.quit().await?;
        tracing::info!("Dragonfly connection closed");
        Ok(())
    }
}

fn farms_key(owner: OwnerId) -> String {
    format!("plantation:{owner}:farms")
}

fn stats_key(owner: OwnerId) -> String {
    format!("plantation:{owner}:stats")
}

/// `Dragonfly`-backed farm repository.
#[derive(Clone)]
pub struct DragonflyFarmRepository {
    pool: DragonflyPool,
}

impl DragonflyFarmRepository {
    /// Create a repository over a connected client.
    pub const fn new(pool: DragonflyPool) -> Self {
        Self { pool }
    }

    /// The underlying connection.
    pub const fn pool(&self) -> &DragonflyPool {
        &self.pool
    }
}

impl FarmRepository for DragonflyFarmRepository {
    async fn load_farms(&self, owner: OwnerId) -> Result<Vec<StoredFarm>, DbError> {
        let fields = self.pool.hgetall_fields(&farms_key(owner)).await?;
        let farms = decode_fields(owner, &fields);
        tracing::debug!(owner = %owner, count = farms.len(), "Loaded farms from Dragonfly");
        Ok(farms)
    }

    async fn upsert_farms(&self, owner: OwnerId, farms: &[StoredFarm]) -> Result<(), DbError> {
        let mut fields = HashMap::with_capacity(farms.len());
        for farm in farms {
            let doc = FarmDocument::from_farm(farm)?;
            fields.insert(farm.field(), serde_json::to_string(&doc)?);
        }
        self.pool.hset_fields(&farms_key(owner), fields).await
    }

    async fn load_stats(&self, owner: OwnerId) -> Result<Option<PlayerStats>, DbError> {
        self.pool.get_json(&stats_key(owner)).await
    }

    async fn upsert_stats(&self, owner: OwnerId, stats: &PlayerStats) -> Result<(), DbError> {
        self.pool.set_json(&stats_key(owner), stats).await
    }

    async fn delete_owner(&self, owner: OwnerId) -> Result<(), DbError> {
        self.pool
            .delete(vec![farms_key(owner), stats_key(owner)])
            .await?;
        tracing::info!(owner = %owner, "Deleted owner farm data");
        Ok(())
    }
}

/// Decode every hash field into a farm, skipping fields that do not parse.
fn decode_fields(owner: OwnerId, fields: &HashMap<String, String>) -> Vec<StoredFarm> {
    let mut farms: Vec<StoredFarm> = fields
        .iter()
        .filter_map(|(field, json)| {
            let decoded = serde_json::from_str::<FarmDocument>(json)
                .map_err(DbError::from)
                .and_then(|doc| doc.into_farm(owner));
            match decoded {
                Ok(farm) => Some(farm),
                Err(e) => {
                    tracing::warn!(
                        owner = %owner,
                        field = %field,
                        error = %e,
                        "Skipping undecodable farm document"
                    );
                    None
                }
            }
        })
        .collect();
    farms.sort_by(|a, b| a.slot().cmp(&b.slot()));
    farms
}
