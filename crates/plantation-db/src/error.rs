//! Errors raised by the farm repositories.
//!
//! Every backend reports through [`DbError`]. The store above treats any of
//! them as the durable store being unavailable for that owner.

use crate::ledger_codec::CodecError;

/// Failure of a repository operation.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A `Dragonfly`/Redis operation failed.
    #[error("Dragonfly error: {0}")]
    Dragonfly(#[from] fred::error::Error),

    /// A `Dragonfly` document could not be encoded or decoded as JSON.
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A storage-ledger blob could not be decoded.
    #[error("Storage ledger codec error: {0}")]
    Codec(#[from] CodecError),

    /// A stored row holds a value outside its domain.
    #[error("Invalid row: {0}")]
    InvalidRow(String),

    /// The backend is unreachable or refused the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A connection URL or pool setting was rejected.
    #[error("Invalid backend configuration: {0}")]
    Config(String),
}
