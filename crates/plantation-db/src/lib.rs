//! Durable storage for the Plantation farm system.
//!
//! Farms are saved per owner as structured progression columns plus an
//! encoded storage ledger. `PostgreSQL` is the default backend; `Dragonfly`
//! (with persistence enabled) and a process-local map are alternatives
//! selected at startup through [`AnyRepository`].
//!
//! ```text
//! PlantationStore
//!     |
//!     +-- load / flush --> FarmRepository
//!                             |-- PgFarmRepository        (farm_instances + farm_storage)
//!                             |-- DragonflyFarmRepository (plantation:{owner}:farms)
//!                             +-- MemoryFarmRepository    (tests, single process)
//! ```
//!
//! # Modules
//!
//! - [`repository`] -- The [`FarmRepository`] boundary and the in-memory backend
//! - [`farm_store`] -- `PostgreSQL` backend
//! - [`dragonfly`] -- `Dragonfly` backend
//! - [`backend`] -- Runtime backend selection
//! - [`postgres`] -- `PostgreSQL` connection pool and configuration
//! - [`record`] -- Store-neutral farm rows
//! - [`ledger_codec`] -- Versioned binary encoding of storage ledgers
//! - [`error`] -- Shared error types

pub mod backend;
pub mod dragonfly;
pub mod error;
pub mod farm_store;
pub mod ledger_codec;
pub mod postgres;
pub mod record;
pub mod repository;

pub use backend::AnyRepository;
pub use dragonfly::{DragonflyFarmRepository, DragonflyPool};
pub use error::DbError;
pub use farm_store::{FarmRow, PgFarmRepository, StatsRow};
pub use ledger_codec::CodecError;
pub use postgres::{PostgresConfig, PostgresPool};
pub use record::{FarmDocument, StoredFarm};
pub use repository::{FarmRepository, MemoryFarmRepository};
