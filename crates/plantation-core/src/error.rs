//! Error types for the plantation store and service.

use plantation_db::DbError;
use plantation_farms::{FarmError, FarmKey};
use plantation_ledger::LedgerError;
use plantation_types::{FarmTypeId, OwnerId};
use plantation_world::WorldError;

/// Errors returned by [`PlantationStore`](crate::store::PlantationStore) and
/// the [`Plantation`](crate::service::Plantation) triggers.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The durable store could not be read or written.
    #[error("persistence unavailable for {owner}: {source}")]
    PersistenceUnavailable {
        /// Owner whose farms were being loaded or saved.
        owner: OwnerId,
        /// The underlying store error.
        #[source]
        source: DbError,
    },

    /// The farm type is not in the catalog.
    #[error("unknown farm type: {0}")]
    UnknownFarmType(FarmTypeId),

    /// An instance with this key already exists.
    #[error("farm {0} already exists")]
    InstanceExists(FarmKey),

    /// The owner's farms have not finished loading.
    #[error("farms of {0} are not loaded yet")]
    NotLoaded(OwnerId),

    /// No instance with this key exists.
    #[error("farm {0} not found")]
    FarmNotFound(FarmKey),

    /// The position is not on one of the owner's farm cells.
    #[error("no farm cell of {owner} at the given position")]
    OutsidePlot {
        /// The owner whose plot was searched.
        owner: OwnerId,
    },

    /// A slot lock was poisoned by a panicking thread.
    #[error("store lock poisoned")]
    Poisoned,

    /// A gameplay rule rejected the operation.
    #[error(transparent)]
    Farm(#[from] FarmError),

    /// Catalog or allocator failure.
    #[error(transparent)]
    World(#[from] WorldError),

    /// A collaborator refused a currency or inventory movement.
    #[error(transparent)]
    Collaborator(#[from] LedgerError),
}
