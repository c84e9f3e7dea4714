//! Error types for the server binary.

/// Top-level error for the server binary.
///
/// Each variant wraps one subsystem's error so `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: plantation_core::ConfigError,
    },

    /// Catalog or plot configuration was rejected.
    #[error("world error: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: plantation_world::WorldError,
    },

    /// The durable backend could not be reached or migrated.
    #[error("database error: {source}")]
    Db {
        /// The underlying database error.
        #[from]
        source: plantation_db::DbError,
    },

    /// The plantation service could not be composed.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: plantation_core::StoreError,
    },
}
