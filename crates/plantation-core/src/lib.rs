//! Resident farm state, the trigger API, and background persistence for the
//! Plantation farm system.
//!
//! A session loads the owner's farms into the [`PlantationStore`]. Triggers on
//! [`Plantation`] then run synchronously against that resident state, and a
//! [`Reconciler`] task writes changed owners back to the durable store.
//!
//! ```text
//! session_started --> PlantationStore::load_farms --> FarmRepository
//! claim / harvest / upgrade / collect / sell --> resident slot (no I/O)
//! Reconciler tick / session end / shutdown   --> FarmRepository
//! ```
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `plantation-config.yaml`.
//! - [`error`] -- [`StoreError`], returned by the store and every trigger.
//! - [`reconcile`] -- Periodic flush, session end, and the bounded final flush.
//! - [`service`] -- [`Plantation`], the foreground trigger API.
//! - [`store`] -- [`PlantationStore`], per-owner resident slots.

pub mod config;
pub mod error;
pub mod reconcile;
pub mod service;
pub mod store;

pub use config::{BackendKind, ConfigError, PlantationConfig};
pub use error::StoreError;
pub use reconcile::{FlushReport, Reconciler, ReconcilerConfig, ReconcilerHandle};
pub use service::{CollaboratorSet, Plantation};
pub use store::{LoadState, PlantationStore};
