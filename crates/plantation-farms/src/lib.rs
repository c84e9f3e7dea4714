//! Farm instances, the harvest engine and the upgrade economy.
//!
//! This crate is the gameplay core of the Plantation farm system. It owns
//! the rules for how a farm grows, what a harvest yields, and what an
//! upgrade costs. It performs no I/O: currency and materials move through
//! the [`plantation_ledger`] capabilities, and persistence is handled by
//! `plantation-core`.
//!
//! # Modules
//!
//! - [`config`] -- [`EconomyConfig`] coefficients and per-track [`UpgradeCurve`]s.
//! - [`instance`] -- [`FarmInstance`], its [`FarmKey`] and snapshots.
//! - [`harvest`] -- Drop-table evaluation.
//! - [`upgrade`] -- Upgrade pricing, all-or-nothing upgrades and leveling.
//! - [`error`] -- [`FarmError`].

pub mod config;
pub mod error;
pub mod harvest;
pub mod instance;
pub mod upgrade;

pub use config::{CurveMaterial, EconomyConfig, UpgradeCurve};
pub use error::{FarmError, LevelKind};
pub use harvest::harvest;
pub use instance::{FarmInstance, FarmKey};
pub use upgrade::{apply_upgrade, level_up, upgrade_cost};
