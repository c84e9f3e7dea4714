//! Collaborator capabilities for the Plantation farm system.
//!
//! Farms spend and earn currency and move materials, but the currency ledger,
//! the player inventory and any shared material stockpile are owned by the
//! host. This crate names those boundaries as traits and ships simple
//! in-memory implementations for tests and the standalone server.
//!
//! # Modules
//!
//! - [`currency`] -- [`CurrencyLedger`] and [`InMemoryCurrency`].
//! - [`inventory`] -- [`PlayerInventory`] and [`InMemoryInventory`].
//! - [`pool`] -- [`MaterialPool`], [`NoMaterialPool`] and [`InMemoryMaterialPool`].
//! - [`error`] -- [`LedgerError`].

pub mod currency;
pub mod error;
pub mod inventory;
pub mod pool;

pub use currency::{CurrencyLedger, InMemoryCurrency};
pub use error::LedgerError;
pub use inventory::{InMemoryInventory, PlayerInventory, total_load};
pub use pool::{InMemoryMaterialPool, MaterialPool, NoMaterialPool};

/// Borrowed handles to every collaborator an operation may touch.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    /// The currency ledger.
    pub currency: &'a dyn CurrencyLedger,
    /// The player's carried inventory.
    pub inventory: &'a dyn PlayerInventory,
    /// The external material pool.
    pub pool: &'a dyn MaterialPool,
}

impl std::fmt::Debug for Collaborators<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
