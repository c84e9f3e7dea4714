//! Error types for the `plantation-ledger` crate.
//!
//! Every capability reports refusals through [`LedgerError`]. A refusal is
//! never partial: when an operation returns an error, the backing balance or
//! quantity is unchanged.

use rust_decimal::Decimal;

use plantation_types::{OwnerId, StorageKey};

/// Errors returned by the currency, inventory and material pool capabilities.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The owner cannot cover a withdrawal.
    #[error("insufficient balance for {owner}: requested {requested}, available {available}")]
    InsufficientBalance {
        /// The account holder.
        owner: OwnerId,
        /// The amount the caller tried to withdraw.
        requested: Decimal,
        /// The balance at the time of the request.
        available: Decimal,
    },

    /// Currency amounts must not be negative.
    #[error("currency amount must not be negative, got {0}")]
    NegativeAmount(Decimal),

    /// The owner does not hold enough of a material.
    #[error("insufficient {key} for {owner}: requested {requested}, available {available}")]
    InsufficientMaterial {
        /// The holder.
        owner: OwnerId,
        /// The material slot.
        key: StorageKey,
        /// The quantity the caller tried to remove.
        requested: u64,
        /// The quantity held at the time of the request.
        available: u64,
    },

    /// No external material pool is attached.
    #[error("no external material pool is available")]
    PoolUnavailable,

    /// The backing service declined the operation.
    #[error("operation refused: {0}")]
    Refused(String),

    /// Arithmetic overflow while applying a change.
    #[error("arithmetic overflow in ledger operation")]
    ArithmeticOverflow,
}
