//! Error types for the `plantation-farms` crate.
//!
//! These are gameplay rule violations. They are returned as values and
//! shown to the player; none of them indicate a bug.

use rust_decimal::Decimal;

use plantation_types::{FarmTypeId, StorageKey, UpgradeTrack};

/// Errors raised by farm creation, upgrades and leveling.
#[derive(Debug, thiserror::Error)]
pub enum FarmError {
    /// The owner already holds the maximum number of instances of a type.
    #[error("instance limit reached for {farm_type}: {max} allowed")]
    InstanceLimitReached {
        /// The farm type.
        farm_type: FarmTypeId,
        /// The catalog limit.
        max: u32,
    },

    /// The instance index is outside `1..=max_instances`.
    #[error("invalid instance index {index} for {farm_type} (1..={max})")]
    InvalidInstanceIndex {
        /// The farm type.
        farm_type: FarmTypeId,
        /// The rejected index.
        index: u32,
        /// The catalog limit.
        max: u32,
    },

    /// The currency ledger cannot cover a cost.
    #[error("insufficient funds: need {required}, have {available}")]
    InsufficientFunds {
        /// Amount required.
        required: Decimal,
        /// Balance at the time of the check.
        available: Decimal,
    },

    /// Inventory and material pool together cannot cover a requirement.
    #[error("insufficient {key}: need {required}, have {available}")]
    InsufficientMaterials {
        /// The first slot that fell short.
        key: StorageKey,
        /// Units required.
        required: u32,
        /// Units available across inventory and pool.
        available: u64,
    },

    /// The track or the instance level is already at its maximum.
    #[error("{track} is already at its maximum level {max}")]
    MaxLevelReached {
        /// What was being raised (an upgrade track, or `level`).
        track: LevelKind,
        /// The maximum.
        max: u32,
    },

    /// Not enough experience to reach the next level.
    #[error("insufficient experience: need {required}, have {available}")]
    InsufficientExperience {
        /// Experience required for the next level.
        required: u64,
        /// Experience accumulated.
        available: u64,
    },

    /// A collaborator refused a debit or credit mid-operation.
    #[error("collaborator refused the operation: {0}")]
    Collaborator(#[from] plantation_ledger::LedgerError),

    /// The economy configuration is unusable.
    #[error("invalid economy configuration: {0}")]
    InvalidConfig(String),

    /// Arithmetic overflow in a checked computation.
    #[error("arithmetic overflow in farm calculation")]
    ArithmeticOverflow,
}

/// What a [`FarmError::MaxLevelReached`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelKind {
    /// An upgrade track.
    Track(UpgradeTrack),
    /// The instance level.
    Level,
}

impl std::fmt::Display for LevelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Track(track) => write!(f, "{track} upgrade"),
            Self::Level => f.write_str("farm level"),
        }
    }
}
