//! Error types for the `plantation-world` crate.
//!
//! Catalog validation and allocator configuration failures are reported
//! through [`WorldError`]. Spatial queries themselves never fail.

use plantation_types::FarmTypeId;

/// Errors that can occur while building the catalog or the plot allocator.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// Two catalog entries share the same key.
    #[error("duplicate farm type: {0}")]
    DuplicateFarmType(FarmTypeId),

    /// A farm type key was not found in the catalog.
    #[error("unknown farm type: {0}")]
    UnknownFarmType(FarmTypeId),

    /// A catalog entry failed validation.
    #[error("invalid farm type {id}: {reason}")]
    InvalidFarmType {
        /// The offending entry.
        id: FarmTypeId,
        /// Why it was rejected.
        reason: String,
    },

    /// The plot allocator configuration is unusable.
    #[error("invalid plot configuration: {0}")]
    InvalidPlotConfig(String),

    /// Arithmetic overflow during a checked operation.
    #[error("arithmetic overflow in world calculation")]
    ArithmeticOverflow,
}
