//! Enumeration types shared across the Plantation workspace.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// One of the three independently levelled upgrade tracks of a farm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum UpgradeTrack {
    /// Raises the storage capacity of the farm.
    Storage,
    /// Raises the efficiency multiplier, shortening the growth cycle.
    Speed,
    /// Raises the drop chance of every drop-table entry.
    Quality,
}

impl UpgradeTrack {
    /// All tracks in a fixed order.
    pub const ALL: [Self; 3] = [Self::Storage, Self::Speed, Self::Quality];

    /// Stable lowercase name used in logs and configuration.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Storage => "storage",
            Self::Speed => "speed",
            Self::Quality => "quality",
        }
    }
}

impl core::fmt::Display for UpgradeTrack {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an upgrade material was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum MaterialSource {
    /// The player's immediate inventory.
    Inventory,
    /// The external pooled-storage collaborator.
    Pool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_names_are_snake_case() {
        for track in UpgradeTrack::ALL {
            let json = serde_json::to_string(&track).unwrap_or_default();
            assert_eq!(json, format!("\"{}\"", track.as_str()));
        }
    }
}
