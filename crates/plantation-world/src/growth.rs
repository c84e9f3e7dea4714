//! Growth timing: how long a farm takes to become harvestable.
//!
//! Growth is evaluated lazily. Nothing ticks in the background; a farm is
//! ready once enough wall-clock time has passed since its last harvest:
//!
//! ```text
//! ready_at = last_harvest + base_growth * 100 / efficiency_pct
//! ```
//!
//! Efficiency is an integer percentage (100 = 1.0x), so a faster farm has a
//! strictly shorter cycle and the arithmetic stays exact.

use chrono::{DateTime, TimeDelta, Utc};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Efficiency of a farm with no speed upgrades, as a percentage.
pub const BASE_EFFICIENCY_PCT: u32 = 100;

/// Milliseconds per second.
const MILLIS_PER_SEC: u64 = 1000;

// ---------------------------------------------------------------------------
// Growth cycle
// ---------------------------------------------------------------------------

/// Length of one growth cycle at the given efficiency.
///
/// Returns `None` if `efficiency_pct` is zero or the duration overflows.
pub fn growth_duration(base_growth_secs: u64, efficiency_pct: u32) -> Option<TimeDelta> {
    if efficiency_pct == 0 {
        return None;
    }
    let base_ms = base_growth_secs.checked_mul(MILLIS_PER_SEC)?;
    let scaled = base_ms
        .checked_mul(u64::from(BASE_EFFICIENCY_PCT))?
        .checked_div(u64::from(efficiency_pct))?;
    let millis = i64::try_from(scaled).ok()?;
    TimeDelta::try_milliseconds(millis)
}

/// The instant a farm harvested at `last_harvest` becomes ready again.
///
/// Returns `None` on overflow.
pub fn ready_at(
    last_harvest: DateTime<Utc>,
    base_growth_secs: u64,
    efficiency_pct: u32,
) -> Option<DateTime<Utc>> {
    let cycle = growth_duration(base_growth_secs, efficiency_pct)?;
    last_harvest.checked_add_signed(cycle)
}

/// Whether a farm harvested at `last_harvest` is ready at `now`.
///
/// An overflowing ready time is treated as never ready.
pub fn is_ready(
    now: DateTime<Utc>,
    last_harvest: DateTime<Utc>,
    base_growth_secs: u64,
    efficiency_pct: u32,
) -> bool {
    ready_at(last_harvest, base_growth_secs, efficiency_pct).is_some_and(|ready| now >= ready)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
