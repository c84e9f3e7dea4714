//! Deterministic plot allocation and cell lookup.
//!
//! Every owner is assigned a square plot on an `N x N` grid of plot cells.
//! The cell is derived from the owner's 128-bit identifier:
//!
//! ```text
//! h      = owner.as_u128()
//! column = h mod N
//! row    = (h / N) mod N
//! ```
//!
//! Plot cells are `plot_spacing` apart and plots are `plot_size` wide with
//! `plot_spacing > plot_size`, so plots in distinct cells never overlap.
//! Nothing is stored: a [`PlantationArea`] is recomputed on demand.
//!
//! Inside a plot each farm type owns a [`SubGrid`] of cells placed by its
//! catalog [`PlotLayout`](plantation_types::PlotLayout). Cell `(row, column)`
//! maps to instance index `row * columns + column + 1`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use plantation_types::{FarmTypeDef, FarmTypeId, OwnerId, WorldPos};

use crate::catalog::Catalog;
use crate::error::WorldError;

/// Fraction of a cell that places a point on the cell centre.
const HALF: f64 = 0.5;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Geometry of the plot grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotConfig {
    /// Number of plot cells per side of the grid (`N`).
    #[serde(default = "default_grid_size")]
    pub grid_size: u32,

    /// Width and depth of one plot.
    #[serde(default = "default_plot_size")]
    pub plot_size: f64,

    /// Distance between the minimum corners of neighbouring plots.
    #[serde(default = "default_plot_spacing")]
    pub plot_spacing: f64,

    /// X coordinate of the grid's first plot.
    #[serde(default)]
    pub origin_x: f64,

    /// Z coordinate of the grid's first plot.
    #[serde(default)]
    pub origin_z: f64,

    /// Bottom of every plot's bounding box.
    #[serde(default)]
    pub min_y: f64,

    /// Top of every plot's bounding box.
    #[serde(default = "default_max_y")]
    pub max_y: f64,

    /// Height at which farm cells are placed.
    #[serde(default = "default_ground_y")]
    pub ground_y: f64,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            grid_size: default_grid_size(),
            plot_size: default_plot_size(),
            plot_spacing: default_plot_spacing(),
            origin_x: 0.0,
            origin_z: 0.0,
            min_y: 0.0,
            max_y: default_max_y(),
            ground_y: default_ground_y(),
        }
    }
}

const fn default_grid_size() -> u32 {
    1024
}

const fn default_plot_size() -> f64 {
    64.0
}

const fn default_plot_spacing() -> f64 {
    96.0
}

const fn default_max_y() -> f64 {
    256.0
}

const fn default_ground_y() -> f64 {
    64.0
}

// ---------------------------------------------------------------------------
// SubGrid
// ---------------------------------------------------------------------------

/// The cell grid of one farm type inside one plot.
#[derive(Debug, Clone, PartialEq)]
pub struct SubGrid {
    /// Minimum corner of the first cell.
    pub corner: WorldPos,
    /// Number of rows (along z).
    pub rows: u32,
    /// Number of columns (along x).
    pub columns: u32,
    /// Width of one cell.
    pub cell_spacing: f64,
    /// Highest valid instance index.
    pub max_instances: u32,
}

impl SubGrid {
    /// Map a world position to an instance index.
    ///
    /// Positions behind the grid's corner, past its last row or column, or
    /// not finite resolve to index 1. Cells beyond `max_instances` clamp to
    /// `max_instances`.
    pub fn index_at(&self, pos: WorldPos) -> u32 {
        let Some((row, column)) = self.cell_at(pos) else {
            return 1;
        };
        let index = row
            .checked_mul(self.columns)
            .and_then(|v| v.checked_add(column))
            .and_then(|v| v.checked_add(1))
            .unwrap_or(1);
        index.clamp(1, self.max_instances.max(1))
    }

    /// World position (cell centre) of an instance index.
    ///
    /// Returns `None` for indices outside `1..=max_instances`.
    pub fn position_of(&self, index: u32) -> Option<WorldPos> {
        if index == 0 || index > self.max_instances || self.columns == 0 {
            return None;
        }
        let zero_based = index.checked_sub(1)?;
        let row = zero_based.checked_div(self.columns)?;
        let column = zero_based.checked_rem(self.columns)?;
        Some(WorldPos::new(
            self.corner.x + (f64::from(column) + HALF) * self.cell_spacing,
            self.corner.y,
            self.corner.z + (f64::from(row) + HALF) * self.cell_spacing,
        ))
    }

    /// Whether a position lies over this grid (x/z only).
    ///
    /// Near edges are inclusive and far edges exclusive, so grids that share
    /// an edge never both claim a position.
    pub fn covers(&self, pos: WorldPos) -> bool {
        let width = f64::from(self.columns) * self.cell_spacing;
        let depth = f64::from(self.rows) * self.cell_spacing;
        pos.x >= self.corner.x
            && pos.x < self.corner.x + width
            && pos.z >= self.corner.z
            && pos.z < self.corner.z + depth
    }

    /// The `(row, column)` under a position, if it is inside the grid.
    fn cell_at(&self, pos: WorldPos) -> Option<(u32, u32)> {
        let rel_x = (pos.x - self.corner.x) / self.cell_spacing;
        let rel_z = (pos.z - self.corner.z) / self.cell_spacing;
        if !rel_x.is_finite() || !rel_z.is_finite() || rel_x < 0.0 || rel_z < 0.0 {
            return None;
        }
        let column = floor_below(rel_x, self.columns)?;
        let row = floor_below(rel_z, self.rows)?;
        Some((row, column))
    }
}

/// `floor(value)` as a `u32` if it is below `limit`.
///
/// The caller guarantees `value` is finite and non-negative.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn floor_below(value: f64, limit: u32) -> Option<u32> {
    let floored = value.floor();
    if floored >= f64::from(limit) {
        return None;
    }
    // In range [0, limit) after the check above.
    Some(floored as u32)
}

// ---------------------------------------------------------------------------
// PlantationArea
// ---------------------------------------------------------------------------

/// A player's plot: bounding box plus the cell grid of every farm type.
#[derive(Debug, Clone, PartialEq)]
pub struct PlantationArea {
    /// The owner of the plot.
    pub owner: OwnerId,
    /// Grid column of the plot.
    pub column: u32,
    /// Grid row of the plot.
    pub row: u32,
    /// Minimum corner of the bounding box.
    pub min: WorldPos,
    /// Maximum corner of the bounding box.
    pub max: WorldPos,
    /// Cell grid of each farm type.
    pub layouts: BTreeMap<FarmTypeId, SubGrid>,
}

impl PlantationArea {
    /// Axis-aligned membership test, inclusive on every face.
    pub fn contains(&self, pos: WorldPos) -> bool {
        aabb_contains(self.min, self.max, pos)
    }

    /// Whether this plot's bounding box intersects another's.
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
            && self.min.z <= other.max.z
            && other.min.z <= self.max.z
    }

    /// The farm type whose cell grid lies under a position.
    pub fn farm_type_at(&self, pos: WorldPos) -> Option<&FarmTypeId> {
        self.layouts
            .iter()
            .find(|(_, grid)| grid.covers(pos))
            .map(|(id, _)| id)
    }
}

/// Membership in the box spanned by two corners, whichever order they are in.
pub fn aabb_contains(a: WorldPos, b: WorldPos, pos: WorldPos) -> bool {
    let within = |p: f64, lo: f64, hi: f64| p >= lo.min(hi) && p <= lo.max(hi);
    within(pos.x, a.x, b.x) && within(pos.y, a.y, b.y) && within(pos.z, a.z, b.z)
}

// ---------------------------------------------------------------------------
// PlotAllocator
// ---------------------------------------------------------------------------

/// Pure mapping from owners to plots and from positions to instance indices.
#[derive(Debug, Clone)]
pub struct PlotAllocator {
    config: PlotConfig,
}

impl PlotAllocator {
    /// Create an allocator after validating its configuration.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidPlotConfig`] if the grid is smaller than
    /// 2x2, the plot size is not positive, plots would touch or overlap
    /// (`plot_spacing <= plot_size`), or the vertical range is empty.
    pub fn new(config: PlotConfig) -> Result<Self, WorldError> {
        if config.grid_size < 2 {
            return Err(WorldError::InvalidPlotConfig(format!(
                "grid_size must be at least 2, got {}",
                config.grid_size
            )));
        }
        if !(config.plot_size.is_finite() && config.plot_size > 0.0) {
            return Err(WorldError::InvalidPlotConfig(
                "plot_size must be positive".to_owned(),
            ));
        }
        if !(config.plot_spacing.is_finite() && config.plot_spacing > config.plot_size) {
            return Err(WorldError::InvalidPlotConfig(format!(
                "plot_spacing ({}) must exceed plot_size ({})",
                config.plot_spacing, config.plot_size
            )));
        }
        if !(config.min_y < config.max_y
            && config.ground_y >= config.min_y
            && config.ground_y <= config.max_y)
        {
            return Err(WorldError::InvalidPlotConfig(
                "expected min_y <= ground_y <= max_y and min_y < max_y".to_owned(),
            ));
        }
        if !(config.origin_x.is_finite() && config.origin_z.is_finite()) {
            return Err(WorldError::InvalidPlotConfig(
                "origin must be finite".to_owned(),
            ));
        }
        Ok(Self { config })
    }

    /// The validated configuration.
    pub const fn config(&self) -> &PlotConfig {
        &self.config
    }

    /// Check that every farm type's cell grid fits inside a plot.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidFarmType`] naming the first farm type
    /// whose grid extends past the plot edge.
    pub fn check_catalog(&self, catalog: &Catalog) -> Result<(), WorldError> {
        for def in catalog.iter() {
            let layout = &def.layout;
            let far_x = layout.offset_x + f64::from(layout.columns) * layout.cell_spacing;
            let far_z = layout.offset_z + f64::from(layout.rows) * layout.cell_spacing;
            if far_x > self.config.plot_size || far_z > self.config.plot_size {
                return Err(WorldError::InvalidFarmType {
                    id: def.id.clone(),
                    reason: format!(
                        "cell grid reaches ({far_x}, {far_z}) but plots are {} wide",
                        self.config.plot_size
                    ),
                });
            }
        }
        Ok(())
    }

    /// The `(column, row)` grid cell assigned to an owner.
    pub fn cell_of(&self, owner: OwnerId) -> (u32, u32) {
        let n = u128::from(self.config.grid_size);
        let h = owner.as_u128();
        let column = h.checked_rem(n).unwrap_or(0);
        let row = h.checked_div(n).and_then(|q| q.checked_rem(n)).unwrap_or(0);
        (
            u32::try_from(column).unwrap_or(0),
            u32::try_from(row).unwrap_or(0),
        )
    }

    /// Minimum corner of the plot in grid cell `(column, row)`.
    pub fn cell_min_corner(&self, column: u32, row: u32) -> WorldPos {
        WorldPos::new(
            self.config.origin_x + f64::from(column) * self.config.plot_spacing,
            self.config.min_y,
            self.config.origin_z + f64::from(row) * self.config.plot_spacing,
        )
    }

    /// Maximum corner of the plot in grid cell `(column, row)`.
    pub fn cell_max_corner(&self, column: u32, row: u32) -> WorldPos {
        let min = self.cell_min_corner(column, row);
        WorldPos::new(
            min.x + self.config.plot_size,
            self.config.max_y,
            min.z + self.config.plot_size,
        )
    }

    /// Compute an owner's plot with the cell grid of every catalog entry.
    pub fn plot_of(&self, owner: OwnerId, catalog: &Catalog) -> PlantationArea {
        let (column, row) = self.cell_of(owner);
        let layouts = catalog
            .iter()
            .map(|def| (def.id.clone(), self.grid_in_cell(column, row, def)))
            .collect();
        PlantationArea {
            owner,
            column,
            row,
            min: self.cell_min_corner(column, row),
            max: self.cell_max_corner(column, row),
            layouts,
        }
    }

    /// The cell grid of one farm type inside an owner's plot.
    pub fn sub_grid(&self, owner: OwnerId, def: &FarmTypeDef) -> SubGrid {
        let (column, row) = self.cell_of(owner);
        self.grid_in_cell(column, row, def)
    }

    /// Map a world position to an instance index of `def` in the owner's plot.
    pub fn instance_index_at(&self, owner: OwnerId, def: &FarmTypeDef, pos: WorldPos) -> u32 {
        self.sub_grid(owner, def).index_at(pos)
    }

    /// World position of instance `index` of `def` in the owner's plot.
    pub fn position_of(&self, owner: OwnerId, def: &FarmTypeDef, index: u32) -> Option<WorldPos> {
        self.sub_grid(owner, def).position_of(index)
    }

    /// Whether a position lies inside the owner's plot.
    pub fn contains(&self, owner: OwnerId, pos: WorldPos) -> bool {
        let (column, row) = self.cell_of(owner);
        aabb_contains(
            self.cell_min_corner(column, row),
            self.cell_max_corner(column, row),
            pos,
        )
    }

    fn grid_in_cell(&self, column: u32, row: u32, def: &FarmTypeDef) -> SubGrid {
        let min = self.cell_min_corner(column, row);
        SubGrid {
            corner: WorldPos::new(
                min.x + def.layout.offset_x,
                self.config.ground_y,
                min.z + def.layout.offset_z,
            ),
            rows: def.layout.rows,
            columns: def.layout.columns,
            cell_spacing: def.layout.cell_spacing,
            max_instances: def.max_instances,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
