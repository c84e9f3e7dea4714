//! Property tests for plot allocation and instance lookup.
#![allow(missing_docs)]

use proptest::prelude::*;
use uuid::Uuid;

use plantation_types::{OwnerId, WorldPos};
use plantation_world::{Catalog, PlotAllocator, PlotConfig};

fn catalog() -> Catalog {
    Catalog::new(Catalog::default_catalog()).unwrap_or_else(|e| panic!("{e}"))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Every valid index maps to a position that maps back to it.
    #[test]
    fn index_position_round_trip(raw in any::<u128>()) {
        let alloc = PlotAllocator::new(PlotConfig::default())
            .unwrap_or_else(|e| panic!("{e}"));
        let cat = catalog();
        let owner = OwnerId::from(Uuid::from_u128(raw));
        for def in cat.iter() {
            for index in 1..=def.max_instances {
                let pos = alloc.position_of(owner, def, index);
                prop_assert!(pos.is_some());
                let pos = pos.unwrap_or_default();
                prop_assert_eq!(alloc.instance_index_at(owner, def, pos), index);
                prop_assert!(alloc.contains(owner, pos));
            }
        }
    }

    /// Plots in different grid cells never share a point.
    #[test]
    fn distinct_cells_are_disjoint(
        grid in 2_u32..64,
        a_col in 0_u32..64, a_row in 0_u32..64,
        b_col in 0_u32..64, b_row in 0_u32..64,
        size in 1.0_f64..200.0,
        gap in 0.01_f64..50.0,
    ) {
        let config = PlotConfig {
            grid_size: grid,
            plot_size: size,
            plot_spacing: size + gap,
            ..PlotConfig::default()
        };
        let alloc = PlotAllocator::new(config).unwrap_or_else(|e| panic!("{e}"));
        let (a_col, a_row) = (a_col % grid, a_row % grid);
        let (b_col, b_row) = (b_col % grid, b_row % grid);
        prop_assume!((a_col, a_row) != (b_col, b_row));

        let a_min = alloc.cell_min_corner(a_col, a_row);
        let a_max = alloc.cell_max_corner(a_col, a_row);
        let b_min = alloc.cell_min_corner(b_col, b_row);
        let b_max = alloc.cell_max_corner(b_col, b_row);
        let overlap_x = a_min.x <= b_max.x && b_min.x <= a_max.x;
        let overlap_z = a_min.z <= b_max.z && b_min.z <= a_max.z;
        prop_assert!(!(overlap_x && overlap_z));
    }

    /// Owners that hash to different cells get disjoint plots.
    #[test]
    fn owners_in_distinct_cells_do_not_overlap(a in any::<u128>(), b in any::<u128>()) {
        let alloc = PlotAllocator::new(PlotConfig::default())
            .unwrap_or_else(|e| panic!("{e}"));
        let cat = catalog();
        let pa = alloc.plot_of(OwnerId::from(Uuid::from_u128(a)), &cat);
        let pb = alloc.plot_of(OwnerId::from(Uuid::from_u128(b)), &cat);
        prop_assume!((pa.column, pa.row) != (pb.column, pb.row));
        prop_assert!(!pa.intersects(&pb));
    }

    /// Any position resolves to an index within `1..=max_instances`.
    #[test]
    fn index_is_always_in_range(
        raw in any::<u128>(),
        dx in -500.0_f64..500.0,
        dz in -500.0_f64..500.0,
    ) {
        let alloc = PlotAllocator::new(PlotConfig::default())
            .unwrap_or_else(|e| panic!("{e}"));
        let cat = catalog();
        let owner = OwnerId::from(Uuid::from_u128(raw));
        let area = alloc.plot_of(owner, &cat);
        let pos = WorldPos::new(area.min.x + dx, 64.0, area.min.z + dz);
        for def in cat.iter() {
            let index = alloc.instance_index_at(owner, def, pos);
            prop_assert!(index >= 1 && index <= def.max_instances);
        }
    }
}
