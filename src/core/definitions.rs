//! SG-004: Built-in labware definitions, pipette specs and well-name helpers.

use super::context::{LabwareDefinition, PipetteSpec, WellDefinition};
use indexmap::IndexMap;
use std::sync::OnceLock;

/// Id of the trash that is always present on the deck.
pub const FIXED_TRASH_ID: &str = "fixedTrash";

/// Labware type of the fixed trash.
pub const FIXED_TRASH_TYPE: &str = "opentrons_1_trash_1100ml_fixed";

/// Deck slot of the fixed trash.
pub const FIXED_TRASH_SLOT: &str = "12";

/// Number of deck slots.
pub const DECK_SLOTS: u32 = 12;

const ROWS_96: usize = 8;
const COLS_96: usize = 12;

/// Names of every built-in labware type.
pub const BUILTIN_LABWARE: &[&str] = &[
    "opentrons_96_tiprack_10ul",
    "opentrons_96_tiprack_300ul",
    "opentrons_96_tiprack_1000ul",
    "corning_96_wellplate_360ul_flat",
    "biorad_96_wellplate_200ul_pcr",
    "usascientific_12_reservoir_22ml",
    FIXED_TRASH_TYPE,
];

/// Names of every built-in pipette model.
pub const BUILTIN_PIPETTES: &[&str] = &[
    "p10_single",
    "p10_multi",
    "p50_single",
    "p300_single",
    "p300_multi",
    "p1000_single",
];

fn row_letter(row: usize) -> char {
    (b'A' + row as u8) as char
}

/// 96-format well names grouped by column: `[[A1..H1], [A2..H2], ...]`.
pub fn tiprack_well_names_by_col() -> &'static [Vec<String>] {
    static BY_COL: OnceLock<Vec<Vec<String>>> = OnceLock::new();
    BY_COL.get_or_init(|| grid_ordering(ROWS_96, COLS_96))
}

/// 96-format well names flattened column by column: A1, B1, ... H1, A2, ... H12.
pub fn tiprack_well_names_flat() -> &'static [String] {
    static FLAT: OnceLock<Vec<String>> = OnceLock::new();
    FLAT.get_or_init(|| tiprack_well_names_by_col().iter().flatten().cloned().collect())
}

fn grid_ordering(rows: usize, cols: usize) -> Vec<Vec<String>> {
    (0..cols)
        .map(|col| {
            (0..rows)
                .map(|row| format!("{}{}", row_letter(row), col + 1))
                .collect()
        })
        .collect()
}

/// Build a rectangular labware definition with identical wells.
pub fn grid_definition(
    display_name: &str,
    rows: usize,
    cols: usize,
    well: WellDefinition,
    tip_volume: Option<f64>,
) -> LabwareDefinition {
    let ordering = grid_ordering(rows, cols);
    let wells: IndexMap<String, WellDefinition> = ordering
        .iter()
        .flatten()
        .map(|name| (name.clone(), well.clone()))
        .collect();
    LabwareDefinition {
        display_name: display_name.to_string(),
        is_tiprack: tip_volume.is_some(),
        tip_volume,
        ordering,
        wells,
    }
}

/// Look up a built-in labware definition by type.
pub fn builtin_labware_definition(labware_type: &str) -> Option<LabwareDefinition> {
    let well = |depth: f64, total_liquid_volume: f64| WellDefinition {
        depth,
        total_liquid_volume,
    };
    let def = match labware_type {
        "opentrons_96_tiprack_10ul" => grid_definition(
            "Opentrons 96 Tip Rack 10 µL",
            ROWS_96,
            COLS_96,
            well(39.2, 10.0),
            Some(10.0),
        ),
        "opentrons_96_tiprack_300ul" => grid_definition(
            "Opentrons 96 Tip Rack 300 µL",
            ROWS_96,
            COLS_96,
            well(59.3, 300.0),
            Some(300.0),
        ),
        "opentrons_96_tiprack_1000ul" => grid_definition(
            "Opentrons 96 Tip Rack 1000 µL",
            ROWS_96,
            COLS_96,
            well(78.5, 1000.0),
            Some(1000.0),
        ),
        "corning_96_wellplate_360ul_flat" => grid_definition(
            "Corning 96 Well Plate 360 µL Flat",
            ROWS_96,
            COLS_96,
            well(10.67, 360.0),
            None,
        ),
        "biorad_96_wellplate_200ul_pcr" => grid_definition(
            "Bio-Rad 96 Well Plate 200 µL PCR",
            ROWS_96,
            COLS_96,
            well(14.81, 200.0),
            None,
        ),
        "usascientific_12_reservoir_22ml" => grid_definition(
            "USA Scientific 12 Well Reservoir 22 mL",
            1,
            COLS_96,
            well(42.16, 22_000.0),
            None,
        ),
        FIXED_TRASH_TYPE => grid_definition(
            "Fixed Trash",
            1,
            1,
            well(0.0, 1_100_000.0),
            None,
        ),
        _ => return None,
    };
    Some(def)
}

/// Look up a built-in pipette spec by model name.
pub fn builtin_pipette_spec(name: &str) -> Option<PipetteSpec> {
    let (channels, min_volume, max_volume, aspirate, dispense) = match name {
        "p10_single" => (1, 1.0, 10.0, 5.0, 10.0),
        "p10_multi" => (8, 1.0, 10.0, 5.0, 10.0),
        "p50_single" => (1, 5.0, 50.0, 25.0, 50.0),
        "p300_single" => (1, 30.0, 300.0, 150.0, 300.0),
        "p300_multi" => (8, 30.0, 300.0, 150.0, 300.0),
        "p1000_single" => (1, 100.0, 1000.0, 500.0, 1000.0),
        _ => return None,
    };
    Some(PipetteSpec {
        name: name.to_string(),
        channels,
        min_volume,
        max_volume,
        default_aspirate_flow_rate: aspirate,
        default_dispense_flow_rate: dispense,
        default_blowout_flow_rate: 1000.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sg004_well_names_by_col() {
        let cols = tiprack_well_names_by_col();
        assert_eq!(cols.len(), 12);
        assert_eq!(cols[0], vec!["A1", "B1", "C1", "D1", "E1", "F1", "G1", "H1"]);
        assert_eq!(cols[11][7], "H12");
    }

    #[test]
    fn test_sg004_well_names_flat_order() {
        let flat = tiprack_well_names_flat();
        assert_eq!(flat.len(), 96);
        assert_eq!(flat[0], "A1");
        assert_eq!(flat[1], "B1");
        assert_eq!(flat[8], "A2");
        assert_eq!(flat[95], "H12");
    }

    #[test]
    fn test_sg004_builtin_tiprack() {
        let def = builtin_labware_definition("opentrons_96_tiprack_300ul").unwrap();
        assert!(def.is_tiprack);
        assert_eq!(def.tip_volume, Some(300.0));
        assert_eq!(def.wells.len(), 96);
    }

    #[test]
    fn test_sg004_reservoir_is_one_row() {
        let def = builtin_labware_definition("usascientific_12_reservoir_22ml").unwrap();
        assert_eq!(def.ordering.len(), 12);
        assert!(def.ordering.iter().all(|col| col.len() == 1));
        assert!(!def.is_tiprack);
    }

    #[test]
    fn test_sg004_every_builtin_resolves() {
        for name in BUILTIN_LABWARE {
            assert!(builtin_labware_definition(name).is_some(), "{}", name);
        }
        for name in BUILTIN_PIPETTES {
            assert!(builtin_pipette_spec(name).is_some(), "{}", name);
        }
        assert!(builtin_labware_definition("mystery_plate").is_none());
        assert!(builtin_pipette_spec("p20_octopus").is_none());
    }

    #[test]
    fn test_sg004_multi_channel_spec() {
        let spec = builtin_pipette_spec("p300_multi").unwrap();
        assert_eq!(spec.channels, 8);
        assert_eq!(spec.min_volume, 30.0);
    }
}
