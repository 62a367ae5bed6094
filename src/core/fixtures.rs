//! Shared test fixtures: a small deck with two pipettes, two tipracks,
//! plates, a reservoir and one of each module.

use super::context::*;
use super::definitions::{
    builtin_labware_definition, builtin_pipette_spec, FIXED_TRASH_ID, FIXED_TRASH_TYPE,
};
use super::state::*;
use indexmap::IndexMap;
use std::sync::Arc;

pub const TIPRACK_300: &str = "opentrons_96_tiprack_300ul";
pub const PLATE_96: &str = "corning_96_wellplate_360ul_flat";
pub const PCR_PLATE: &str = "biorad_96_wellplate_200ul_pcr";
pub const RESERVOIR: &str = "usascientific_12_reservoir_22ml";

const LABWARE: &[(&str, &str, &str)] = &[
    ("tiprack2Id", TIPRACK_300, "10"),
    ("tiprack1Id", TIPRACK_300, "1"),
    ("sourcePlateId", PLATE_96, "3"),
    ("destPlateId", PLATE_96, "4"),
    ("troughId", RESERVOIR, "5"),
    ("tempPlateId", PLATE_96, "tempDeckId"),
    ("pcrPlateId", PCR_PLATE, "thermocyclerId"),
    ("magPlateId", PLATE_96, "magDeckId"),
    (FIXED_TRASH_ID, FIXED_TRASH_TYPE, "12"),
];

const MODULES: &[(&str, ModuleType, &str, &str)] = &[
    ("magDeckId", ModuleType::Magnetic, "magneticModuleV1", "9"),
    ("tempDeckId", ModuleType::Temperature, "temperatureModuleV1", "6"),
    ("thermocyclerId", ModuleType::Thermocycler, "thermocyclerModuleV1", "7"),
];

pub fn make_context() -> InvariantContext {
    let mut ctx = InvariantContext::default();
    for (_, labware_type, _) in LABWARE {
        if let Some(def) = builtin_labware_definition(labware_type) {
            ctx.labware_definitions.insert(labware_type.to_string(), def);
        }
    }
    for (id, labware_type, _) in LABWARE {
        ctx.labware_entities.insert(
            id.to_string(),
            LabwareEntity {
                id: id.to_string(),
                labware_type: labware_type.to_string(),
            },
        );
    }
    for (id, model) in [("p300SingleId", "p300_single"), ("p300MultiId", "p300_multi")] {
        ctx.pipette_entities.insert(
            id.to_string(),
            PipetteEntity {
                id: id.to_string(),
                spec: builtin_pipette_spec(model).unwrap(),
                tiprack_model: Some(TIPRACK_300.to_string()),
            },
        );
    }
    for (id, module_type, model, _) in MODULES {
        ctx.module_entities.insert(
            id.to_string(),
            ModuleEntity {
                id: id.to_string(),
                module_type: *module_type,
                model: model.to_string(),
            },
        );
    }
    ctx
}

pub fn make_setup() -> DeckSetup {
    DeckSetup {
        labware_slots: LABWARE
            .iter()
            .map(|(id, _, slot)| (id.to_string(), slot.to_string()))
            .collect(),
        pipette_mounts: [
            ("p300SingleId".to_string(), Mount::Left),
            ("p300MultiId".to_string(), Mount::Right),
        ]
        .into_iter()
        .collect(),
        module_slots: MODULES
            .iter()
            .map(|(id, _, _, slot)| (id.to_string(), slot.to_string()))
            .collect(),
        tiprack_assignment: IndexMap::new(),
        liquids: None,
    }
}

/// Fresh state: full tipracks, no tips on pipettes, no liquid tracking.
pub fn make_state() -> RobotState {
    RobotState::initial(&make_context(), &make_setup())
}

/// Fresh state tracking liquid: 200 µL in every source well, 20 mL in trough A1.
pub fn make_state_with_liquid() -> RobotState {
    let mut setup = make_setup();
    let plate: LabwareContents = builtin_labware_definition(PLATE_96)
        .unwrap()
        .wells
        .keys()
        .map(|w| (w.clone(), [("0".to_string(), 200.0)].into_iter().collect()))
        .collect();
    let mut trough = LabwareContents::new();
    trough.insert(
        "A1".to_string(),
        [("0".to_string(), 20_000.0)].into_iter().collect(),
    );
    let mut liquids = IndexMap::new();
    liquids.insert("sourcePlateId".to_string(), plate);
    liquids.insert("troughId".to_string(), trough);
    setup.liquids = Some(liquids);
    RobotState::initial(&make_context(), &setup)
}

/// Give a pipette a 300 µL tip without touching the tipracks.
pub fn with_tip(mut state: RobotState, pipette_id: &str) -> RobotState {
    Arc::make_mut(&mut state.tip_state.pipettes).insert(
        pipette_id.to_string(),
        PipetteTipState {
            has_tip: true,
            tip_max_volume: Some(300.0),
        },
    );
    state
}

/// Mark every listed tiprack well empty.
pub fn empty_wells(mut state: RobotState, tiprack_id: &str, wells: &[&str]) -> RobotState {
    let racks = Arc::make_mut(&mut state.tip_state.tipracks);
    if let Some(rack) = racks.get_mut(tiprack_id) {
        let rack = Arc::make_mut(rack);
        for well in wells {
            rack.insert(well.to_string(), false);
        }
    }
    state
}

/// Mark every well of a tiprack empty.
pub fn empty_tiprack(state: RobotState, tiprack_id: &str) -> RobotState {
    let wells: Vec<String> = state
        .tip_state
        .tipracks
        .get(tiprack_id)
        .map(|rack| rack.keys().cloned().collect())
        .unwrap_or_default();
    let refs: Vec<&str> = wells.iter().map(String::as_str).collect();
    empty_wells(state, tiprack_id, &refs)
}

/// Set the thermocycler lid state.
pub fn with_lid(mut state: RobotState, open: bool) -> RobotState {
    let modules = Arc::make_mut(&mut state.modules);
    if let Some(module) = modules.get_mut("thermocyclerId") {
        if let ModuleState::Thermocycler { lid_open, .. } = &mut module.module_state {
            *lid_open = Some(open);
        }
    }
    state
}
