//! SG-006: Robot state selectors.
//!
//! Pure queries over a `RobotState`. Lookups of unknown ids fail soft: they
//! return `None` and log a warning rather than aborting generation.

use super::context::InvariantContext;
use super::definitions::{tiprack_well_names_by_col, tiprack_well_names_flat};
use super::state::{LabwareState, PipetteState, RobotState, WellTips};

/// Location of the next usable tip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextTip {
    pub tiprack_id: String,
    pub well: String,
}

pub fn get_pipette_channels(pipette_id: &str, state: &RobotState) -> Option<u8> {
    match state.pipettes.get(pipette_id) {
        Some(p) => Some(p.channels),
        None => {
            tracing::warn!(pipette = pipette_id, "no pipette with this id in robot state");
            None
        }
    }
}

pub fn get_labware_type<'a>(labware_id: &str, state: &'a RobotState) -> Option<&'a str> {
    match state.labware.get(labware_id) {
        Some(lw) => Some(lw.labware_type.as_str()),
        None => {
            tracing::warn!(labware = labware_id, "no labware with this id in robot state");
            None
        }
    }
}

/// Numeric deck slot for a labware. Labware on a module takes the module's slot.
fn deck_slot(labware: &LabwareState, state: &RobotState) -> Option<u32> {
    let slot = match state.modules.get(&labware.slot) {
        Some(module) => &module.slot,
        None => &labware.slot,
    };
    slot.parse().ok()
}

/// Labware ids ordered by deck slot, numerically. Slots that are not numbers
/// sort last; equal slots sort by id.
pub fn sort_labware_by_slot(state: &RobotState) -> Vec<String> {
    let mut keyed: Vec<(Option<u32>, &String)> = state
        .labware
        .iter()
        .map(|(id, lw)| (deck_slot(lw, state), id))
        .collect();
    keyed.sort_by(|(a_slot, a_id), (b_slot, b_id)| match (a_slot, b_slot) {
        (Some(a), Some(b)) => a.cmp(b).then_with(|| a_id.cmp(b_id)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a_id.cmp(b_id),
    });
    keyed.into_iter().map(|(_, id)| id.clone()).collect()
}

/// A tiprack is usable by a pipette when its type matches the pipette's
/// tiprack model (any type if the pipette has none) and it is not assigned to
/// a different pipette.
pub fn tiprack_is_available_to_pipette(
    pipette_id: &str,
    pipette: &PipetteState,
    tiprack_type: &str,
    assigned_pipette_id: Option<&str>,
) -> bool {
    let model_ok = pipette
        .tiprack_model
        .as_deref()
        .map_or(true, |model| model == tiprack_type);
    let assignment_ok = assigned_pipette_id.map_or(true, |assigned| assigned == pipette_id);
    model_ok && assignment_ok
}

/// Next tip in one rack. Single-channel takes the first filled well in
/// column order; 8-channel needs a full column and returns its top well.
pub fn next_tip_in_rack(channels: u8, wells: &WellTips) -> Option<String> {
    let has_tip = |well: &String| wells.get(well).copied().unwrap_or(false);
    if channels == 1 {
        return tiprack_well_names_flat()
            .iter()
            .find(|w| has_tip(w))
            .cloned();
    }
    tiprack_well_names_by_col()
        .iter()
        .find(|col| col.iter().all(has_tip))
        .and_then(|col| col.first().cloned())
}

/// Next available tip for a pipette across every compatible tiprack, in slot order.
pub fn next_tip(pipette_id: &str, state: &RobotState) -> Option<NextTip> {
    let pipette = match state.pipettes.get(pipette_id) {
        Some(p) => p,
        None => {
            tracing::warn!(pipette = pipette_id, "next tip requested for unknown pipette");
            return None;
        }
    };
    sort_labware_by_slot(state).into_iter().find_map(|labware_id| {
        let wells = state.tip_state.tipracks.get(&labware_id)?;
        let labware = state.labware.get(&labware_id)?;
        let assigned = state.tiprack_assignment.get(&labware_id).map(String::as_str);
        if !tiprack_is_available_to_pipette(pipette_id, pipette, &labware.labware_type, assigned) {
            return None;
        }
        next_tip_in_rack(pipette.channels, wells).map(|well| NextTip {
            tiprack_id: labware_id.clone(),
            well,
        })
    })
}

/// Usable volume of the tip currently on a pipette, or 0 if none is tracked.
pub fn get_max_tip_volume(pipette_id: &str, state: &RobotState) -> f64 {
    let tip = state
        .tip_state
        .pipettes
        .get(pipette_id)
        .and_then(|t| t.tip_max_volume)
        .unwrap_or(0.0);
    match state.pipettes.get(pipette_id) {
        Some(p) => tip.min(p.max_volume),
        None => 0.0,
    }
}

/// Tip volume of a tiprack labware.
pub fn get_tiprack_volume(labware_id: &str, ctx: &InvariantContext) -> Option<f64> {
    let volume = ctx.labware_definition(labware_id).and_then(|def| def.tip_volume);
    if volume.is_none() {
        tracing::warn!(labware = labware_id, "labware is not a known tiprack");
    }
    volume
}

/// Total liquid capacity of one well.
pub fn get_well_total_volume(ctx: &InvariantContext, labware_id: &str, well: &str) -> Option<f64> {
    ctx.labware_definition(labware_id)?
        .well(well)
        .map(|w| w.total_liquid_volume)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixtures::*;
    use crate::core::state::PipetteTipState;
    use proptest::prelude::*;
    use std::sync::Arc;

    #[test]
    fn test_sg006_channels_and_type() {
        let state = make_state();
        assert_eq!(get_pipette_channels("p300MultiId", &state), Some(8));
        assert_eq!(get_pipette_channels("ghost", &state), None);
        assert_eq!(get_labware_type("troughId", &state), Some(RESERVOIR));
        assert_eq!(get_labware_type("ghost", &state), None);
    }

    #[test]
    fn test_sg006_sort_by_numeric_slot() {
        let state = make_state();
        let order = sort_labware_by_slot(&state);
        // tiprack2Id sits in slot 10, inserted first
        assert_eq!(order[0], "tiprack1Id");
        let pos = |id: &str| order.iter().position(|x| x == id).unwrap();
        assert!(pos("troughId") < pos("tempPlateId"));
        assert!(pos("pcrPlateId") < pos("magPlateId"));
        assert!(pos("magPlateId") < pos("tiprack2Id"));
        assert_eq!(order.last().map(String::as_str), Some("fixedTrash"));
    }

    #[test]
    fn test_sg006_non_numeric_slots_sort_last() {
        let mut state = make_state();
        Arc::make_mut(&mut state.labware).insert(
            "offDeckId".to_string(),
            LabwareState {
                labware_type: PLATE_96.to_string(),
                slot: "offDeck".to_string(),
            },
        );
        let order = sort_labware_by_slot(&state);
        assert_eq!(order.last().map(String::as_str), Some("offDeckId"));
    }

    #[test]
    fn test_sg006_tiprack_availability() {
        let state = make_state();
        let pipette = &state.pipettes["p300SingleId"];
        assert!(tiprack_is_available_to_pipette("p300SingleId", pipette, TIPRACK_300, None));
        assert!(tiprack_is_available_to_pipette(
            "p300SingleId",
            pipette,
            TIPRACK_300,
            Some("p300SingleId")
        ));
        assert!(!tiprack_is_available_to_pipette(
            "p300SingleId",
            pipette,
            TIPRACK_300,
            Some("p300MultiId")
        ));
        assert!(!tiprack_is_available_to_pipette(
            "p300SingleId",
            pipette,
            "opentrons_96_tiprack_10ul",
            None
        ));
    }

    #[test]
    fn test_sg006_next_tip_single_channel() {
        let state = make_state();
        let tip = next_tip("p300SingleId", &state).unwrap();
        assert_eq!(tip.tiprack_id, "tiprack1Id");
        assert_eq!(tip.well, "A1");

        let state = empty_wells(state, "tiprack1Id", &["A1", "B1"]);
        assert_eq!(next_tip("p300SingleId", &state).unwrap().well, "C1");
    }

    #[test]
    fn test_sg006_next_tip_moves_to_next_rack() {
        let state = empty_tiprack(make_state(), "tiprack1Id");
        let tip = next_tip("p300SingleId", &state).unwrap();
        assert_eq!(tip.tiprack_id, "tiprack2Id");
        assert_eq!(tip.well, "A1");

        let state = empty_tiprack(state, "tiprack2Id");
        assert!(next_tip("p300SingleId", &state).is_none());
    }

    #[test]
    fn test_sg006_next_tip_multi_channel_full_column() {
        let state = empty_wells(make_state(), "tiprack1Id", &["C2"]);
        let tip = next_tip("p300MultiId", &state).unwrap();
        assert_eq!(tip.well, "A1");

        let state = empty_wells(
            state,
            "tiprack1Id",
            &["A1", "B1", "C1", "D1", "E1", "F1", "G1", "H1"],
        );
        let tip = next_tip("p300MultiId", &state).unwrap();
        assert_eq!(tip.tiprack_id, "tiprack1Id");
        assert_eq!(tip.well, "A3");
    }

    #[test]
    fn test_sg006_next_tip_respects_assignment() {
        let mut state = make_state();
        Arc::make_mut(&mut state.tiprack_assignment)
            .insert("tiprack1Id".to_string(), "p300MultiId".to_string());
        let tip = next_tip("p300SingleId", &state).unwrap();
        assert_eq!(tip.tiprack_id, "tiprack2Id");
        assert_eq!(next_tip("p300MultiId", &state).unwrap().tiprack_id, "tiprack1Id");
    }

    #[test]
    fn test_sg006_max_tip_volume() {
        let state = make_state();
        assert_eq!(get_max_tip_volume("p300SingleId", &state), 0.0);
        let mut state = with_tip(state, "p300SingleId");
        assert_eq!(get_max_tip_volume("p300SingleId", &state), 300.0);
        Arc::make_mut(&mut state.tip_state.pipettes).insert(
            "p300SingleId".to_string(),
            PipetteTipState {
                has_tip: true,
                tip_max_volume: Some(1000.0),
            },
        );
        assert_eq!(get_max_tip_volume("p300SingleId", &state), 300.0);
    }

    #[test]
    fn test_sg006_tiprack_and_well_volume() {
        let ctx = make_context();
        assert_eq!(get_tiprack_volume("tiprack1Id", &ctx), Some(300.0));
        assert_eq!(get_tiprack_volume("sourcePlateId", &ctx), None);
        assert_eq!(get_well_total_volume(&ctx, "sourcePlateId", "A1"), Some(360.0));
        assert_eq!(get_well_total_volume(&ctx, "sourcePlateId", "Z9"), None);
    }

    fn well_index() -> impl Strategy<Value = Vec<bool>> {
        prop::collection::vec(any::<bool>(), 96)
    }

    fn rack_from(mask: &[bool]) -> WellTips {
        tiprack_well_names_flat()
            .iter()
            .zip(mask)
            .map(|(w, has)| (w.clone(), *has))
            .collect()
    }

    proptest! {
        #[test]
        fn test_sg006_next_tip_never_returns_used_well(mask in well_index()) {
            let rack = rack_from(&mask);
            if let Some(well) = next_tip_in_rack(1, &rack) {
                prop_assert!(rack[&well]);
            } else {
                prop_assert!(mask.iter().all(|has| !has));
            }
        }

        #[test]
        fn test_sg006_multi_channel_only_full_columns(mask in well_index()) {
            let rack = rack_from(&mask);
            if let Some(well) = next_tip_in_rack(8, &rack) {
                let col = tiprack_well_names_by_col()
                    .iter()
                    .find(|c| c[0] == well)
                    .unwrap();
                prop_assert!(col.iter().all(|w| rack[w]));
            }
        }

        #[test]
        fn test_sg006_selectors_idempotent(mask in well_index()) {
            let rack = rack_from(&mask);
            prop_assert_eq!(next_tip_in_rack(1, &rack), next_tip_in_rack(1, &rack));
            prop_assert_eq!(next_tip_in_rack(8, &rack), next_tip_in_rack(8, &rack));
        }
    }
}
