//! SG-025: pickUpTip and dropTip.

use super::Checks;
use crate::core::command::{Command, CommandCreatorResult, CommandsAndWarnings, PipetteAccessParams};
use crate::core::context::InvariantContext;
use crate::core::definitions::tiprack_well_names_by_col;
use crate::core::errors;
use crate::core::state::RobotState;

/// Pick up a tip from a tiprack well. The well must still hold a tip.
///
/// An 8-channel pipette must target the top well of a column, and every well
/// in that column must hold a tip.
pub fn pick_up_tip(
    params: &PipetteAccessParams,
    ctx: &InvariantContext,
    state: &RobotState,
) -> CommandCreatorResult {
    let mut checks = Checks::new(ctx, state);
    let channels = if checks.pipette(&params.pipette) {
        if state.pipette_has_tip(&params.pipette) {
            checks.push(errors::tip_already_on_pipette(&params.pipette));
        }
        state.pipettes.get(&params.pipette).map(|p| p.channels).unwrap_or(1)
    } else {
        1
    };
    if checks.labware_well(&params.labware, &params.well) {
        if let Some(empty) = missing_tip(&params.labware, &params.well, channels, state) {
            checks.push(errors::no_tip_in_tiprack_well(&params.labware, &empty));
        }
    }
    checks.finish(CommandsAndWarnings::single(Command::PickUpTip(params.clone())))
}

/// First well the pick-up needs that has no tip, if any.
fn missing_tip(tiprack_id: &str, well: &str, channels: u8, state: &RobotState) -> Option<String> {
    if channels <= 1 {
        return (!state.tiprack_well_has_tip(tiprack_id, well)).then(|| well.to_string());
    }
    let Some(column) = tiprack_well_names_by_col()
        .iter()
        .find(|col| col.first().map(String::as_str) == Some(well))
    else {
        // not the top of a column
        return Some(well.to_string());
    };
    column
        .iter()
        .find(|w| !state.tiprack_well_has_tip(tiprack_id, w))
        .cloned()
}

/// Drop the current tip. The target well's tip flag is left as is.
pub fn drop_tip(
    params: &PipetteAccessParams,
    ctx: &InvariantContext,
    state: &RobotState,
) -> CommandCreatorResult {
    let mut checks = Checks::new(ctx, state);
    checks.pipette_with_tip(&params.pipette, "drop tip");
    checks.labware_well(&params.labware, &params.well);
    checks.finish(CommandsAndWarnings::single(Command::DropTip(params.clone())))
}
