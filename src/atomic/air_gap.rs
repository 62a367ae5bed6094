//! SG-022: airGap and dispenseAirGap.

use super::Checks;
use crate::core::command::{AspDispAirgapParams, Command, CommandCreatorResult, CommandsAndWarnings};
use crate::core::context::InvariantContext;
use crate::core::state::RobotState;

/// Draw air into the tip above a well.
pub fn air_gap(
    params: &AspDispAirgapParams,
    ctx: &InvariantContext,
    state: &RobotState,
) -> CommandCreatorResult {
    let mut checks = Checks::new(ctx, state);
    checks.pipette_with_tip(&params.pipette, "air gap");
    checks.labware_well(&params.labware, &params.well);
    checks.lid_open(&params.labware);
    checks.positive_volume("air gap", params.volume);
    checks.finish(CommandsAndWarnings::single(Command::AirGap(params.clone())))
}

/// Expel a previously drawn air gap.
pub fn dispense_air_gap(
    params: &AspDispAirgapParams,
    ctx: &InvariantContext,
    state: &RobotState,
) -> CommandCreatorResult {
    let mut checks = Checks::new(ctx, state);
    checks.pipette_with_tip(&params.pipette, "dispense an air gap");
    checks.labware_well(&params.labware, &params.well);
    checks.lid_open(&params.labware);
    checks.positive_volume("dispense an air gap", params.volume);
    checks.finish(CommandsAndWarnings::single(Command::DispenseAirGap(
        params.clone(),
    )))
}
