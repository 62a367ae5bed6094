//! SG-023 / SG-024: blowout and touchTip.

use super::Checks;
use crate::core::command::{
    BlowoutParams, Command, CommandCreatorResult, CommandsAndWarnings, TouchTipParams,
};
use crate::core::context::InvariantContext;
use crate::core::state::RobotState;

/// Push remaining liquid out of the tip. Any placed labware is a valid target.
pub fn blowout(
    params: &BlowoutParams,
    ctx: &InvariantContext,
    state: &RobotState,
) -> CommandCreatorResult {
    let mut checks = Checks::new(ctx, state);
    checks.pipette_with_tip(&params.pipette, "blow out");
    checks.labware_well(&params.labware, &params.well);
    checks.lid_open(&params.labware);
    checks.finish(CommandsAndWarnings::single(Command::Blowout(params.clone())))
}

/// Touch the tip against the well walls to shed droplets.
pub fn touch_tip(
    params: &TouchTipParams,
    ctx: &InvariantContext,
    state: &RobotState,
) -> CommandCreatorResult {
    let mut checks = Checks::new(ctx, state);
    checks.pipette_with_tip(&params.pipette, "touch tip");
    checks.labware_well(&params.labware, &params.well);
    checks.lid_open(&params.labware);
    checks.finish(CommandsAndWarnings::single(Command::TouchTip(params.clone())))
}
