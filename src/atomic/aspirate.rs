//! SG-020: aspirate.

use super::Checks;
use crate::core::command::{
    AspDispAirgapParams, Command, CommandCreatorResult, CommandCreatorWarning, CommandsAndWarnings,
};
use crate::core::context::InvariantContext;
use crate::core::effects::wells_for_channels;
use crate::core::errors;
use crate::core::selectors::get_max_tip_volume;
use crate::core::state::{total_volume, RobotState, VOLUME_EPSILON};

/// Draw liquid into the tip.
///
/// Fails without a tip, for unknown pipette, labware or well, inside a closed
/// thermocycler, and for a volume that is not positive or exceeds the tip.
/// When liquid is tracked, warns if a well the channels enter is empty or
/// holds less than the volume.
pub fn aspirate(
    params: &AspDispAirgapParams,
    ctx: &InvariantContext,
    state: &RobotState,
) -> CommandCreatorResult {
    let mut checks = Checks::new(ctx, state);
    let has_tip = checks.pipette_with_tip(&params.pipette, "aspirate");
    let well_ok = checks.labware_well(&params.labware, &params.well);
    checks.lid_open(&params.labware);
    if checks.positive_volume("aspirate", params.volume) && has_tip {
        let max = get_max_tip_volume(&params.pipette, state);
        if params.volume > max + VOLUME_EPSILON {
            checks.push(errors::pipette_volume_exceeded("aspirate", params.volume, max));
        }
    }
    if !checks.is_ok() {
        return checks.finish(CommandsAndWarnings::default());
    }

    let warnings = if well_ok {
        liquid_warnings(params, ctx, state)
    } else {
        Vec::new()
    };
    checks.finish(CommandsAndWarnings {
        commands: vec![Command::Aspirate(params.clone())],
        warnings,
    })
}

fn liquid_warnings(
    params: &AspDispAirgapParams,
    ctx: &InvariantContext,
    state: &RobotState,
) -> Vec<CommandCreatorWarning> {
    if state.liquid_state.is_none() {
        return Vec::new();
    }
    let channels = state
        .pipettes
        .get(&params.pipette)
        .map(|p| p.channels)
        .unwrap_or(1);
    let entered = wells_for_channels(ctx, &params.labware, &params.well, channels);
    let mut wells = entered.clone();
    wells.dedup();

    let mut pristine = false;
    let mut short = None;
    for well in &wells {
        // channels sharing one well each draw the full volume from it
        let sharing = entered.iter().filter(|w| *w == well).count();
        let demand = params.volume * sharing as f64;
        match state.well_contents(&params.labware, well) {
            None => pristine = true,
            Some(contents) => {
                let available = total_volume(contents);
                if demand > available + VOLUME_EPSILON && short.is_none() {
                    short = Some((well.clone(), demand, available));
                }
            }
        }
    }

    let mut warnings = Vec::new();
    if pristine {
        warnings.push(errors::aspirate_from_pristine_well(&params.labware, &params.well));
    }
    if let Some((well, demand, available)) = short {
        warnings.push(errors::aspirate_more_than_well_contents(
            &params.labware,
            &well,
            demand,
            available,
        ));
    }
    warnings
}
