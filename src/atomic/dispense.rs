//! SG-021: dispense.

use super::Checks;
use crate::core::command::{AspDispAirgapParams, Command, CommandCreatorResult, CommandsAndWarnings};
use crate::core::context::InvariantContext;
use crate::core::effects::wells_for_channels;
use crate::core::errors;
use crate::core::selectors::get_well_total_volume;
use crate::core::state::{total_volume, RobotState, VOLUME_EPSILON};

/// Expel liquid from the tip into a well.
///
/// Overfilling a well is a warning, not an error: the command is still emitted.
pub fn dispense(
    params: &AspDispAirgapParams,
    ctx: &InvariantContext,
    state: &RobotState,
) -> CommandCreatorResult {
    let mut checks = Checks::new(ctx, state);
    checks.pipette_with_tip(&params.pipette, "dispense");
    let well_ok = checks.labware_well(&params.labware, &params.well);
    checks.lid_open(&params.labware);
    checks.positive_volume("dispense", params.volume);
    if !checks.is_ok() {
        return checks.finish(CommandsAndWarnings::default());
    }

    let mut warnings = Vec::new();
    if well_ok {
        let channels = state
            .pipettes
            .get(&params.pipette)
            .map(|p| p.channels)
            .unwrap_or(1);
        let mut wells = wells_for_channels(ctx, &params.labware, &params.well, channels);
        wells.dedup();
        for well in &wells {
            let Some(capacity) = get_well_total_volume(ctx, &params.labware, well) else {
                continue;
            };
            let current = state
                .well_contents(&params.labware, well)
                .map(total_volume)
                .unwrap_or(0.0);
            let after = current + params.volume;
            if after > capacity + VOLUME_EPSILON {
                warnings.push(errors::over_max_well_volume(
                    &params.labware,
                    well,
                    after,
                    capacity,
                ));
                break;
            }
        }
    }

    checks.finish(CommandsAndWarnings {
        commands: vec![Command::Dispense(params.clone())],
        warnings,
    })
}
