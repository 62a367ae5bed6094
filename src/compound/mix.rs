//! SG-034: mix step, repeated aspirate/dispense in each listed well.

use super::utils::{
    blowout_util, mix_util, pipette_spec, replace_tip, require_labware, run, touch_tip_step,
    BlowoutUtilArgs, FlowRates, MixUtilArgs,
};
use crate::core::args::{ChangeTip, MixArgs};
use crate::core::command::CommandCreatorResult;
use crate::core::context::InvariantContext;
use crate::core::errors;
use crate::core::executor::CurriedCommandCreator;
use crate::core::state::RobotState;

pub fn mix(args: &MixArgs, ctx: &InvariantContext, state: &RobotState) -> CommandCreatorResult {
    let spec = pipette_spec(ctx, &args.pipette)?;
    require_labware(ctx, &[&args.labware])?;
    if !args.volume.is_finite() || args.volume <= 0.0 {
        return Err(errors::invalid_volume("mix", args.volume).into());
    }
    if args.times == 0 {
        return Err(errors::invalid_args("mix must repeat at least once").into());
    }

    let rates = FlowRates::resolve(
        spec,
        args.aspirate_flow_rate,
        args.dispense_flow_rate,
        args.blowout_flow_rate,
    );
    let pipette = args.pipette.as_str();
    let labware = args.labware.as_str();

    let mut creators: Vec<CurriedCommandCreator> = Vec::new();
    for (i, well) in args.wells.iter().enumerate() {
        let fresh_tip = match args.change_tip {
            ChangeTip::Always | ChangeTip::PerSource | ChangeTip::PerDest => true,
            ChangeTip::Once => i == 0,
            ChangeTip::Never => false,
        };
        if fresh_tip {
            creators.push(replace_tip(pipette));
        }
        creators.extend(mix_util(&MixUtilArgs {
            pipette,
            labware,
            well,
            volume: args.volume,
            times: args.times,
            aspirate_offset_from_bottom_mm: args.aspirate_offset_from_bottom_mm,
            dispense_offset_from_bottom_mm: args.dispense_offset_from_bottom_mm,
            aspirate_flow_rate: rates.aspirate,
            dispense_flow_rate: rates.dispense,
            aspirate_delay_seconds: args.aspirate_delay_seconds,
            dispense_delay_seconds: args.dispense_delay_seconds,
        }));
        creators.extend(blowout_util(
            &BlowoutUtilArgs {
                pipette,
                source_labware: labware,
                source_well: well,
                dest_labware: labware,
                dest_well: well,
                blowout_location: args.blowout_location.as_deref(),
                flow_rate: rates.blowout,
                offset_from_top_mm: args.blowout_offset_from_top_mm,
            },
            ctx,
        ));
        if args.touch_tip {
            creators.push(touch_tip_step(
                ctx,
                pipette,
                labware,
                well,
                args.touch_tip_offset_mm_from_bottom,
            ));
        }
    }
    run(creators, ctx, state)
}
