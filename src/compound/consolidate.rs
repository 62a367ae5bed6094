//! SG-032: consolidate, many source wells into one dest well.
//!
//! Source wells are grouped so each group fits one tip load. Each group is
//! aspirated well by well, then dispensed in a single dispense.

use super::transfer::{aspirate_side, mix_at};
use super::utils::{
    blowout_util, delay_in_well, dispense_air_gap_step, dispense_step, pipette_spec, replace_tip,
    require_labware, run, tip_capacity, touch_tip_step, BlowoutUtilArgs, FlowRates,
};
use crate::core::args::{ChangeTip, ConsolidateArgs};
use crate::core::command::CommandCreatorResult;
use crate::core::context::InvariantContext;
use crate::core::errors;
use crate::core::executor::CurriedCommandCreator;
use crate::core::planner::{chunk, max_wells_per_chunk};
use crate::core::state::RobotState;

pub fn consolidate(
    args: &ConsolidateArgs,
    ctx: &InvariantContext,
    state: &RobotState,
) -> CommandCreatorResult {
    let common = &args.common;
    let spec = pipette_spec(ctx, &common.pipette)?;
    require_labware(ctx, &[&common.source_labware, &common.dest_labware])?;
    if !common.volume.is_finite() || common.volume <= 0.0 {
        return Err(errors::invalid_volume("consolidate", common.volume).into());
    }
    if args.source_wells.is_empty() {
        return Err(errors::invalid_args("consolidate needs at least one source well").into());
    }

    let air_gap = common.air_gap().unwrap_or(0.0);
    let capacity = tip_capacity(ctx, &common.pipette)?;
    let per_chunk = max_wells_per_chunk(capacity, common.volume + air_gap, 0.0);
    if per_chunk == 0 {
        return Err(
            errors::pipette_volume_exceeded("consolidate", common.volume + air_gap, capacity).into(),
        );
    }

    let rates = FlowRates::resolve(
        spec,
        common.aspirate_flow_rate,
        common.dispense_flow_rate,
        common.blowout_flow_rate,
    );
    let dest_labware = common.dest_labware.as_str();
    let dest = args.dest_well.as_str();
    let pipette = common.pipette.as_str();
    let chunks = chunk(&args.source_wells, per_chunk);

    let mut creators: Vec<CurriedCommandCreator> = Vec::new();
    for (i, wells) in chunks.iter().enumerate() {
        // one dispense per chunk, so perSource/perDest change as often as always
        let fresh_tip = match common.change_tip {
            ChangeTip::Always | ChangeTip::PerSource | ChangeTip::PerDest => true,
            ChangeTip::Once => i == 0,
            ChangeTip::Never => false,
        };
        if fresh_tip {
            creators.push(replace_tip(pipette));
        }

        for (j, source) in wells.iter().enumerate() {
            // mixing after the first aspirate would contaminate the source
            let mut side = common.clone();
            if j > 0 {
                side.mix_before_aspirate = None;
            }
            creators.extend(aspirate_side(
                &side,
                ctx,
                &rates,
                source,
                common.volume,
                fresh_tip && j == 0,
            ));
        }

        // every aspirate in the chunk leaves its own gap stacked in the tip
        if let Some(air_gap) = common.air_gap() {
            let stacked = air_gap * wells.len() as f64;
            creators.push(dispense_air_gap_step(ctx, pipette, stacked, dest_labware, dest, rates.dispense));
        }
        creators.push(dispense_step(
            pipette,
            common.volume * wells.len() as f64,
            dest_labware,
            dest,
            common.dispense_offset_from_bottom_mm,
            rates.dispense,
        ));
        if let Some(delay) = &common.dispense_delay {
            creators.push(delay_in_well(pipette, dest_labware, dest, delay));
        }
        if common.touch_tip_after_dispense {
            creators.push(touch_tip_step(
                ctx,
                pipette,
                dest_labware,
                dest,
                common.touch_tip_after_dispense_offset_mm_from_bottom,
            ));
        }
        if let Some(mix) = args.mix_in_destination {
            creators.extend(mix_at(
                pipette,
                dest_labware,
                dest,
                mix,
                common.dispense_offset_from_bottom_mm,
                &rates,
            ));
        }
        let last_source = wells.last().map(String::as_str).unwrap_or_default();
        creators.extend(blowout_util(
            &BlowoutUtilArgs {
                pipette,
                source_labware: &common.source_labware,
                source_well: last_source,
                dest_labware,
                dest_well: dest,
                blowout_location: common.blowout_location.as_deref(),
                flow_rate: rates.blowout,
                offset_from_top_mm: common.blowout_offset_from_top_mm,
            },
            ctx,
        ));
    }

    tracing::debug!(
        pipette = %pipette,
        wells = args.source_wells.len(),
        chunks = chunks.len(),
        "consolidate planned"
    );
    run(creators, ctx, state)
}
