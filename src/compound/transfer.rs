//! SG-031: transfer, one source well to one dest well per pair.

use super::utils::{
    air_gap_step, aspirate_step, blowout_util, delay_in_well, dispense_air_gap_step,
    dispense_step, mix_util, needs_new_tip, pipette_spec, replace_tip, require_labware, run,
    tip_capacity, touch_tip_step, BlowoutUtilArgs, FlowRates, MixUtilArgs,
};
use crate::core::args::{MixSettings, TransferArgs, TransferLikeArgs};
use crate::core::command::CommandCreatorResult;
use crate::core::context::InvariantContext;
use crate::core::errors;
use crate::core::executor::CurriedCommandCreator;
use crate::core::planner::{pair_wells, split_liquid};
use crate::core::state::RobotState;

/// Move `volume` from each source well to its paired dest well.
///
/// Volumes above the tip's usable capacity (capacity minus air gap) are split
/// into equal sub-transfers.
pub fn transfer(args: &TransferArgs, ctx: &InvariantContext, state: &RobotState) -> CommandCreatorResult {
    let common = &args.common;
    let spec = pipette_spec(ctx, &common.pipette)?;
    require_labware(ctx, &[&common.source_labware, &common.dest_labware])?;
    if !common.volume.is_finite() || common.volume <= 0.0 {
        return Err(errors::invalid_volume("transfer", common.volume).into());
    }
    let air_gap = common.air_gap().unwrap_or(0.0);
    let capacity = tip_capacity(ctx, &common.pipette)?;
    let usable = capacity - air_gap;
    if usable <= 0.0 {
        return Err(errors::pipette_volume_exceeded("air gap", air_gap, capacity).into());
    }

    let pairs = pair_wells(&args.source_wells, &args.dest_wells)?;
    let rates = FlowRates::resolve(
        spec,
        common.aspirate_flow_rate,
        common.dispense_flow_rate,
        common.blowout_flow_rate,
    );
    let sub_volumes = split_liquid(common.volume, usable)?;

    let mut creators: Vec<CurriedCommandCreator> = Vec::new();
    let mut previous: Option<(&str, &str)> = None;

    for (source, dest) in &pairs {
        let (source, dest) = (source.as_str(), dest.as_str());
        for (chunk_index, &sub_volume) in sub_volumes.iter().enumerate() {
            let first = previous.is_none();
            let source_changed = previous.map(|(s, _)| s != source).unwrap_or(true);
            let dest_changed = previous.map(|(_, d)| d != dest).unwrap_or(true);
            let fresh_tip = if chunk_index == 0 {
                needs_new_tip(common.change_tip, first, source_changed, dest_changed)
            } else {
                needs_new_tip(common.change_tip, false, false, false)
            };
            previous = Some((source, dest));

            if fresh_tip {
                creators.push(replace_tip(&common.pipette));
            }
            creators.extend(aspirate_side(
                common, ctx, &rates, source, sub_volume, fresh_tip,
            ));
            creators.extend(dispense_side(
                common,
                ctx,
                &rates,
                source,
                dest,
                sub_volume,
                args.mix_in_destination,
            ));
        }
    }

    tracing::debug!(
        pipette = %common.pipette,
        pairs = pairs.len(),
        splits = sub_volumes.len(),
        "transfer planned"
    );
    run(creators, ctx, state)
}

/// Pre-wet, mix, aspirate, delay, touch tip and air gap at a source well.
pub(crate) fn aspirate_side(
    common: &TransferLikeArgs,
    ctx: &InvariantContext,
    rates: &FlowRates,
    source: &str,
    volume: f64,
    fresh_tip: bool,
) -> Vec<CurriedCommandCreator> {
    let pipette = common.pipette.as_str();
    let labware = common.source_labware.as_str();
    let offset = common.aspirate_offset_from_bottom_mm;
    let mut creators = Vec::new();

    if common.pre_wet_tip && fresh_tip {
        creators.extend(mix_util(&MixUtilArgs {
            pipette,
            labware,
            well: source,
            volume,
            times: 1,
            aspirate_offset_from_bottom_mm: offset,
            dispense_offset_from_bottom_mm: offset,
            aspirate_flow_rate: rates.aspirate,
            dispense_flow_rate: rates.dispense,
            aspirate_delay_seconds: None,
            dispense_delay_seconds: None,
        }));
    }
    if let Some(mix) = common.mix_before_aspirate {
        creators.extend(mix_at(pipette, labware, source, mix, offset, rates));
    }
    creators.push(aspirate_step(pipette, volume, labware, source, offset, rates.aspirate));
    if let Some(delay) = &common.aspirate_delay {
        creators.push(delay_in_well(pipette, labware, source, delay));
    }
    if common.touch_tip_after_aspirate {
        creators.push(touch_tip_step(
            ctx,
            pipette,
            labware,
            source,
            common.touch_tip_after_aspirate_offset_mm_from_bottom,
        ));
    }
    if let Some(air_gap) = common.air_gap() {
        creators.push(air_gap_step(ctx, pipette, air_gap, labware, source, rates.aspirate));
    }
    creators
}

fn dispense_side(
    common: &TransferLikeArgs,
    ctx: &InvariantContext,
    rates: &FlowRates,
    source: &str,
    dest: &str,
    volume: f64,
    mix_after: Option<MixSettings>,
) -> Vec<CurriedCommandCreator> {
    let pipette = common.pipette.as_str();
    let labware = common.dest_labware.as_str();
    let offset = common.dispense_offset_from_bottom_mm;
    let mut creators = Vec::new();

    if let Some(air_gap) = common.air_gap() {
        creators.push(dispense_air_gap_step(ctx, pipette, air_gap, labware, dest, rates.dispense));
    }
    creators.push(dispense_step(pipette, volume, labware, dest, offset, rates.dispense));
    if let Some(delay) = &common.dispense_delay {
        creators.push(delay_in_well(pipette, labware, dest, delay));
    }
    if common.touch_tip_after_dispense {
        creators.push(touch_tip_step(
            ctx,
            pipette,
            labware,
            dest,
            common.touch_tip_after_dispense_offset_mm_from_bottom,
        ));
    }
    if let Some(mix) = mix_after {
        creators.extend(mix_at(pipette, labware, dest, mix, offset, rates));
    }
    creators.extend(blowout_util(
        &BlowoutUtilArgs {
            pipette,
            source_labware: &common.source_labware,
            source_well: source,
            dest_labware: labware,
            dest_well: dest,
            blowout_location: common.blowout_location.as_deref(),
            flow_rate: rates.blowout,
            offset_from_top_mm: common.blowout_offset_from_top_mm,
        },
        ctx,
    ));
    creators
}

/// Mix in one well at a single height.
pub(crate) fn mix_at(
    pipette: &str,
    labware: &str,
    well: &str,
    mix: MixSettings,
    offset: f64,
    rates: &FlowRates,
) -> Vec<CurriedCommandCreator> {
    mix_util(&MixUtilArgs {
        pipette,
        labware,
        well,
        volume: mix.volume,
        times: mix.times,
        aspirate_offset_from_bottom_mm: offset,
        dispense_offset_from_bottom_mm: offset,
        aspirate_flow_rate: rates.aspirate,
        dispense_flow_rate: rates.dispense,
        aspirate_delay_seconds: None,
        dispense_delay_seconds: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compound::utils::{DEST_WELL_BLOWOUT_DESTINATION, SOURCE_WELL_BLOWOUT_DESTINATION};
    use crate::core::args::{ChangeTip, DelaySettings};
    use crate::core::command::{Command, ErrorType, WarningType};
    use crate::core::fixtures::*;

    fn transfer_args(volume: f64, sources: &[&str], dests: &[&str]) -> TransferArgs {
        TransferArgs {
            common: TransferLikeArgs::new("p300SingleId", volume, "sourcePlateId", "destPlateId"),
            source_wells: sources.iter().map(|w| w.to_string()).collect(),
            dest_wells: dests.iter().map(|w| w.to_string()).collect(),
            mix_in_destination: None,
        }
    }

    fn names(commands: &[Command]) -> Vec<&'static str> {
        commands.iter().map(|c| c.name()).collect()
    }

    #[test]
    fn test_sg031_single_transfer() {
        let ctx = make_context();
        let out = transfer(&transfer_args(50.0, &["A1"], &["B1"]), &ctx, &make_state()).unwrap();
        assert_eq!(names(&out.commands), vec!["pickUpTip", "aspirate", "dispense"]);
        let Command::Aspirate(asp) = &out.commands[1] else {
            panic!("expected aspirate");
        };
        assert_eq!(asp.volume, 50.0);
        assert_eq!(asp.flow_rate, 150.0);
        assert_eq!(asp.offset_from_bottom_mm, 1.0);
    }

    #[test]
    fn test_sg031_non_finite_volume_rejected() {
        let ctx = make_context();
        for volume in [f64::INFINITY, f64::NAN, 0.0] {
            let failure =
                transfer(&transfer_args(volume, &["A1"], &["B1"]), &ctx, &make_state()).unwrap_err();
            assert_eq!(failure.errors[0].error_type, ErrorType::InvalidVolume);
        }
        let failure = transfer(&transfer_args(1e12, &["A1"], &["B1"]), &ctx, &make_state()).unwrap_err();
        assert_eq!(failure.errors[0].error_type, ErrorType::InvalidArgs);
    }

    #[test]
    fn test_sg031_change_tip_always_vs_once() {
        let ctx = make_context();
        let mut args = transfer_args(50.0, &["A1", "A2"], &["B1", "B2"]);
        let always = transfer(&args, &ctx, &make_state()).unwrap();
        assert_eq!(
            names(&always.commands),
            vec!["pickUpTip", "aspirate", "dispense", "dropTip", "pickUpTip", "aspirate", "dispense"]
        );

        args.common.change_tip = ChangeTip::Once;
        let once = transfer(&args, &ctx, &make_state()).unwrap();
        assert_eq!(
            names(&once.commands),
            vec!["pickUpTip", "aspirate", "dispense", "aspirate", "dispense"]
        );
    }

    #[test]
    fn test_sg031_change_tip_per_source() {
        let ctx = make_context();
        let mut args = transfer_args(50.0, &["A1"], &["B1", "B2"]);
        args.common.change_tip = ChangeTip::PerSource;
        let out = transfer(&args, &ctx, &make_state()).unwrap();
        let pickups = out.commands.iter().filter(|c| c.name() == "pickUpTip").count();
        assert_eq!(pickups, 1);

        args.common.change_tip = ChangeTip::PerDest;
        let out = transfer(&args, &ctx, &make_state()).unwrap();
        let pickups = out.commands.iter().filter(|c| c.name() == "pickUpTip").count();
        assert_eq!(pickups, 2);
    }

    #[test]
    fn test_sg031_never_without_tip_fails() {
        let ctx = make_context();
        let mut args = transfer_args(50.0, &["A1"], &["B1"]);
        args.common.change_tip = ChangeTip::Never;
        let failure = transfer(&args, &ctx, &make_state()).unwrap_err();
        assert_eq!(failure.errors.len(), 1);
        assert_eq!(failure.errors[0].error_type, ErrorType::NoTipOnPipette);
    }

    #[test]
    fn test_sg031_splits_large_volume() {
        let ctx = make_context();
        let mut args = transfer_args(400.0, &["A1"], &["B1"]);
        args.common.change_tip = ChangeTip::Once;
        let out = transfer(&args, &ctx, &make_state()).unwrap();
        let volumes: Vec<f64> = out
            .commands
            .iter()
            .filter_map(|c| match c {
                Command::Aspirate(p) => Some(p.volume),
                _ => None,
            })
            .collect();
        assert_eq!(volumes, vec![200.0, 200.0]);
    }

    #[test]
    fn test_sg031_full_options_order() {
        let ctx = make_context();
        let mut args = transfer_args(100.0, &["A1"], &["B1"]);
        let c = &mut args.common;
        c.pre_wet_tip = true;
        c.mix_before_aspirate = Some(MixSettings { volume: 30.0, times: 1 });
        c.aspirate_delay = Some(DelaySettings { seconds: 2.0, mm_from_bottom: 5.0 });
        c.touch_tip_after_aspirate = true;
        c.air_gap_volume = Some(20.0);
        c.dispense_delay = Some(DelaySettings { seconds: 1.0, mm_from_bottom: 5.0 });
        c.touch_tip_after_dispense = true;
        c.blowout_location = Some(DEST_WELL_BLOWOUT_DESTINATION.to_string());
        args.mix_in_destination = Some(MixSettings { volume: 40.0, times: 1 });

        let out = transfer(&args, &ctx, &make_state()).unwrap();
        assert_eq!(
            names(&out.commands),
            vec![
                "pickUpTip",
                // pre-wet
                "aspirate",
                "dispense",
                // mix before aspirate
                "aspirate",
                "dispense",
                "aspirate",
                "moveToWell",
                "delay",
                "touchTip",
                "airGap",
                "dispenseAirGap",
                "dispense",
                "moveToWell",
                "delay",
                "touchTip",
                // mix in destination
                "aspirate",
                "dispense",
                "blowout",
            ]
        );
    }

    #[test]
    fn test_sg031_air_gap_reduces_capacity() {
        let ctx = make_context();
        let mut args = transfer_args(300.0, &["A1"], &["B1"]);
        args.common.change_tip = ChangeTip::Once;
        args.common.air_gap_volume = Some(50.0);
        let out = transfer(&args, &ctx, &make_state()).unwrap();
        let aspirates = out.commands.iter().filter(|c| c.name() == "aspirate").count();
        assert_eq!(aspirates, 2);
    }

    #[test]
    fn test_sg031_blowout_to_source() {
        let ctx = make_context();
        let mut args = transfer_args(50.0, &["A1"], &["B1"]);
        args.common.blowout_location = Some(SOURCE_WELL_BLOWOUT_DESTINATION.to_string());
        let out = transfer(&args, &ctx, &make_state()).unwrap();
        let Some(Command::Blowout(params)) = out.commands.last() else {
            panic!("expected trailing blowout");
        };
        assert_eq!(params.labware, "sourcePlateId");
        assert_eq!(params.well, "A1");
    }

    #[test]
    fn test_sg031_overflow_warns_but_emits() {
        let ctx = make_context();
        let state = make_state_with_liquid();
        let args = transfer_args(400.0, &["A1"], &["B1"]);
        let out = transfer(&args, &ctx, &state).unwrap();
        assert!(out
            .warnings
            .iter()
            .any(|w| w.warning_type == WarningType::OverMaxWellVolume));
        let dispenses = out.commands.iter().filter(|c| c.name() == "dispense").count();
        assert_eq!(dispenses, 2);
    }

    #[test]
    fn test_sg031_unknown_pipette() {
        let ctx = make_context();
        let mut args = transfer_args(50.0, &["A1"], &["B1"]);
        args.common.pipette = "ghost".to_string();
        let failure = transfer(&args, &ctx, &make_state()).unwrap_err();
        assert_eq!(failure.errors[0].error_type, ErrorType::PipetteDoesNotExist);
    }

    #[test]
    fn test_sg031_mismatched_wells() {
        let ctx = make_context();
        let args = transfer_args(50.0, &["A1", "A2"], &["B1", "B2", "B3"]);
        let failure = transfer(&args, &ctx, &make_state()).unwrap_err();
        assert_eq!(failure.errors[0].error_type, ErrorType::InvalidArgs);
    }

    #[test]
    fn test_sg031_out_of_tips_reports_prior_commands() {
        let ctx = make_context();
        let mut state = empty_tiprack(make_state(), "tiprack2Id");
        let wells: Vec<String> = state.tip_state.tipracks["tiprack1Id"]
            .keys()
            .skip(1)
            .cloned()
            .collect();
        let refs: Vec<&str> = wells.iter().map(String::as_str).collect();
        state = empty_wells(state, "tiprack1Id", &refs);

        let args = transfer_args(50.0, &["A1", "A2"], &["B1", "B2"]);
        let failure = transfer(&args, &ctx, &state).unwrap_err();
        assert_eq!(failure.errors[0].error_type, ErrorType::InsufficientTips);
        assert_eq!(
            names(&failure.prior_commands),
            vec!["pickUpTip", "aspirate", "dispense"]
        );
    }
}
