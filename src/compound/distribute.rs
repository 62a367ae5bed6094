//! SG-033: distribute, one source well into many dest wells.
//!
//! Each tip load aspirates enough for a group of dest wells plus the disposal
//! volume, dispenses into the group, then blows the leftover out.

use super::transfer::mix_at;
use super::utils::{
    air_gap_step, aspirate_step, blowout_util, delay_in_well, dispense_air_gap_step,
    dispense_step, mix_util, pipette_spec, replace_tip, require_labware, run, tip_capacity,
    touch_tip_step, BlowoutUtilArgs, FlowRates, MixUtilArgs,
};
use crate::core::args::{ChangeTip, DistributeArgs};
use crate::core::command::CommandCreatorResult;
use crate::core::context::InvariantContext;
use crate::core::errors;
use crate::core::executor::CurriedCommandCreator;
use crate::core::planner::{chunk, max_wells_per_chunk};
use crate::core::state::RobotState;

pub fn distribute(
    args: &DistributeArgs,
    ctx: &InvariantContext,
    state: &RobotState,
) -> CommandCreatorResult {
    let common = &args.common;
    let spec = pipette_spec(ctx, &common.pipette)?;
    require_labware(ctx, &[&common.source_labware, &common.dest_labware])?;
    if !common.volume.is_finite() || common.volume <= 0.0 {
        return Err(errors::invalid_volume("distribute", common.volume).into());
    }
    if args.dest_wells.is_empty() {
        return Err(errors::invalid_args("distribute needs at least one dest well").into());
    }

    let disposal = args.disposal.as_ref().filter(|d| d.volume > 0.0);
    let disposal_volume = disposal.map(|d| d.volume).unwrap_or(0.0);
    let air_gap = common.air_gap().unwrap_or(0.0);
    let capacity = tip_capacity(ctx, &common.pipette)?;
    let per_chunk = max_wells_per_chunk(capacity, common.volume, disposal_volume + air_gap);
    if per_chunk == 0 {
        return Err(errors::pipette_volume_exceeded(
            "distribute",
            common.volume + disposal_volume + air_gap,
            capacity,
        )
        .into());
    }

    let rates = FlowRates::resolve(
        spec,
        common.aspirate_flow_rate,
        common.dispense_flow_rate,
        common.blowout_flow_rate,
    );
    let pipette = common.pipette.as_str();
    let source_labware = common.source_labware.as_str();
    let dest_labware = common.dest_labware.as_str();
    let source = args.source_well.as_str();
    let chunks = chunk(&args.dest_wells, per_chunk);

    let mut creators: Vec<CurriedCommandCreator> = Vec::new();
    for (i, wells) in chunks.iter().enumerate() {
        let fresh_tip = match common.change_tip {
            ChangeTip::Always | ChangeTip::PerSource | ChangeTip::PerDest => true,
            ChangeTip::Once => i == 0,
            ChangeTip::Never => false,
        };
        if fresh_tip {
            creators.push(replace_tip(pipette));
        }

        let aspirate_volume = common.volume * wells.len() as f64 + disposal_volume;
        let offset = common.aspirate_offset_from_bottom_mm;
        if common.pre_wet_tip && fresh_tip {
            creators.extend(mix_util(&MixUtilArgs {
                pipette,
                labware: source_labware,
                well: source,
                volume: aspirate_volume,
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
            creators.extend(mix_at(pipette, source_labware, source, mix, offset, &rates));
        }
        creators.push(aspirate_step(
            pipette,
            aspirate_volume,
            source_labware,
            source,
            offset,
            rates.aspirate,
        ));
        if let Some(delay) = &common.aspirate_delay {
            creators.push(delay_in_well(pipette, source_labware, source, delay));
        }
        if common.touch_tip_after_aspirate {
            creators.push(touch_tip_step(
                ctx,
                pipette,
                source_labware,
                source,
                common.touch_tip_after_aspirate_offset_mm_from_bottom,
            ));
        }
        if let Some(air_gap) = common.air_gap() {
            creators.push(air_gap_step(ctx, pipette, air_gap, source_labware, source, rates.aspirate));
        }

        for (j, dest) in wells.iter().enumerate() {
            if let Some(air_gap) = common.air_gap() {
                creators.push(dispense_air_gap_step(ctx, pipette, air_gap, dest_labware, dest, rates.dispense));
            }
            creators.push(dispense_step(
                pipette,
                common.volume,
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
            let more_to_go = j + 1 < wells.len();
            match common.air_gap() {
                Some(air_gap) if more_to_go => {
                    creators.push(air_gap_step(ctx, pipette, air_gap, dest_labware, dest, rates.aspirate));
                }
                _ => {}
            }
        }

        // the disposal volume goes to its own location, replacing the normal blowout
        let last_dest = wells.last().map(String::as_str).unwrap_or_default();
        let location = match disposal {
            Some(d) => Some(d.blowout_location.as_str()),
            None => common.blowout_location.as_deref(),
        };
        creators.extend(blowout_util(
            &BlowoutUtilArgs {
                pipette,
                source_labware,
                source_well: source,
                dest_labware,
                dest_well: last_dest,
                blowout_location: location,
                flow_rate: rates.blowout,
                offset_from_top_mm: common.blowout_offset_from_top_mm,
            },
            ctx,
        ));
    }

    tracing::debug!(
        pipette = %pipette,
        wells = args.dest_wells.len(),
        chunks = chunks.len(),
        disposal = disposal_volume,
        "distribute planned"
    );
    run(creators, ctx, state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compound::utils::SOURCE_WELL_BLOWOUT_DESTINATION;
    use crate::core::args::{DisposalSettings, TransferLikeArgs};
    use crate::core::command::{Command, ErrorType};
    use crate::core::definitions::FIXED_TRASH_ID;
    use crate::core::fixtures::*;

    fn distribute_args(volume: f64, dests: &[&str]) -> DistributeArgs {
        DistributeArgs {
            common: TransferLikeArgs::new("p300SingleId", volume, "troughId", "destPlateId"),
            source_well: "A1".to_string(),
            dest_wells: dests.iter().map(|w| w.to_string()).collect(),
            disposal: None,
        }
    }

    fn names(commands: &[Command]) -> Vec<&'static str> {
        commands.iter().map(|c| c.name()).collect()
    }

    fn aspirate_volumes(commands: &[Command]) -> Vec<f64> {
        commands
            .iter()
            .filter_map(|c| match c {
                Command::Aspirate(p) => Some(p.volume),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_sg033_single_chunk() {
        let ctx = make_context();
        let out = distribute(&distribute_args(50.0, &["A1", "A2", "A3"]), &ctx, &make_state()).unwrap();
        assert_eq!(
            names(&out.commands),
            vec!["pickUpTip", "aspirate", "dispense", "dispense", "dispense"]
        );
        assert_eq!(aspirate_volumes(&out.commands), vec![150.0]);
    }

    #[test]
    fn test_sg033_disposal_blown_out_per_chunk() {
        let ctx = make_context();
        let mut args = distribute_args(100.0, &["A1", "A2", "A3", "A4"]);
        args.disposal = Some(DisposalSettings {
            volume: 40.0,
            blowout_location: FIXED_TRASH_ID.to_string(),
        });
        args.common.change_tip = ChangeTip::Once;
        let out = distribute(&args, &ctx, &make_state()).unwrap();
        // (300 - 40) / 100 = 2 wells per chunk
        assert_eq!(aspirate_volumes(&out.commands), vec![240.0, 240.0]);
        let blowouts: Vec<&str> = out
            .commands
            .iter()
            .filter_map(|c| match c {
                Command::Blowout(p) => Some(p.labware.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(blowouts, vec![FIXED_TRASH_ID, FIXED_TRASH_ID]);
    }

    #[test]
    fn test_sg033_blowout_without_disposal() {
        let ctx = make_context();
        let mut args = distribute_args(50.0, &["A1", "A2"]);
        args.common.blowout_location = Some(SOURCE_WELL_BLOWOUT_DESTINATION.to_string());
        let out = distribute(&args, &ctx, &make_state()).unwrap();
        let Some(Command::Blowout(params)) = out.commands.last() else {
            panic!("expected blowout");
        };
        assert_eq!(params.labware, "troughId");
    }

    #[test]
    fn test_sg033_air_gap_between_dispenses() {
        let ctx = make_context();
        let mut args = distribute_args(50.0, &["A1", "A2"]);
        args.common.air_gap_volume = Some(10.0);
        let out = distribute(&args, &ctx, &make_state()).unwrap();
        assert_eq!(
            names(&out.commands),
            vec![
                "pickUpTip",
                "aspirate",
                "airGap",
                "dispenseAirGap",
                "dispense",
                "airGap",
                "dispenseAirGap",
                "dispense"
            ]
        );
    }

    #[test]
    fn test_sg033_volume_too_large() {
        let ctx = make_context();
        let mut args = distribute_args(280.0, &["A1"]);
        args.disposal = Some(DisposalSettings {
            volume: 30.0,
            blowout_location: FIXED_TRASH_ID.to_string(),
        });
        let failure = distribute(&args, &ctx, &make_state()).unwrap_err();
        assert_eq!(failure.errors[0].error_type, ErrorType::PipetteVolumeExceeded);
    }

    #[test]
    fn test_sg033_non_finite_volume_rejected() {
        let ctx = make_context();
        for volume in [f64::INFINITY, f64::NAN] {
            let failure = distribute(&distribute_args(volume, &["A1"]), &ctx, &make_state()).unwrap_err();
            assert_eq!(failure.errors[0].error_type, ErrorType::InvalidVolume);
        }
    }

    #[test]
    fn test_sg033_no_dest_wells() {
        let ctx = make_context();
        let failure = distribute(&distribute_args(50.0, &[]), &ctx, &make_state()).unwrap_err();
        assert_eq!(failure.errors[0].error_type, ErrorType::InvalidArgs);
    }
}
