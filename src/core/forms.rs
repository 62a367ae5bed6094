//! SG-014: Step form hydration.
//!
//! Turns a step as written in the protocol file into the args bundle its
//! compound creator consumes, plus any form-level warnings.

use super::args::*;
use super::command::{CommandCreatorError, ProfileStep, Wait};
use super::context::InvariantContext;
use super::definitions::FIXED_TRASH_ID;
use super::errors;
use super::types::*;
use super::warnings::{mix_warnings, move_liquid_warnings, FormWarning, HydratedFields};

/// A step ready for its creator.
#[derive(Debug, Clone, PartialEq)]
pub struct HydratedStep {
    pub args: StepArgs,
    pub form_warnings: Vec<FormWarning>,
}

impl HydratedStep {
    fn plain(args: StepArgs) -> Self {
        Self {
            args,
            form_warnings: Vec::new(),
        }
    }
}

/// Hydrate one step form. Malformed forms fail with `INVALID_ARGS`.
pub fn hydrate_step(form: &StepForm, ctx: &InvariantContext) -> Result<HydratedStep, CommandCreatorError> {
    match form {
        StepForm::MoveLiquid(f) => hydrate_move_liquid(f, ctx),
        StepForm::Mix(f) => Ok(hydrate_mix(f, ctx)),
        StepForm::Pause(f) => Ok(HydratedStep::plain(StepArgs::Delay(hydrate_pause(f)))),
        StepForm::Magnet(f) => hydrate_magnet(f).map(HydratedStep::plain),
        StepForm::Temperature(f) => hydrate_temperature(f).map(HydratedStep::plain),
        StepForm::ThermocyclerState(f) => Ok(HydratedStep::plain(StepArgs::ThermocyclerState(
            ThermocyclerStateArgs {
                module: f.module_id.clone(),
                block_target_temp: f.block_target_temp,
                lid_target_temp: f.lid_target_temp,
                lid_open: f.lid_open,
            },
        ))),
        StepForm::ThermocyclerProfile(f) => Ok(HydratedStep::plain(StepArgs::ThermocyclerProfile(
            ThermocyclerProfileArgs {
                module: f.module_id.clone(),
                profile: flatten_profile(&f.profile),
                volume: f.profile_volume,
                profile_target_lid_temp: f.profile_target_lid_temp,
                block_target_temp_hold: f.block_target_temp_hold,
                lid_target_temp_hold: f.lid_target_temp_hold,
                lid_open_hold: f.lid_open_hold,
            },
        ))),
    }
}

fn transfer_like(f: &MoveLiquidForm) -> TransferLikeArgs {
    let mut common = TransferLikeArgs::new(&f.pipette, f.volume, &f.aspirate_labware, &f.dispense_labware);
    common.change_tip = f.change_tip;
    common.pre_wet_tip = f.aspirate_pre_wet_tip;
    common.touch_tip_after_aspirate = f.aspirate_touch_tip;
    common.touch_tip_after_aspirate_offset_mm_from_bottom = f.aspirate_touch_tip_mm_from_bottom;
    common.touch_tip_after_dispense = f.dispense_touch_tip;
    common.touch_tip_after_dispense_offset_mm_from_bottom = f.dispense_touch_tip_mm_from_bottom;
    common.air_gap_volume = f.aspirate_air_gap_volume;
    common.mix_before_aspirate = f.aspirate_mix;
    common.aspirate_delay = f.aspirate_delay;
    common.dispense_delay = f.dispense_delay;
    common.aspirate_flow_rate = f.aspirate_flow_rate;
    common.dispense_flow_rate = f.dispense_flow_rate;
    common.blowout_flow_rate = f.blowout_flow_rate;
    if let Some(mm) = f.aspirate_mm_from_bottom {
        common.aspirate_offset_from_bottom_mm = mm;
    }
    if let Some(mm) = f.dispense_mm_from_bottom {
        common.dispense_offset_from_bottom_mm = mm;
    }
    common.blowout_offset_from_top_mm = f.blowout_offset_from_top_mm;
    common.blowout_location = f.blowout_location.clone();
    common.name = f.name.clone();
    common.description = f.description.clone();
    common
}

fn hydrate_move_liquid(f: &MoveLiquidForm, ctx: &InvariantContext) -> Result<HydratedStep, CommandCreatorError> {
    let common = transfer_like(f);
    let args = match f.path {
        MoveLiquidPath::Single => StepArgs::Transfer(TransferArgs {
            common,
            source_wells: f.aspirate_wells.clone(),
            dest_wells: f.dispense_wells.clone(),
            mix_in_destination: f.dispense_mix,
        }),
        MoveLiquidPath::MultiAspirate => {
            let [dest] = f.dispense_wells.as_slice() else {
                return Err(errors::invalid_args(format!(
                    "multiAspirate needs exactly one dispense well, got {}",
                    f.dispense_wells.len()
                )));
            };
            StepArgs::Consolidate(ConsolidateArgs {
                common,
                source_wells: f.aspirate_wells.clone(),
                dest_well: dest.clone(),
                mix_in_destination: f.dispense_mix,
            })
        }
        MoveLiquidPath::MultiDispense => {
            let [source] = f.aspirate_wells.as_slice() else {
                return Err(errors::invalid_args(format!(
                    "multiDispense needs exactly one aspirate well, got {}",
                    f.aspirate_wells.len()
                )));
            };
            let disposal = f.disposal_volume.filter(|v| *v > 0.0).map(|volume| DisposalSettings {
                volume,
                blowout_location: f
                    .disposal_location
                    .clone()
                    .unwrap_or_else(|| FIXED_TRASH_ID.to_string()),
            });
            StepArgs::Distribute(DistributeArgs {
                common,
                source_well: source.clone(),
                dest_wells: f.dispense_wells.clone(),
                disposal,
            })
        }
    };

    let fields = HydratedFields {
        pipette: ctx.pipette(&f.pipette).map(|p| &p.spec),
        volume: Some(f.volume),
        dispense_labware: ctx.labware_definition(&f.dispense_labware),
        dispense_wells: &f.dispense_wells,
        disposal_volume: f.disposal_volume,
    };
    Ok(HydratedStep {
        args,
        form_warnings: move_liquid_warnings(f.path, &fields),
    })
}

fn hydrate_mix(f: &MixForm, ctx: &InvariantContext) -> HydratedStep {
    let mut args = MixArgs::new(&f.pipette, &f.labware, &[], f.volume, f.times);
    args.wells = f.wells.clone();
    args.change_tip = f.change_tip;
    args.touch_tip = f.touch_tip;
    args.touch_tip_offset_mm_from_bottom = f.touch_tip_mm_from_bottom;
    args.aspirate_delay_seconds = f.aspirate_delay_seconds;
    args.dispense_delay_seconds = f.dispense_delay_seconds;
    args.aspirate_flow_rate = f.aspirate_flow_rate;
    args.dispense_flow_rate = f.dispense_flow_rate;
    args.blowout_flow_rate = f.blowout_flow_rate;
    if let Some(mm) = f.mm_from_bottom {
        args.aspirate_offset_from_bottom_mm = mm;
        args.dispense_offset_from_bottom_mm = mm;
    }
    args.blowout_location = f.blowout_location.clone();
    args.name = f.name.clone();
    args.description = f.description.clone();

    let fields = HydratedFields {
        pipette: ctx.pipette(&f.pipette).map(|p| &p.spec),
        volume: Some(f.volume),
        ..Default::default()
    };
    HydratedStep {
        args: StepArgs::Mix(args),
        form_warnings: mix_warnings(&fields),
    }
}

fn hydrate_pause(f: &PauseForm) -> PauseArgs {
    let wait = match f.pause_action {
        PauseAction::UntilResume => Wait::UntilResume(true),
        PauseAction::UntilTime => Wait::Seconds(f.hours * 3600.0 + f.minutes * 60.0 + f.seconds),
    };
    PauseArgs {
        wait,
        message: f.message.clone(),
    }
}

fn hydrate_magnet(f: &MagnetForm) -> Result<StepArgs, CommandCreatorError> {
    match f.magnet_action {
        MagnetAction::Engage => {
            let engage_height = f.engage_height.ok_or_else(|| {
                errors::invalid_args(format!("engaging '{}' needs an engage height", f.module_id))
            })?;
            Ok(StepArgs::EngageMagnet(EngageMagnetArgs {
                module: f.module_id.clone(),
                engage_height,
            }))
        }
        MagnetAction::Disengage => Ok(StepArgs::DisengageMagnet(ModuleArgs {
            module: f.module_id.clone(),
        })),
    }
}

fn hydrate_temperature(f: &TemperatureForm) -> Result<StepArgs, CommandCreatorError> {
    if !f.set_temperature {
        return Ok(StepArgs::DeactivateTemperature(ModuleArgs {
            module: f.module_id.clone(),
        }));
    }
    let target_temperature = f.target_temperature.ok_or_else(|| {
        errors::invalid_args(format!("setting '{}' needs a target temperature", f.module_id))
    })?;
    Ok(StepArgs::SetTemperature(SetTemperatureArgs {
        module: f.module_id.clone(),
        target_temperature,
        await_temperature: f.await_temperature,
    }))
}

/// Expand cycles into a flat list of profile steps.
pub fn flatten_profile(items: &[ProfileItem]) -> Vec<ProfileStep> {
    let mut steps = Vec::new();
    for item in items {
        match item {
            ProfileItem::Step(step) => steps.push(step.clone()),
            ProfileItem::Cycle { repetitions, steps: cycle } => {
                for _ in 0..*repetitions {
                    steps.extend(cycle.iter().cloned());
                }
            }
        }
    }
    steps
}
