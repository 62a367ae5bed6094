//! SG-035: Module steps and pause.
//!
//! Thermocycler steps compare the requested state with the module's current
//! state and emit only the commands needed to get there.

use super::utils::run;
use crate::atomic;
use crate::atomic::DelayArgs;
use crate::core::args::{
    EngageMagnetArgs, ModuleArgs, PauseArgs, SetTemperatureArgs, ThermocyclerProfileArgs,
    ThermocyclerStateArgs,
};
use crate::core::command::{
    BlockTemperatureParams, CommandCreatorResult, EngageMagnetParams, ModuleOnlyParams,
    RunProfileParams, TemperatureParams,
};
use crate::core::context::{InvariantContext, ModuleType};
use crate::core::errors;
use crate::core::executor::{curry_command_creator, curry_fn, CurriedCommandCreator};
use crate::core::state::{ModuleState, RobotState};

fn module_only(module: &str) -> ModuleOnlyParams {
    ModuleOnlyParams {
        module: module.to_string(),
    }
}

fn temperature(module: &str, temperature: f64) -> TemperatureParams {
    TemperatureParams {
        module: module.to_string(),
        temperature,
    }
}

// ============================================================================
// Pause
// ============================================================================

pub fn pause(args: &PauseArgs, ctx: &InvariantContext, state: &RobotState) -> CommandCreatorResult {
    atomic::delay(
        &DelayArgs {
            wait: args.wait,
            message: args.message.clone(),
            target: None,
        },
        ctx,
        state,
    )
}

// ============================================================================
// Magnet and temperature
// ============================================================================

pub fn engage_magnet_step(
    args: &EngageMagnetArgs,
    ctx: &InvariantContext,
    state: &RobotState,
) -> CommandCreatorResult {
    atomic::modules::engage_magnet(
        &EngageMagnetParams {
            module: args.module.clone(),
            engage_height: args.engage_height,
        },
        ctx,
        state,
    )
}

pub fn disengage_magnet_step(
    args: &ModuleArgs,
    ctx: &InvariantContext,
    state: &RobotState,
) -> CommandCreatorResult {
    atomic::modules::disengage_magnet(&module_only(&args.module), ctx, state)
}

/// Set a temperature module target, optionally waiting for it.
pub fn set_temperature_step(
    args: &SetTemperatureArgs,
    ctx: &InvariantContext,
    state: &RobotState,
) -> CommandCreatorResult {
    let params = temperature(&args.module, args.target_temperature);
    let mut creators = vec![curry_command_creator(
        atomic::modules::set_temperature,
        params.clone(),
    )];
    if args.await_temperature {
        creators.push(curry_command_creator(atomic::modules::await_temperature, params));
    }
    run(creators, ctx, state)
}

pub fn deactivate_temperature_step(
    args: &ModuleArgs,
    ctx: &InvariantContext,
    state: &RobotState,
) -> CommandCreatorResult {
    atomic::modules::deactivate_temperature(&module_only(&args.module), ctx, state)
}

// ============================================================================
// Thermocycler
// ============================================================================

struct ThermocyclerSnapshot {
    block_target_temp: Option<f64>,
    lid_target_temp: Option<f64>,
    lid_open: Option<bool>,
}

fn thermocycler_snapshot(
    module_id: &str,
    ctx: &InvariantContext,
    state: &RobotState,
) -> Result<ThermocyclerSnapshot, crate::core::command::CommandCreatorFailure> {
    let Some(entity) = ctx.module(module_id) else {
        return Err(errors::module_does_not_exist(module_id).into());
    };
    let Some(module) = state.modules.get(module_id) else {
        return Err(errors::module_does_not_exist(module_id).into());
    };
    match &module.module_state {
        ModuleState::Thermocycler {
            block_target_temp,
            lid_target_temp,
            lid_open,
        } => Ok(ThermocyclerSnapshot {
            block_target_temp: *block_target_temp,
            lid_target_temp: *lid_target_temp,
            lid_open: *lid_open,
        }),
        _ => Err(
            errors::module_type_mismatch(module_id, ModuleType::Thermocycler, entity.module_type)
                .into(),
        ),
    }
}

/// Bring the thermocycler to the requested block, lid and lid-position state.
///
/// Order: open the lid, block temperature, lid temperature, close the lid.
/// A target of `None` deactivates that heater if it was set.
pub fn thermocycler_state_step(
    args: &ThermocyclerStateArgs,
    ctx: &InvariantContext,
    state: &RobotState,
) -> CommandCreatorResult {
    let current = thermocycler_snapshot(&args.module, ctx, state)?;
    let module = args.module.as_str();
    let lid_changes = current.lid_open != Some(args.lid_open);
    let mut creators: Vec<CurriedCommandCreator> = Vec::new();

    if lid_changes && args.lid_open {
        creators.push(curry_command_creator(
            atomic::modules::thermocycler_open_lid,
            module_only(module),
        ));
    }

    match args.block_target_temp {
        None if current.block_target_temp.is_some() => creators.push(curry_command_creator(
            atomic::modules::thermocycler_deactivate_block,
            module_only(module),
        )),
        Some(target) if current.block_target_temp != Some(target) => {
            creators.push(curry_command_creator(
                atomic::modules::thermocycler_set_block_temperature,
                BlockTemperatureParams {
                    module: module.to_string(),
                    temperature: target,
                    volume: None,
                },
            ));
            creators.push(curry_command_creator(
                atomic::modules::thermocycler_await_block_temperature,
                temperature(module, target),
            ));
        }
        _ => {}
    }

    match args.lid_target_temp {
        None if current.lid_target_temp.is_some() => creators.push(curry_command_creator(
            atomic::modules::thermocycler_deactivate_lid,
            module_only(module),
        )),
        Some(target) if current.lid_target_temp != Some(target) => {
            creators.push(curry_command_creator(
                atomic::modules::thermocycler_set_lid_temperature,
                temperature(module, target),
            ));
            creators.push(curry_command_creator(
                atomic::modules::thermocycler_await_lid_temperature,
                temperature(module, target),
            ));
        }
        _ => {}
    }

    if lid_changes && !args.lid_open {
        creators.push(curry_command_creator(
            atomic::modules::thermocycler_close_lid,
            module_only(module),
        ));
    }

    run(creators, ctx, state)
}

/// Close the lid, heat it, run the profile, wait for it, then settle into
/// the hold state.
pub fn thermocycler_profile_step(
    args: &ThermocyclerProfileArgs,
    ctx: &InvariantContext,
    state: &RobotState,
) -> CommandCreatorResult {
    let current = thermocycler_snapshot(&args.module, ctx, state)?;
    let module = args.module.as_str();
    let mut creators: Vec<CurriedCommandCreator> = Vec::new();

    if current.lid_open != Some(false) {
        creators.push(curry_command_creator(
            atomic::modules::thermocycler_close_lid,
            module_only(module),
        ));
    }
    creators.push(curry_command_creator(
        atomic::modules::thermocycler_set_lid_temperature,
        temperature(module, args.profile_target_lid_temp),
    ));
    creators.push(curry_command_creator(
        atomic::modules::thermocycler_await_lid_temperature,
        temperature(module, args.profile_target_lid_temp),
    ));
    creators.push(curry_command_creator(
        atomic::modules::thermocycler_run_profile,
        RunProfileParams {
            module: module.to_string(),
            profile: args.profile.clone(),
            volume: args.volume,
        },
    ));
    creators.push(curry_command_creator(
        atomic::modules::thermocycler_await_profile_complete,
        module_only(module),
    ));

    // the hold state is diffed against the state left by the profile
    let hold = ThermocyclerStateArgs {
        module: module.to_string(),
        block_target_temp: args.block_target_temp_hold,
        lid_target_temp: args.lid_target_temp_hold,
        lid_open: args.lid_open_hold,
    };
    creators.push(curry_fn(move |ctx, state| {
        thermocycler_state_step(&hold, ctx, state)
    }));

    run(creators, ctx, state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::command::{Command, ErrorType, ProfileStep, Wait};
    use crate::core::fixtures::*;

    fn names(commands: &[Command]) -> Vec<&'static str> {
        commands.iter().map(|c| c.name()).collect()
    }

    fn tc_state(block: Option<f64>, lid: Option<f64>, lid_open: bool) -> ThermocyclerStateArgs {
        ThermocyclerStateArgs {
            module: "thermocyclerId".to_string(),
            block_target_temp: block,
            lid_target_temp: lid,
            lid_open,
        }
    }

    #[test]
    fn test_sg035_pause() {
        let ctx = make_context();
        let args = PauseArgs {
            wait: Wait::UntilResume(true),
            message: Some("swap plates".to_string()),
        };
        let out = pause(&args, &ctx, &make_state()).unwrap();
        assert_eq!(names(&out.commands), vec!["delay"]);
    }

    #[test]
    fn test_sg035_set_temperature_with_await() {
        let ctx = make_context();
        let mut args = SetTemperatureArgs {
            module: "tempDeckId".to_string(),
            target_temperature: 4.0,
            await_temperature: true,
        };
        let out = set_temperature_step(&args, &ctx, &make_state()).unwrap();
        assert_eq!(
            names(&out.commands),
            vec!["temperatureModule/setTargetTemperature", "temperatureModule/awaitTemperature"]
        );
        args.await_temperature = false;
        let out = set_temperature_step(&args, &ctx, &make_state()).unwrap();
        assert_eq!(out.commands.len(), 1);
    }

    #[test]
    fn test_sg035_magnet_steps() {
        let ctx = make_context();
        let engage = EngageMagnetArgs {
            module: "magDeckId".to_string(),
            engage_height: 12.0,
        };
        let out = engage_magnet_step(&engage, &ctx, &make_state()).unwrap();
        assert_eq!(names(&out.commands), vec!["magneticModule/engageMagnet"]);

        let disengage = ModuleArgs {
            module: "magDeckId".to_string(),
        };
        let out = disengage_magnet_step(&disengage, &ctx, &make_state()).unwrap();
        assert_eq!(names(&out.commands), vec!["magneticModule/disengageMagnet"]);
    }

    #[test]
    fn test_sg035_thermocycler_state_from_unknown_lid() {
        let ctx = make_context();
        let args = tc_state(Some(4.0), Some(40.0), true);
        let out = thermocycler_state_step(&args, &ctx, &make_state()).unwrap();
        assert_eq!(
            names(&out.commands),
            vec![
                "thermocycler/openLid",
                "thermocycler/setTargetBlockTemperature",
                "thermocycler/awaitBlockTemperature",
                "thermocycler/setTargetLidTemperature",
                "thermocycler/awaitLidTemperature",
            ]
        );
    }

    #[test]
    fn test_sg035_thermocycler_state_no_changes() {
        let ctx = make_context();
        let state = with_lid(make_state(), true);
        let out = thermocycler_state_step(&tc_state(None, None, true), &ctx, &state).unwrap();
        assert!(out.commands.is_empty());
    }

    #[test]
    fn test_sg035_thermocycler_state_close_last() {
        let ctx = make_context();
        let state = with_lid(make_state(), true);
        let out = thermocycler_state_step(&tc_state(Some(95.0), None, false), &ctx, &state).unwrap();
        assert_eq!(out.commands.last().map(|c| c.name()), Some("thermocycler/closeLid"));
    }

    #[test]
    fn test_sg035_thermocycler_state_wrong_module() {
        let ctx = make_context();
        let mut args = tc_state(None, None, true);
        args.module = "tempDeckId".to_string();
        let failure = thermocycler_state_step(&args, &ctx, &make_state()).unwrap_err();
        assert_eq!(failure.errors[0].error_type, ErrorType::ModuleTypeMismatch);
    }

    #[test]
    fn test_sg035_thermocycler_profile() {
        let ctx = make_context();
        let args = ThermocyclerProfileArgs {
            module: "thermocyclerId".to_string(),
            profile: vec![
                ProfileStep {
                    temperature: 95.0,
                    hold_time: 30.0,
                },
                ProfileStep {
                    temperature: 55.0,
                    hold_time: 30.0,
                },
            ],
            volume: 20.0,
            profile_target_lid_temp: 105.0,
            block_target_temp_hold: Some(4.0),
            lid_target_temp_hold: None,
            lid_open_hold: true,
        };
        let out = thermocycler_profile_step(&args, &ctx, &make_state()).unwrap();
        assert_eq!(
            names(&out.commands),
            vec![
                "thermocycler/closeLid",
                "thermocycler/setTargetLidTemperature",
                "thermocycler/awaitLidTemperature",
                "thermocycler/runProfile",
                "thermocycler/awaitProfileComplete",
                "thermocycler/openLid",
                "thermocycler/setTargetBlockTemperature",
                "thermocycler/awaitBlockTemperature",
                "thermocycler/deactivateLid",
            ]
        );
    }
}
