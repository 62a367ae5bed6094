//! SG-027: Module commands (magnetic, temperature, thermocycler).
//!
//! Every creator here checks the module exists and is the right type, then
//! emits one command naming it.

use crate::core::command::{
    BlockTemperatureParams, Command, CommandCreatorResult, CommandsAndWarnings, EngageMagnetParams,
    ModuleOnlyParams, RunProfileParams, TemperatureParams,
};
use crate::core::context::{InvariantContext, ModuleType};
use crate::core::errors;
use crate::core::state::RobotState;

fn check_module(
    module_id: &str,
    expected: ModuleType,
    ctx: &InvariantContext,
    state: &RobotState,
) -> Result<(), crate::core::command::CommandCreatorFailure> {
    let Some(entity) = ctx.module(module_id) else {
        return Err(errors::module_does_not_exist(module_id).into());
    };
    if !state.modules.contains_key(module_id) {
        return Err(errors::module_does_not_exist(module_id).into());
    }
    if entity.module_type != expected {
        return Err(errors::module_type_mismatch(module_id, expected, entity.module_type).into());
    }
    Ok(())
}

fn emit(
    module_id: &str,
    expected: ModuleType,
    ctx: &InvariantContext,
    state: &RobotState,
    command: Command,
) -> CommandCreatorResult {
    check_module(module_id, expected, ctx, state)?;
    Ok(CommandsAndWarnings::single(command))
}

// ============================================================================
// Magnetic module
// ============================================================================

pub fn engage_magnet(
    params: &EngageMagnetParams,
    ctx: &InvariantContext,
    state: &RobotState,
) -> CommandCreatorResult {
    if !params.engage_height.is_finite() {
        return Err(errors::invalid_args(format!(
            "engage height must be a number, got {}",
            params.engage_height
        ))
        .into());
    }
    emit(
        &params.module,
        ModuleType::Magnetic,
        ctx,
        state,
        Command::EngageMagnet(params.clone()),
    )
}

pub fn disengage_magnet(
    params: &ModuleOnlyParams,
    ctx: &InvariantContext,
    state: &RobotState,
) -> CommandCreatorResult {
    emit(
        &params.module,
        ModuleType::Magnetic,
        ctx,
        state,
        Command::DisengageMagnet(params.clone()),
    )
}

// ============================================================================
// Temperature module
// ============================================================================

pub fn set_temperature(
    params: &TemperatureParams,
    ctx: &InvariantContext,
    state: &RobotState,
) -> CommandCreatorResult {
    emit(
        &params.module,
        ModuleType::Temperature,
        ctx,
        state,
        Command::SetTargetTemperature(params.clone()),
    )
}

pub fn await_temperature(
    params: &TemperatureParams,
    ctx: &InvariantContext,
    state: &RobotState,
) -> CommandCreatorResult {
    emit(
        &params.module,
        ModuleType::Temperature,
        ctx,
        state,
        Command::AwaitTemperature(params.clone()),
    )
}

pub fn deactivate_temperature(
    params: &ModuleOnlyParams,
    ctx: &InvariantContext,
    state: &RobotState,
) -> CommandCreatorResult {
    emit(
        &params.module,
        ModuleType::Temperature,
        ctx,
        state,
        Command::DeactivateTemperature(params.clone()),
    )
}

// ============================================================================
// Thermocycler
// ============================================================================

pub fn thermocycler_set_block_temperature(
    params: &BlockTemperatureParams,
    ctx: &InvariantContext,
    state: &RobotState,
) -> CommandCreatorResult {
    emit(
        &params.module,
        ModuleType::Thermocycler,
        ctx,
        state,
        Command::SetTargetBlockTemperature(params.clone()),
    )
}

pub fn thermocycler_set_lid_temperature(
    params: &TemperatureParams,
    ctx: &InvariantContext,
    state: &RobotState,
) -> CommandCreatorResult {
    emit(
        &params.module,
        ModuleType::Thermocycler,
        ctx,
        state,
        Command::SetTargetLidTemperature(params.clone()),
    )
}

pub fn thermocycler_await_block_temperature(
    params: &TemperatureParams,
    ctx: &InvariantContext,
    state: &RobotState,
) -> CommandCreatorResult {
    emit(
        &params.module,
        ModuleType::Thermocycler,
        ctx,
        state,
        Command::AwaitBlockTemperature(params.clone()),
    )
}

pub fn thermocycler_await_lid_temperature(
    params: &TemperatureParams,
    ctx: &InvariantContext,
    state: &RobotState,
) -> CommandCreatorResult {
    emit(
        &params.module,
        ModuleType::Thermocycler,
        ctx,
        state,
        Command::AwaitLidTemperature(params.clone()),
    )
}

pub fn thermocycler_open_lid(
    params: &ModuleOnlyParams,
    ctx: &InvariantContext,
    state: &RobotState,
) -> CommandCreatorResult {
    emit(
        &params.module,
        ModuleType::Thermocycler,
        ctx,
        state,
        Command::OpenLid(params.clone()),
    )
}

pub fn thermocycler_close_lid(
    params: &ModuleOnlyParams,
    ctx: &InvariantContext,
    state: &RobotState,
) -> CommandCreatorResult {
    emit(
        &params.module,
        ModuleType::Thermocycler,
        ctx,
        state,
        Command::CloseLid(params.clone()),
    )
}

pub fn thermocycler_deactivate_block(
    params: &ModuleOnlyParams,
    ctx: &InvariantContext,
    state: &RobotState,
) -> CommandCreatorResult {
    emit(
        &params.module,
        ModuleType::Thermocycler,
        ctx,
        state,
        Command::DeactivateBlock(params.clone()),
    )
}

pub fn thermocycler_deactivate_lid(
    params: &ModuleOnlyParams,
    ctx: &InvariantContext,
    state: &RobotState,
) -> CommandCreatorResult {
    emit(
        &params.module,
        ModuleType::Thermocycler,
        ctx,
        state,
        Command::DeactivateLid(params.clone()),
    )
}

pub fn thermocycler_run_profile(
    params: &RunProfileParams,
    ctx: &InvariantContext,
    state: &RobotState,
) -> CommandCreatorResult {
    if params.profile.is_empty() {
        return Err(errors::invalid_args("thermocycler profile has no steps").into());
    }
    emit(
        &params.module,
        ModuleType::Thermocycler,
        ctx,
        state,
        Command::RunProfile(params.clone()),
    )
}

pub fn thermocycler_await_profile_complete(
    params: &ModuleOnlyParams,
    ctx: &InvariantContext,
    state: &RobotState,
) -> CommandCreatorResult {
    emit(
        &params.module,
        ModuleType::Thermocycler,
        ctx,
        state,
        Command::AwaitProfileComplete(params.clone()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::command::{ErrorType, ProfileStep};
    use crate::core::fixtures::*;

    fn module(id: &str) -> ModuleOnlyParams {
        ModuleOnlyParams {
            module: id.to_string(),
        }
    }

    #[test]
    fn test_sg027_engage_magnet() {
        let ctx = make_context();
        let params = EngageMagnetParams {
            module: "magDeckId".to_string(),
            engage_height: 10.0,
        };
        let out = engage_magnet(&params, &ctx, &make_state()).unwrap();
        assert_eq!(out.commands, vec![Command::EngageMagnet(params)]);
    }

    #[test]
    fn test_sg027_unknown_module() {
        let ctx = make_context();
        let failure = disengage_magnet(&module("ghostId"), &ctx, &make_state()).unwrap_err();
        assert_eq!(failure.errors[0].error_type, ErrorType::ModuleDoesNotExist);
    }

    #[test]
    fn test_sg027_wrong_module_type() {
        let ctx = make_context();
        let params = TemperatureParams {
            module: "magDeckId".to_string(),
            temperature: 4.0,
        };
        let failure = set_temperature(&params, &ctx, &make_state()).unwrap_err();
        assert_eq!(failure.errors[0].error_type, ErrorType::ModuleTypeMismatch);
    }

    #[test]
    fn test_sg027_thermocycler_commands() {
        let ctx = make_context();
        let state = make_state();
        let tc = module("thermocyclerId");
        let names: Vec<&str> = [
            thermocycler_open_lid(&tc, &ctx, &state),
            thermocycler_close_lid(&tc, &ctx, &state),
            thermocycler_deactivate_block(&tc, &ctx, &state),
            thermocycler_deactivate_lid(&tc, &ctx, &state),
            thermocycler_await_profile_complete(&tc, &ctx, &state),
        ]
        .iter()
        .map(|r| r.as_ref().unwrap().commands[0].name())
        .collect();
        assert_eq!(
            names,
            vec![
                "thermocycler/openLid",
                "thermocycler/closeLid",
                "thermocycler/deactivateBlock",
                "thermocycler/deactivateLid",
                "thermocycler/awaitProfileComplete"
            ]
        );
    }

    #[test]
    fn test_sg027_run_profile_needs_steps() {
        let ctx = make_context();
        let mut params = RunProfileParams {
            module: "thermocyclerId".to_string(),
            profile: vec![],
            volume: 20.0,
        };
        let failure = thermocycler_run_profile(&params, &ctx, &make_state()).unwrap_err();
        assert_eq!(failure.errors[0].error_type, ErrorType::InvalidArgs);

        params.profile.push(ProfileStep {
            temperature: 95.0,
            hold_time: 30.0,
        });
        assert!(thermocycler_run_profile(&params, &ctx, &make_state()).is_ok());
    }
}
