//! SG-015: Command generation, dispatching step args to compound creators.
//!
//! Each hydrated step becomes one curried creator. The creators run as a
//! timeline over the protocol's initial robot state; every generated step is
//! fingerprinted so later regenerations can be diffed.

use super::args::StepArgs;
use super::executor::{command_creators_timeline, curry_command_creator, CurriedCommandCreator};
use super::fingerprint;
use super::forms::{hydrate_step, HydratedStep};
use super::parser::build_context;
use super::planner::describe_step;
use super::types::{GeneratedProtocol, GeneratedStep, GenerationError, ProtocolFile};
use crate::compound;

/// Output schema version.
pub const SCHEMA_VERSION: &str = "1.0";

/// Generator name written into every output.
pub const GENERATOR: &str = concat!("stepgen ", env!("CARGO_PKG_VERSION"));

/// Bind a step's args to the compound creator for its kind.
pub fn step_creator(args: StepArgs) -> CurriedCommandCreator {
    match args {
        StepArgs::Transfer(a) => curry_command_creator(compound::transfer, a),
        StepArgs::Consolidate(a) => curry_command_creator(compound::consolidate, a),
        StepArgs::Distribute(a) => curry_command_creator(compound::distribute, a),
        StepArgs::Mix(a) => curry_command_creator(compound::mix, a),
        StepArgs::Delay(a) => curry_command_creator(compound::pause, a),
        StepArgs::EngageMagnet(a) => curry_command_creator(compound::engage_magnet_step, a),
        StepArgs::DisengageMagnet(a) => curry_command_creator(compound::disengage_magnet_step, a),
        StepArgs::SetTemperature(a) => curry_command_creator(compound::set_temperature_step, a),
        StepArgs::DeactivateTemperature(a) => {
            curry_command_creator(compound::deactivate_temperature_step, a)
        }
        StepArgs::ThermocyclerState(a) => {
            curry_command_creator(compound::thermocycler_state_step, a)
        }
        StepArgs::ThermocyclerProfile(a) => {
            curry_command_creator(compound::thermocycler_profile_step, a)
        }
    }
}

/// Generate fingerprinted command lists for every step of a protocol.
///
/// Generation stops at the first step that cannot be hydrated or whose
/// creator fails; that step is reported in `error` and later steps are
/// omitted.
pub fn generate(file: &ProtocolFile) -> Result<GeneratedProtocol, String> {
    let (ctx, initial) = build_context(file)?;

    let mut hydrated: Vec<HydratedStep> = Vec::with_capacity(file.steps.len());
    let mut hydration_error = None;
    for (index, form) in file.steps.iter().enumerate() {
        match hydrate_step(form, &ctx) {
            Ok(step) => hydrated.push(step),
            Err(e) => {
                tracing::debug!(step = index, error = %e, "step form rejected");
                hydration_error = Some(GenerationError {
                    step_index: index,
                    errors: vec![e],
                });
                break;
            }
        }
    }

    let creators: Vec<CurriedCommandCreator> =
        hydrated.iter().map(|h| step_creator(h.args.clone())).collect();
    let timeline = command_creators_timeline(&creators, &ctx, &initial);

    let mut steps = Vec::with_capacity(timeline.frames.len());
    for (index, (frame, step)) in timeline.frames.into_iter().zip(&hydrated).enumerate() {
        steps.push(GeneratedStep {
            index,
            step_type: step.args.creator_name().to_string(),
            description: describe_step(&step.args),
            fingerprint: fingerprint::hash_commands(&frame.commands)?,
            commands: frame.commands,
            warnings: frame.warnings,
            form_warnings: step.form_warnings.clone(),
        });
    }

    let error = match timeline.error {
        Some(e) => Some(GenerationError {
            step_index: e.step_index,
            errors: e.errors,
        }),
        None => hydration_error,
    };

    let fingerprints: Vec<&str> = steps.iter().map(|s| s.fingerprint.as_str()).collect();
    Ok(GeneratedProtocol {
        schema: SCHEMA_VERSION.to_string(),
        name: file.name.clone(),
        generator: GENERATOR.to_string(),
        fingerprint: fingerprint::composite_hash(&fingerprints),
        steps,
        error,
    })
}
