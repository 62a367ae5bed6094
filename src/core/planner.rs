//! SG-010: Liquid planning helpers and regeneration plans.
//!
//! The first half splits volumes and groups wells for the compound steps.
//! The second half diffs a fresh generation against a previous output by
//! step fingerprint.

use super::args::StepArgs;
use super::command::{CommandCreatorError, CommandCreatorFailure};
use super::errors;
use super::types::{ExecutionPlan, GeneratedProtocol, GeneratedStep, PlanAction, PlannedChange};

// ============================================================================
// Liquid planning
// ============================================================================

/// Upper bound on the sub-volumes one transfer may be split into.
pub const MAX_SPLIT_PARTS: usize = 10_000;

/// Split `volume` into ⌈volume/max⌉ equal parts.
///
/// A non-positive max yields the volume unsplit; the aspirate that follows
/// reports the real problem. Non-finite volumes and splits beyond
/// [`MAX_SPLIT_PARTS`] fail with `INVALID_ARGS`.
pub fn split_liquid(volume: f64, max: f64) -> Result<Vec<f64>, CommandCreatorError> {
    if !volume.is_finite() {
        return Err(errors::invalid_args(format!("cannot split volume {}", volume)));
    }
    if max.is_nan() || max <= 0.0 || volume <= max {
        return Ok(vec![volume]);
    }
    let parts = (volume / max).ceil();
    if parts > MAX_SPLIT_PARTS as f64 {
        return Err(errors::invalid_args(format!(
            "volume {} needs {} tip loads of {} (limit {})",
            volume, parts, max, MAX_SPLIT_PARTS
        )));
    }
    let parts = parts as usize;
    Ok(vec![volume / parts as f64; parts])
}

/// Zip source and dest wells. A single source or dest is broadcast to the
/// other side's length; otherwise lengths must match.
pub fn pair_wells(
    sources: &[String],
    dests: &[String],
) -> Result<Vec<(String, String)>, CommandCreatorFailure> {
    let pairs = match (sources.len(), dests.len()) {
        (0, _) | (_, 0) => {
            return Err(errors::invalid_args("transfer needs at least one source and one dest well").into())
        }
        (1, _) => dests
            .iter()
            .map(|d| (sources[0].clone(), d.clone()))
            .collect(),
        (_, 1) => sources
            .iter()
            .map(|s| (s.clone(), dests[0].clone()))
            .collect(),
        (s, d) if s == d => sources.iter().cloned().zip(dests.iter().cloned()).collect(),
        (s, d) => {
            return Err(errors::invalid_args(format!(
                "cannot pair {} source wells with {} dest wells",
                s, d
            ))
            .into())
        }
    };
    Ok(pairs)
}

/// Group wells into runs of at most `per_chunk`.
pub fn chunk(wells: &[String], per_chunk: usize) -> Vec<Vec<String>> {
    wells
        .chunks(per_chunk.max(1))
        .map(|c| c.to_vec())
        .collect()
}

/// How many per-well volumes fit in one tip load after `reserved` is set aside.
pub fn max_wells_per_chunk(tip_volume: f64, per_well_volume: f64, reserved: f64) -> usize {
    if per_well_volume <= 0.0 {
        return 0;
    }
    let usable = tip_volume - reserved;
    if usable < per_well_volume {
        return 0;
    }
    // tolerate float noise such as 3 x 100.000001
    ((usable + 1e-9) / per_well_volume).floor() as usize
}

// ============================================================================
// Regeneration plan
// ============================================================================

/// Compare each generated step with the step at the same index in a previous
/// output.
pub fn plan(current: &GeneratedProtocol, previous: Option<&GeneratedProtocol>) -> ExecutionPlan {
    let mut changes = Vec::new();
    let mut to_create = 0u32;
    let mut to_update = 0u32;
    let mut to_destroy = 0u32;
    let mut unchanged = 0u32;

    let prior_steps: &[GeneratedStep] = previous.map(|p| p.steps.as_slice()).unwrap_or(&[]);

    for step in &current.steps {
        let action = determine_action(step, prior_steps.get(step.index));
        match action {
            PlanAction::Create => to_create += 1,
            PlanAction::Update => to_update += 1,
            PlanAction::Destroy => to_destroy += 1,
            PlanAction::NoOp => unchanged += 1,
        }
        changes.push(PlannedChange {
            step_index: step.index,
            step_type: step.step_type.clone(),
            action,
            command_count: step.commands.len(),
            description: describe_action(step, action),
        });
    }

    for old in prior_steps.iter().skip(current.steps.len()) {
        to_destroy += 1;
        changes.push(PlannedChange {
            step_index: old.index,
            step_type: old.step_type.clone(),
            action: PlanAction::Destroy,
            command_count: old.commands.len(),
            description: describe_action(old, PlanAction::Destroy),
        });
    }

    ExecutionPlan {
        name: current.name.clone(),
        changes,
        to_create,
        to_update,
        to_destroy,
        unchanged,
    }
}

fn determine_action(step: &GeneratedStep, previous: Option<&GeneratedStep>) -> PlanAction {
    match previous {
        None => PlanAction::Create,
        Some(old) if old.fingerprint == step.fingerprint && old.step_type == step.step_type => {
            PlanAction::NoOp
        }
        Some(_) => PlanAction::Update,
    }
}

fn describe_action(step: &GeneratedStep, action: PlanAction) -> String {
    let label = format!("step {} ({})", step.index + 1, step.step_type);
    match action {
        PlanAction::Create => format!("{}: {}", label, step.description),
        PlanAction::Update => format!("{}: commands changed", label),
        PlanAction::Destroy => format!("{}: removed", label),
        PlanAction::NoOp => format!("{}: no changes", label),
    }
}

/// One-line summary of what a step does.
pub fn describe_step(args: &StepArgs) -> String {
    match args {
        StepArgs::Transfer(a) => format!(
            "transfer {} µL {} → {} ({} wells)",
            a.common.volume,
            a.common.source_labware,
            a.common.dest_labware,
            a.source_wells.len().max(a.dest_wells.len())
        ),
        StepArgs::Consolidate(a) => format!(
            "consolidate {} µL from {} wells of {} into {}:{}",
            a.common.volume,
            a.source_wells.len(),
            a.common.source_labware,
            a.common.dest_labware,
            a.dest_well
        ),
        StepArgs::Distribute(a) => format!(
            "distribute {} µL from {}:{} to {} wells of {}",
            a.common.volume,
            a.common.source_labware,
            a.source_well,
            a.dest_wells.len(),
            a.common.dest_labware
        ),
        StepArgs::Mix(a) => format!(
            "mix {} µL x{} in {} wells of {}",
            a.volume,
            a.times,
            a.wells.len(),
            a.labware
        ),
        StepArgs::Delay(a) => match a.message.as_deref() {
            Some(msg) => format!("pause: {}", msg),
            None => "pause".to_string(),
        },
        StepArgs::EngageMagnet(a) => format!("engage {} at {} mm", a.module, a.engage_height),
        StepArgs::DisengageMagnet(a) => format!("disengage {}", a.module),
        StepArgs::SetTemperature(a) => {
            format!("set {} to {} °C", a.module, a.target_temperature)
        }
        StepArgs::DeactivateTemperature(a) => format!("deactivate {}", a.module),
        StepArgs::ThermocyclerState(a) => format!(
            "set {} state (lid {})",
            a.module,
            if a.lid_open { "open" } else { "closed" }
        ),
        StepArgs::ThermocyclerProfile(a) => {
            format!("run {}-step profile on {}", a.profile.len(), a.module)
        }
    }
}
