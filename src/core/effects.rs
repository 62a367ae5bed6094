//! SG-007: Forward effects: the next robot state implied by a command.
//!
//! Creators only validate and emit commands; this module is the single place
//! that knows how each command changes tips, liquid and modules. Updates copy
//! only the maps they touch (`Arc::make_mut`), leaving the rest shared with
//! the previous state.

use super::command::{AspDispAirgapParams, Command, PipetteAccessParams};
use super::context::InvariantContext;
use super::definitions::tiprack_well_names_by_col;
use super::selectors::get_tiprack_volume;
use super::state::{
    total_volume, Contents, LiquidState, ModuleState, PipetteTipState, RobotState,
    TemperatureStatus, VOLUME_EPSILON,
};
use std::sync::Arc;

/// State after `command` runs.
pub fn next_robot_state(command: &Command, ctx: &InvariantContext, state: &RobotState) -> RobotState {
    let mut next = state.clone();
    apply_command(command, ctx, &mut next);
    next
}

/// State after every command in order.
pub fn apply_commands(commands: &[Command], ctx: &InvariantContext, state: &RobotState) -> RobotState {
    let mut next = state.clone();
    for command in commands {
        apply_command(command, ctx, &mut next);
    }
    next
}

/// Apply one command to an owned state in place.
pub fn apply_command(command: &Command, ctx: &InvariantContext, state: &mut RobotState) {
    match command {
        Command::PickUpTip(p) => pick_up_tip(p, ctx, state),
        Command::DropTip(p) => drop_tip(&p.pipette, state),
        Command::Aspirate(p) => aspirate(p, ctx, state),
        Command::Dispense(p) => dispense(p, ctx, state),
        Command::Blowout(p) => blowout(&p.pipette, &p.labware, &p.well, ctx, state),
        Command::EngageMagnet(p) => update_module(state, &p.module, |m| {
            if let ModuleState::Magnetic {
                engaged,
                engage_height,
            } = m
            {
                *engaged = true;
                *engage_height = Some(p.engage_height);
            }
        }),
        Command::DisengageMagnet(p) => update_module(state, &p.module, |m| {
            if let ModuleState::Magnetic {
                engaged,
                engage_height,
            } = m
            {
                *engaged = false;
                *engage_height = None;
            }
        }),
        Command::SetTargetTemperature(p) => update_module(state, &p.module, |m| {
            if let ModuleState::Temperature {
                status,
                target_temperature,
            } = m
            {
                *status = TemperatureStatus::ApproachingTarget;
                *target_temperature = Some(p.temperature);
            }
        }),
        Command::AwaitTemperature(p) => update_module(state, &p.module, |m| {
            if let ModuleState::Temperature {
                status,
                target_temperature,
            } = m
            {
                if *target_temperature == Some(p.temperature) {
                    *status = TemperatureStatus::AtTarget;
                }
            }
        }),
        Command::DeactivateTemperature(p) => update_module(state, &p.module, |m| {
            if let ModuleState::Temperature {
                status,
                target_temperature,
            } = m
            {
                *status = TemperatureStatus::Deactivated;
                *target_temperature = None;
            }
        }),
        Command::SetTargetBlockTemperature(p) => update_thermocycler(state, &p.module, |block, _, _| {
            *block = Some(p.temperature);
        }),
        Command::DeactivateBlock(p) => update_thermocycler(state, &p.module, |block, _, _| {
            *block = None;
        }),
        Command::SetTargetLidTemperature(p) => update_thermocycler(state, &p.module, |_, lid, _| {
            *lid = Some(p.temperature);
        }),
        Command::DeactivateLid(p) => update_thermocycler(state, &p.module, |_, lid, _| {
            *lid = None;
        }),
        Command::OpenLid(p) => update_thermocycler(state, &p.module, |_, _, open| {
            *open = Some(true);
        }),
        Command::CloseLid(p) => update_thermocycler(state, &p.module, |_, _, open| {
            *open = Some(false);
        }),
        // no state change
        Command::AirGap(_)
        | Command::DispenseAirGap(_)
        | Command::TouchTip(_)
        | Command::MoveToWell(_)
        | Command::Delay(_)
        | Command::AwaitBlockTemperature(_)
        | Command::AwaitLidTemperature(_)
        | Command::RunProfile(_)
        | Command::AwaitProfileComplete(_) => {}
    }
}

// ============================================================================
// Tips
// ============================================================================

fn pick_up_tip(p: &PipetteAccessParams, ctx: &InvariantContext, state: &mut RobotState) {
    let channels = state.pipettes.get(&p.pipette).map(|x| x.channels).unwrap_or(1);
    let wells: Vec<String> = if channels == 1 {
        vec![p.well.clone()]
    } else {
        tiprack_well_names_by_col()
            .iter()
            .find(|col| col.first() == Some(&p.well))
            .cloned()
            .unwrap_or_else(|| vec![p.well.clone()])
    };

    let racks = Arc::make_mut(&mut state.tip_state.tipracks);
    if let Some(rack) = racks.get_mut(&p.labware) {
        let rack = Arc::make_mut(rack);
        for well in wells {
            rack.insert(well, false);
        }
    }

    let tip_max_volume = get_tiprack_volume(&p.labware, ctx).or_else(|| {
        let fallback = state.pipettes.get(&p.pipette).map(|x| x.max_volume);
        tracing::warn!(
            tiprack = %p.labware,
            "no tip volume for tiprack, using pipette maximum"
        );
        fallback
    });
    Arc::make_mut(&mut state.tip_state.pipettes).insert(
        p.pipette.clone(),
        PipetteTipState {
            has_tip: true,
            tip_max_volume,
        },
    );
}

fn drop_tip(pipette_id: &str, state: &mut RobotState) {
    Arc::make_mut(&mut state.tip_state.pipettes)
        .insert(pipette_id.to_string(), PipetteTipState::default());
    if let Some(liquid) = state.liquid_state.as_mut() {
        if liquid.pipettes.contains_key(pipette_id) {
            Arc::make_mut(&mut liquid.pipettes).shift_remove(pipette_id);
        }
    }
}

// ============================================================================
// Liquid
// ============================================================================

/// Wells the channels of a pipette enter when it targets `well`. An 8-channel
/// pipette spans the column below `well`; in a single-row labware such as a
/// reservoir every channel lands in the same well.
pub fn wells_for_channels(ctx: &InvariantContext, labware_id: &str, well: &str, channels: u8) -> Vec<String> {
    let channels = usize::from(channels.max(1));
    if channels == 1 {
        return vec![well.to_string()];
    }
    let column = ctx
        .labware_definition(labware_id)
        .and_then(|def| def.column_of(well));
    match column {
        Some(col) if col.len() >= channels => {
            let start = col.iter().position(|w| w == well).unwrap_or(0);
            col.iter().skip(start).take(channels).cloned().collect()
        }
        _ => vec![well.to_string(); channels],
    }
}

fn channels_of(state: &RobotState, pipette_id: &str) -> u8 {
    state.pipettes.get(pipette_id).map(|p| p.channels).unwrap_or(1)
}

/// Remove up to `volume` from `contents`, proportionally across groups.
/// Returns what was removed.
fn take_proportional(contents: &mut Contents, volume: f64) -> Contents {
    let total = total_volume(contents);
    if total <= VOLUME_EPSILON || volume <= 0.0 {
        return Contents::new();
    }
    let fraction = (volume / total).min(1.0);
    let mut removed = Contents::new();
    for (group, amount) in contents.iter_mut() {
        let take = *amount * fraction;
        *amount = (*amount - take).max(0.0);
        removed.insert(group.clone(), take);
    }
    contents.retain(|_, amount| *amount > VOLUME_EPSILON);
    removed
}

fn merge_into(target: &mut Contents, added: &Contents, scale: f64) {
    for (group, amount) in added {
        *target.entry(group.clone()).or_insert(0.0) += amount * scale;
    }
}

fn aspirate(p: &AspDispAirgapParams, ctx: &InvariantContext, state: &mut RobotState) {
    let wells = wells_for_channels(ctx, &p.labware, &p.well, channels_of(state, &p.pipette));
    let Some(liquid) = state.liquid_state.as_mut() else {
        return;
    };
    let per_channel = 1.0 / wells.len() as f64;
    let mut drawn = Contents::new();
    if let Some(labware) = Arc::make_mut(&mut liquid.labware).get_mut(&p.labware) {
        let labware = Arc::make_mut(labware);
        for well in &wells {
            if let Some(contents) = labware.get_mut(well) {
                let removed = take_proportional(contents, p.volume);
                merge_into(&mut drawn, &removed, per_channel);
            }
        }
    }
    if !drawn.is_empty() {
        let pipette = Arc::make_mut(&mut liquid.pipettes)
            .entry(p.pipette.clone())
            .or_default();
        merge_into(pipette, &drawn, 1.0);
    }
}

fn dispense(p: &AspDispAirgapParams, ctx: &InvariantContext, state: &mut RobotState) {
    let wells = wells_for_channels(ctx, &p.labware, &p.well, channels_of(state, &p.pipette));
    let Some(liquid) = state.liquid_state.as_mut() else {
        return;
    };
    let dispensed = match Arc::make_mut(&mut liquid.pipettes).get_mut(&p.pipette) {
        Some(contents) => take_proportional(contents, p.volume),
        None => return,
    };
    deposit(liquid, &p.labware, &wells, &dispensed);
}

fn blowout(pipette_id: &str, labware_id: &str, well: &str, ctx: &InvariantContext, state: &mut RobotState) {
    let wells = wells_for_channels(ctx, labware_id, well, channels_of(state, pipette_id));
    let Some(liquid) = state.liquid_state.as_mut() else {
        return;
    };
    let expelled = match Arc::make_mut(&mut liquid.pipettes).shift_remove(pipette_id) {
        Some(contents) => contents,
        None => return,
    };
    deposit(liquid, labware_id, &wells, &expelled);
}

/// Add one channel's worth of `contents` to each well.
fn deposit(liquid: &mut LiquidState, labware_id: &str, wells: &[String], contents: &Contents) {
    if contents.is_empty() {
        return;
    }
    let labware = Arc::make_mut(&mut liquid.labware)
        .entry(labware_id.to_string())
        .or_default();
    let labware = Arc::make_mut(labware);
    for well in wells {
        merge_into(labware.entry(well.clone()).or_default(), contents, 1.0);
    }
}

// ============================================================================
// Modules
// ============================================================================

fn update_module(state: &mut RobotState, module_id: &str, f: impl FnOnce(&mut ModuleState)) {
    if !state.modules.contains_key(module_id) {
        tracing::warn!(module = module_id, "command for unknown module ignored");
        return;
    }
    if let Some(module) = Arc::make_mut(&mut state.modules).get_mut(module_id) {
        f(&mut module.module_state);
    }
}

fn update_thermocycler(
    state: &mut RobotState,
    module_id: &str,
    f: impl FnOnce(&mut Option<f64>, &mut Option<f64>, &mut Option<bool>),
) {
    update_module(state, module_id, |m| {
        if let ModuleState::Thermocycler {
            block_target_temp,
            lid_target_temp,
            lid_open,
        } = m
        {
            f(block_target_temp, lid_target_temp, lid_open);
        }
    });
}
