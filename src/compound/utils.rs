//! SG-030: Building blocks shared by compound steps.

use crate::atomic;
use crate::atomic::{DelayArgs, DelayTarget};
use crate::core::args::{ChangeTip, DelaySettings};
use crate::core::command::{
    AspDispAirgapParams, BlowoutParams, CommandCreatorFailure, CommandCreatorResult,
    PipetteAccessParams, TouchTipParams, Wait,
};
use crate::core::context::{InvariantContext, PipetteSpec};
use crate::core::definitions::FIXED_TRASH_ID;
use crate::core::errors;
use crate::core::executor::{
    curry_command_creator, curry_fn, reduce_command_creators, CurriedCommandCreator,
};
use crate::core::selectors::next_tip;

/// Blow out into the well liquid was aspirated from.
pub const SOURCE_WELL_BLOWOUT_DESTINATION: &str = "source_well";

/// Blow out into the well liquid was dispensed into.
pub const DEST_WELL_BLOWOUT_DESTINATION: &str = "dest_well";

/// Air gaps are drawn this far above the well top.
pub const AIR_GAP_OFFSET_FROM_TOP_MM: f64 = 1.0;

/// Resolve a pipette's spec, failing the step if it is unknown.
pub fn pipette_spec<'a>(
    ctx: &'a InvariantContext,
    pipette_id: &str,
) -> Result<&'a PipetteSpec, CommandCreatorFailure> {
    ctx.pipette(pipette_id)
        .map(|p| &p.spec)
        .ok_or_else(|| errors::pipette_does_not_exist(pipette_id).into())
}

/// Flow rates for one step, defaults filled from the pipette spec.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowRates {
    pub aspirate: f64,
    pub dispense: f64,
    pub blowout: f64,
}

impl FlowRates {
    pub fn resolve(
        spec: &PipetteSpec,
        aspirate: Option<f64>,
        dispense: Option<f64>,
        blowout: Option<f64>,
    ) -> Self {
        Self {
            aspirate: aspirate.unwrap_or(spec.default_aspirate_flow_rate),
            dispense: dispense.unwrap_or(spec.default_dispense_flow_rate),
            blowout: blowout.unwrap_or(spec.default_blowout_flow_rate),
        }
    }
}

/// Usable tip capacity for a pipette, failing the step if it is unknown.
pub fn tip_capacity(ctx: &InvariantContext, pipette_id: &str) -> Result<f64, CommandCreatorFailure> {
    ctx.pipette_tip_capacity(pipette_id)
        .ok_or_else(|| errors::pipette_does_not_exist(pipette_id).into())
}

/// Fail the step if any labware id is not placed.
pub fn require_labware(ctx: &InvariantContext, labware_ids: &[&str]) -> Result<(), CommandCreatorFailure> {
    let missing: Vec<_> = labware_ids
        .iter()
        .filter(|id| !ctx.has_labware(id))
        .map(|id| errors::labware_does_not_exist(id))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(CommandCreatorFailure::new(missing))
    }
}

/// Offset from the well bottom for air gaps.
pub fn air_gap_offset(ctx: &InvariantContext, labware_id: &str, well: &str) -> f64 {
    let depth = ctx
        .labware_definition(labware_id)
        .map(|def| def.well_depth(well))
        .unwrap_or(0.0);
    depth + AIR_GAP_OFFSET_FROM_TOP_MM
}

/// Touch-tip height: the explicit value, else the labware's default.
pub fn touch_tip_offset(ctx: &InvariantContext, labware_id: &str, explicit: Option<f64>) -> f64 {
    explicit.unwrap_or_else(|| {
        ctx.labware_definition(labware_id)
            .map(|def| def.default_touch_tip_offset())
            .unwrap_or(0.0)
    })
}

/// Whether a new tip is needed before moving liquid for one pair.
pub fn needs_new_tip(
    change_tip: ChangeTip,
    first: bool,
    source_changed: bool,
    dest_changed: bool,
) -> bool {
    match change_tip {
        ChangeTip::Always => true,
        ChangeTip::Once => first,
        ChangeTip::PerSource => first || source_changed,
        ChangeTip::PerDest => first || dest_changed,
        ChangeTip::Never => false,
    }
}

// ============================================================================
// Tips
// ============================================================================

/// Drop the current tip (if any) in the trash and pick up the next one.
///
/// The next tip is chosen against the state at the moment this creator runs,
/// so chained replacements walk through the racks.
pub fn replace_tip(pipette_id: &str) -> CurriedCommandCreator {
    let pipette = pipette_id.to_string();
    curry_fn(move |ctx, state| {
        let Some(tip) = next_tip(&pipette, state) else {
            return Err(errors::insufficient_tips(&pipette).into());
        };
        let mut creators = Vec::with_capacity(2);
        if state.pipette_has_tip(&pipette) {
            creators.push(curry_command_creator(
                atomic::drop_tip,
                PipetteAccessParams {
                    pipette: pipette.clone(),
                    labware: FIXED_TRASH_ID.to_string(),
                    well: "A1".to_string(),
                },
            ));
        }
        creators.push(curry_command_creator(
            atomic::pick_up_tip,
            PipetteAccessParams {
                pipette: pipette.clone(),
                labware: tip.tiprack_id,
                well: tip.well,
            },
        ));
        reduce_command_creators(&creators, ctx, state)
    })
}

// ============================================================================
// Liquid handling pieces
// ============================================================================

pub fn aspirate_step(
    pipette: &str,
    volume: f64,
    labware: &str,
    well: &str,
    offset_from_bottom_mm: f64,
    flow_rate: f64,
) -> CurriedCommandCreator {
    curry_command_creator(
        atomic::aspirate,
        AspDispAirgapParams {
            pipette: pipette.to_string(),
            volume,
            labware: labware.to_string(),
            well: well.to_string(),
            offset_from_bottom_mm,
            flow_rate,
        },
    )
}

pub fn dispense_step(
    pipette: &str,
    volume: f64,
    labware: &str,
    well: &str,
    offset_from_bottom_mm: f64,
    flow_rate: f64,
) -> CurriedCommandCreator {
    curry_command_creator(
        atomic::dispense,
        AspDispAirgapParams {
            pipette: pipette.to_string(),
            volume,
            labware: labware.to_string(),
            well: well.to_string(),
            offset_from_bottom_mm,
            flow_rate,
        },
    )
}

/// Draw an air gap above a well.
pub fn air_gap_step(
    ctx: &InvariantContext,
    pipette: &str,
    volume: f64,
    labware: &str,
    well: &str,
    flow_rate: f64,
) -> CurriedCommandCreator {
    curry_command_creator(
        atomic::air_gap,
        AspDispAirgapParams {
            pipette: pipette.to_string(),
            volume,
            labware: labware.to_string(),
            well: well.to_string(),
            offset_from_bottom_mm: air_gap_offset(ctx, labware, well),
            flow_rate,
        },
    )
}

/// Expel an air gap above a well.
pub fn dispense_air_gap_step(
    ctx: &InvariantContext,
    pipette: &str,
    volume: f64,
    labware: &str,
    well: &str,
    flow_rate: f64,
) -> CurriedCommandCreator {
    curry_command_creator(
        atomic::dispense_air_gap,
        AspDispAirgapParams {
            pipette: pipette.to_string(),
            volume,
            labware: labware.to_string(),
            well: well.to_string(),
            offset_from_bottom_mm: air_gap_offset(ctx, labware, well),
            flow_rate,
        },
    )
}

pub fn touch_tip_step(
    ctx: &InvariantContext,
    pipette: &str,
    labware: &str,
    well: &str,
    explicit_offset: Option<f64>,
) -> CurriedCommandCreator {
    curry_command_creator(
        atomic::touch_tip,
        TouchTipParams {
            pipette: pipette.to_string(),
            labware: labware.to_string(),
            well: well.to_string(),
            offset_from_bottom_mm: touch_tip_offset(ctx, labware, explicit_offset),
        },
    )
}

/// Hold the tip at a height in a well for a number of seconds.
pub fn delay_in_well(
    pipette: &str,
    labware: &str,
    well: &str,
    settings: &DelaySettings,
) -> CurriedCommandCreator {
    curry_command_creator(
        atomic::delay,
        DelayArgs {
            wait: Wait::Seconds(settings.seconds),
            message: None,
            target: Some(DelayTarget {
                pipette: pipette.to_string(),
                labware: labware.to_string(),
                well: well.to_string(),
                mm_from_bottom: settings.mm_from_bottom,
            }),
        },
    )
}

/// Params for a repeated aspirate/dispense in one well.
#[derive(Debug, Clone)]
pub struct MixUtilArgs<'a> {
    pub pipette: &'a str,
    pub labware: &'a str,
    pub well: &'a str,
    pub volume: f64,
    pub times: u32,
    pub aspirate_offset_from_bottom_mm: f64,
    pub dispense_offset_from_bottom_mm: f64,
    pub aspirate_flow_rate: f64,
    pub dispense_flow_rate: f64,
    pub aspirate_delay_seconds: Option<f64>,
    pub dispense_delay_seconds: Option<f64>,
}

/// `times` rounds of aspirate then dispense, with optional pauses after each.
pub fn mix_util(args: &MixUtilArgs) -> Vec<CurriedCommandCreator> {
    let mut creators = Vec::new();
    for _ in 0..args.times {
        creators.push(aspirate_step(
            args.pipette,
            args.volume,
            args.labware,
            args.well,
            args.aspirate_offset_from_bottom_mm,
            args.aspirate_flow_rate,
        ));
        if let Some(seconds) = args.aspirate_delay_seconds {
            creators.push(curry_command_creator(atomic::delay, DelayArgs::seconds(seconds)));
        }
        creators.push(dispense_step(
            args.pipette,
            args.volume,
            args.labware,
            args.well,
            args.dispense_offset_from_bottom_mm,
            args.dispense_flow_rate,
        ));
        if let Some(seconds) = args.dispense_delay_seconds {
            creators.push(curry_command_creator(atomic::delay, DelayArgs::seconds(seconds)));
        }
    }
    creators
}

/// Where and how to blow out after a dispense.
#[derive(Debug, Clone)]
pub struct BlowoutUtilArgs<'a> {
    pub pipette: &'a str,
    pub source_labware: &'a str,
    pub source_well: &'a str,
    pub dest_labware: &'a str,
    pub dest_well: &'a str,
    /// `source_well`, `dest_well`, a labware id, or none
    pub blowout_location: Option<&'a str>,
    pub flow_rate: f64,
    pub offset_from_top_mm: f64,
}

/// Resolve a blowout location to a creator. No location, no creator.
/// A labware id blows out into that labware's first well.
pub fn blowout_util(args: &BlowoutUtilArgs, ctx: &InvariantContext) -> Vec<CurriedCommandCreator> {
    let Some(location) = args.blowout_location else {
        return Vec::new();
    };
    let (labware, well) = match location {
        SOURCE_WELL_BLOWOUT_DESTINATION => (args.source_labware, args.source_well.to_string()),
        DEST_WELL_BLOWOUT_DESTINATION => (args.dest_labware, args.dest_well.to_string()),
        labware_id => {
            let well = ctx
                .labware_definition(labware_id)
                .and_then(|def| def.first_well())
                .unwrap_or("A1")
                .to_string();
            (labware_id, well)
        }
    };
    let depth = ctx
        .labware_definition(labware)
        .map(|def| def.well_depth(&well))
        .unwrap_or(0.0);
    vec![curry_command_creator(
        atomic::blowout,
        BlowoutParams {
            pipette: args.pipette.to_string(),
            labware: labware.to_string(),
            well,
            flow_rate: args.flow_rate,
            offset_from_bottom_mm: depth + args.offset_from_top_mm,
        },
    )]
}

/// Run a list of creators; shorthand used by every compound step.
pub fn run(
    creators: Vec<CurriedCommandCreator>,
    ctx: &InvariantContext,
    state: &crate::core::state::RobotState,
) -> CommandCreatorResult {
    reduce_command_creators(&creators, ctx, state)
}
