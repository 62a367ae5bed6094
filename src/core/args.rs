//! SG-012: Step args, the hydrated input to each compound step creator.
//!
//! Tagged by `commandCreatorFnName` so a serialized args bundle names the
//! creator that consumes it.

use super::command::{ProfileStep, Wait};
use super::definitions::FIXED_TRASH_ID;
use serde::{Deserialize, Serialize};
use std::fmt;

/// When a compound step replaces its tip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeTip {
    #[default]
    Always,
    Once,
    PerSource,
    PerDest,
    Never,
}

impl fmt::Display for ChangeTip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Always => "always",
            Self::Once => "once",
            Self::PerSource => "perSource",
            Self::PerDest => "perDest",
            Self::Never => "never",
        };
        write!(f, "{}", s)
    }
}

/// Repeated aspirate/dispense.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MixSettings {
    pub volume: f64,
    pub times: u32,
}

/// Pause after aspirating or dispensing, with the tip held at a height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelaySettings {
    pub seconds: f64,
    pub mm_from_bottom: f64,
}

/// Extra volume aspirated by a distribute and blown out after each chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisposalSettings {
    pub volume: f64,
    #[serde(default = "default_disposal_location")]
    pub blowout_location: String,
}

fn default_disposal_location() -> String {
    FIXED_TRASH_ID.to_string()
}

fn default_aspirate_offset() -> f64 {
    1.0
}

fn default_dispense_offset() -> f64 {
    0.5
}

// ============================================================================
// Transfer-like
// ============================================================================

/// Fields shared by transfer, consolidate and distribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferLikeArgs {
    pub pipette: String,
    pub volume: f64,
    pub source_labware: String,
    pub dest_labware: String,

    #[serde(default)]
    pub change_tip: ChangeTip,
    #[serde(default)]
    pub pre_wet_tip: bool,

    #[serde(default)]
    pub touch_tip_after_aspirate: bool,
    #[serde(default)]
    pub touch_tip_after_aspirate_offset_mm_from_bottom: Option<f64>,
    #[serde(default)]
    pub touch_tip_after_dispense: bool,
    #[serde(default)]
    pub touch_tip_after_dispense_offset_mm_from_bottom: Option<f64>,

    #[serde(default)]
    pub air_gap_volume: Option<f64>,
    #[serde(default)]
    pub mix_before_aspirate: Option<MixSettings>,
    #[serde(default)]
    pub aspirate_delay: Option<DelaySettings>,
    #[serde(default)]
    pub dispense_delay: Option<DelaySettings>,

    /// Defaults to the pipette's own rate when unset
    #[serde(default)]
    pub aspirate_flow_rate: Option<f64>,
    #[serde(default)]
    pub dispense_flow_rate: Option<f64>,
    #[serde(default)]
    pub blowout_flow_rate: Option<f64>,

    #[serde(default = "default_aspirate_offset")]
    pub aspirate_offset_from_bottom_mm: f64,
    #[serde(default = "default_dispense_offset")]
    pub dispense_offset_from_bottom_mm: f64,
    #[serde(default)]
    pub blowout_offset_from_top_mm: f64,

    /// `source_well`, `dest_well`, a labware id, or none
    #[serde(default)]
    pub blowout_location: Option<String>,

    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl TransferLikeArgs {
    /// Args with every optional behaviour off.
    pub fn new(pipette: &str, volume: f64, source_labware: &str, dest_labware: &str) -> Self {
        Self {
            pipette: pipette.to_string(),
            volume,
            source_labware: source_labware.to_string(),
            dest_labware: dest_labware.to_string(),
            change_tip: ChangeTip::default(),
            pre_wet_tip: false,
            touch_tip_after_aspirate: false,
            touch_tip_after_aspirate_offset_mm_from_bottom: None,
            touch_tip_after_dispense: false,
            touch_tip_after_dispense_offset_mm_from_bottom: None,
            air_gap_volume: None,
            mix_before_aspirate: None,
            aspirate_delay: None,
            dispense_delay: None,
            aspirate_flow_rate: None,
            dispense_flow_rate: None,
            blowout_flow_rate: None,
            aspirate_offset_from_bottom_mm: default_aspirate_offset(),
            dispense_offset_from_bottom_mm: default_dispense_offset(),
            blowout_offset_from_top_mm: 0.0,
            blowout_location: None,
            name: None,
            description: None,
        }
    }

    /// Air gap volume, treating zero as none.
    pub fn air_gap(&self) -> Option<f64> {
        self.air_gap_volume.filter(|v| *v > 0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferArgs {
    #[serde(flatten)]
    pub common: TransferLikeArgs,
    pub source_wells: Vec<String>,
    pub dest_wells: Vec<String>,
    #[serde(default)]
    pub mix_in_destination: Option<MixSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidateArgs {
    #[serde(flatten)]
    pub common: TransferLikeArgs,
    pub source_wells: Vec<String>,
    pub dest_well: String,
    #[serde(default)]
    pub mix_in_destination: Option<MixSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributeArgs {
    #[serde(flatten)]
    pub common: TransferLikeArgs,
    pub source_well: String,
    pub dest_wells: Vec<String>,
    #[serde(default)]
    pub disposal: Option<DisposalSettings>,
}

// ============================================================================
// Mix and pause
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixArgs {
    pub pipette: String,
    pub labware: String,
    pub wells: Vec<String>,
    pub volume: f64,
    pub times: u32,

    #[serde(default)]
    pub change_tip: ChangeTip,
    #[serde(default)]
    pub touch_tip: bool,
    #[serde(default)]
    pub touch_tip_offset_mm_from_bottom: Option<f64>,

    #[serde(default)]
    pub aspirate_delay_seconds: Option<f64>,
    #[serde(default)]
    pub dispense_delay_seconds: Option<f64>,

    #[serde(default)]
    pub aspirate_flow_rate: Option<f64>,
    #[serde(default)]
    pub dispense_flow_rate: Option<f64>,
    #[serde(default)]
    pub blowout_flow_rate: Option<f64>,

    #[serde(default = "default_aspirate_offset")]
    pub aspirate_offset_from_bottom_mm: f64,
    #[serde(default = "default_dispense_offset")]
    pub dispense_offset_from_bottom_mm: f64,
    #[serde(default)]
    pub blowout_offset_from_top_mm: f64,
    #[serde(default)]
    pub blowout_location: Option<String>,

    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl MixArgs {
    pub fn new(pipette: &str, labware: &str, wells: &[&str], volume: f64, times: u32) -> Self {
        Self {
            pipette: pipette.to_string(),
            labware: labware.to_string(),
            wells: wells.iter().map(|w| w.to_string()).collect(),
            volume,
            times,
            change_tip: ChangeTip::default(),
            touch_tip: false,
            touch_tip_offset_mm_from_bottom: None,
            aspirate_delay_seconds: None,
            dispense_delay_seconds: None,
            aspirate_flow_rate: None,
            dispense_flow_rate: None,
            blowout_flow_rate: None,
            aspirate_offset_from_bottom_mm: default_aspirate_offset(),
            dispense_offset_from_bottom_mm: default_dispense_offset(),
            blowout_offset_from_top_mm: 0.0,
            blowout_location: None,
            name: None,
            description: None,
        }
    }
}

/// A pause: a timed delay or a wait for the operator to resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PauseArgs {
    pub wait: Wait,
    #[serde(default)]
    pub message: Option<String>,
}

// ============================================================================
// Modules
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleArgs {
    pub module: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngageMagnetArgs {
    pub module: String,
    pub engage_height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetTemperatureArgs {
    pub module: String,
    pub target_temperature: f64,
    /// Emit an await after setting the target
    #[serde(default)]
    pub await_temperature: bool,
}

/// Desired thermocycler state. Unset temperatures mean "deactivated".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermocyclerStateArgs {
    pub module: String,
    #[serde(default)]
    pub block_target_temp: Option<f64>,
    #[serde(default)]
    pub lid_target_temp: Option<f64>,
    pub lid_open: bool,
}

/// A thermocycler profile run, followed by a hold state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermocyclerProfileArgs {
    pub module: String,
    pub profile: Vec<ProfileStep>,
    pub volume: f64,
    pub profile_target_lid_temp: f64,
    #[serde(default)]
    pub block_target_temp_hold: Option<f64>,
    #[serde(default)]
    pub lid_target_temp_hold: Option<f64>,
    #[serde(default)]
    pub lid_open_hold: bool,
}

// ============================================================================
// Step args
// ============================================================================

/// Hydrated args for one step, tagged by the creator that consumes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "commandCreatorFnName", rename_all = "camelCase")]
pub enum StepArgs {
    Transfer(TransferArgs),
    Consolidate(ConsolidateArgs),
    Distribute(DistributeArgs),
    Mix(MixArgs),
    Delay(PauseArgs),
    EngageMagnet(EngageMagnetArgs),
    DisengageMagnet(ModuleArgs),
    SetTemperature(SetTemperatureArgs),
    DeactivateTemperature(ModuleArgs),
    ThermocyclerState(ThermocyclerStateArgs),
    ThermocyclerProfile(ThermocyclerProfileArgs),
}

impl StepArgs {
    /// Name of the creator these args feed.
    pub fn creator_name(&self) -> &'static str {
        match self {
            Self::Transfer(_) => "transfer",
            Self::Consolidate(_) => "consolidate",
            Self::Distribute(_) => "distribute",
            Self::Mix(_) => "mix",
            Self::Delay(_) => "delay",
            Self::EngageMagnet(_) => "engageMagnet",
            Self::DisengageMagnet(_) => "disengageMagnet",
            Self::SetTemperature(_) => "setTemperature",
            Self::DeactivateTemperature(_) => "deactivateTemperature",
            Self::ThermocyclerState(_) => "thermocyclerState",
            Self::ThermocyclerProfile(_) => "thermocyclerProfile",
        }
    }
}
