//! SG-002: Protocol file schema, generated output and plan types.
//!
//! The protocol file is YAML: deck setup (pipettes, labware, modules, liquids)
//! plus an ordered list of step forms. Generation writes a JSON document with
//! one fingerprinted command list per step.

use super::args::{ChangeTip, DelaySettings, MixSettings};
use super::command::{Command, CommandCreatorError, CommandCreatorWarning, ProfileStep};
use super::context::{LabwareDefinition, ModuleType};
use super::state::{LabwareContents, Mount};
use super::warnings::FormWarning;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Top-level protocol.yaml
// ============================================================================

/// Root of a protocol file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolFile {
    /// Schema version (must be "1.0")
    pub version: String,

    /// Human-readable protocol name
    pub name: String,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,

    /// Custom labware definitions, keyed by labware type
    #[serde(default)]
    pub labware_definitions: IndexMap<String, LabwareDefinition>,

    /// Pipette id → declaration
    #[serde(default)]
    pub pipettes: IndexMap<String, PipetteDecl>,

    /// Labware id → declaration (order-preserving)
    #[serde(default)]
    pub labware: IndexMap<String, LabwareDecl>,

    /// Module id → declaration
    #[serde(default)]
    pub modules: IndexMap<String, ModuleDecl>,

    /// Tiprack id → pipette id
    #[serde(default)]
    pub tiprack_assignment: IndexMap<String, String>,

    /// Labware id → well → ingredient group → volume. Absent disables tracking.
    #[serde(default)]
    pub liquids: Option<IndexMap<String, LabwareContents>>,

    /// Ordered step forms
    #[serde(default)]
    pub steps: Vec<StepForm>,
}

// ============================================================================
// Deck setup
// ============================================================================

/// A mounted pipette.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipetteDecl {
    /// Pipette model, e.g. `p300_single`
    pub name: String,

    pub mount: Mount,

    /// Restrict to tipracks of this type
    #[serde(default)]
    pub tiprack_model: Option<String>,
}

/// A placed labware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabwareDecl {
    #[serde(rename = "type")]
    pub labware_type: String,

    /// Deck slot number, or the id of the module it sits on
    pub slot: SlotRef,

    #[serde(default)]
    pub display_name: Option<String>,
}

/// A placed module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleDecl {
    #[serde(rename = "type")]
    pub module_type: ModuleType,

    pub model: String,

    pub slot: SlotRef,
}

/// Slot reference: a deck slot number or a named location (module id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SlotRef {
    Deck(u32),
    Named(String),
}

impl SlotRef {
    /// Deck slot number, when this names one (numeric strings count).
    pub fn deck_number(&self) -> Option<u32> {
        match self {
            Self::Deck(n) => Some(*n),
            Self::Named(s) => s.parse().ok(),
        }
    }
}

impl fmt::Display for SlotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deck(n) => write!(f, "{}", n),
            Self::Named(s) => write!(f, "{}", s),
        }
    }
}

// ============================================================================
// Step forms
// ============================================================================

/// One protocol step as written in the file, before hydration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "step_type", rename_all = "camelCase")]
pub enum StepForm {
    MoveLiquid(MoveLiquidForm),
    Mix(MixForm),
    Pause(PauseForm),
    Magnet(MagnetForm),
    Temperature(TemperatureForm),
    ThermocyclerState(ThermocyclerStateForm),
    ThermocyclerProfile(ThermocyclerProfileForm),
}

impl StepForm {
    pub fn step_type(&self) -> &'static str {
        match self {
            Self::MoveLiquid(_) => "moveLiquid",
            Self::Mix(_) => "mix",
            Self::Pause(_) => "pause",
            Self::Magnet(_) => "magnet",
            Self::Temperature(_) => "temperature",
            Self::ThermocyclerState(_) => "thermocyclerState",
            Self::ThermocyclerProfile(_) => "thermocyclerProfile",
        }
    }
}

/// How a moveLiquid step maps sources to destinations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MoveLiquidPath {
    /// One source to one destination per pair (transfer)
    #[default]
    Single,
    /// Many sources into one destination (consolidate)
    MultiAspirate,
    /// One source into many destinations (distribute)
    MultiDispense,
}

impl fmt::Display for MoveLiquidPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => write!(f, "single"),
            Self::MultiAspirate => write!(f, "multiAspirate"),
            Self::MultiDispense => write!(f, "multiDispense"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveLiquidForm {
    pub pipette: String,
    pub volume: f64,

    #[serde(default)]
    pub path: MoveLiquidPath,

    #[serde(default)]
    pub change_tip: ChangeTip,

    pub aspirate_labware: String,
    pub aspirate_wells: Vec<String>,
    #[serde(default)]
    pub aspirate_pre_wet_tip: bool,
    #[serde(default)]
    pub aspirate_mix: Option<MixSettings>,
    #[serde(default)]
    pub aspirate_delay: Option<DelaySettings>,
    #[serde(default)]
    pub aspirate_touch_tip: bool,
    #[serde(default)]
    pub aspirate_touch_tip_mm_from_bottom: Option<f64>,
    #[serde(default)]
    pub aspirate_air_gap_volume: Option<f64>,
    #[serde(default)]
    pub aspirate_flow_rate: Option<f64>,
    #[serde(default)]
    pub aspirate_mm_from_bottom: Option<f64>,

    pub dispense_labware: String,
    pub dispense_wells: Vec<String>,
    #[serde(default)]
    pub dispense_mix: Option<MixSettings>,
    #[serde(default)]
    pub dispense_delay: Option<DelaySettings>,
    #[serde(default)]
    pub dispense_touch_tip: bool,
    #[serde(default)]
    pub dispense_touch_tip_mm_from_bottom: Option<f64>,
    #[serde(default)]
    pub dispense_flow_rate: Option<f64>,
    #[serde(default)]
    pub dispense_mm_from_bottom: Option<f64>,

    /// `source_well`, `dest_well`, or a labware id
    #[serde(default)]
    pub blowout_location: Option<String>,
    #[serde(default)]
    pub blowout_flow_rate: Option<f64>,
    #[serde(default)]
    pub blowout_offset_from_top_mm: f64,

    /// multiDispense only
    #[serde(default)]
    pub disposal_volume: Option<f64>,
    #[serde(default)]
    pub disposal_location: Option<String>,

    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixForm {
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
    pub touch_tip_mm_from_bottom: Option<f64>,
    #[serde(default)]
    pub aspirate_delay_seconds: Option<f64>,
    #[serde(default)]
    pub dispense_delay_seconds: Option<f64>,
    #[serde(default)]
    pub aspirate_flow_rate: Option<f64>,
    #[serde(default)]
    pub dispense_flow_rate: Option<f64>,
    #[serde(default)]
    pub mm_from_bottom: Option<f64>,
    #[serde(default)]
    pub blowout_location: Option<String>,
    #[serde(default)]
    pub blowout_flow_rate: Option<f64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// What ends a pause.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PauseAction {
    #[default]
    UntilResume,
    UntilTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PauseForm {
    #[serde(default)]
    pub pause_action: PauseAction,
    #[serde(default)]
    pub hours: f64,
    #[serde(default)]
    pub minutes: f64,
    #[serde(default)]
    pub seconds: f64,
    #[serde(default)]
    pub message: Option<String>,
}

/// Magnet step action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MagnetAction {
    Engage,
    Disengage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MagnetForm {
    pub module_id: String,
    pub magnet_action: MagnetAction,
    #[serde(default)]
    pub engage_height: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemperatureForm {
    pub module_id: String,
    /// false deactivates the module
    pub set_temperature: bool,
    #[serde(default)]
    pub target_temperature: Option<f64>,
    #[serde(default)]
    pub await_temperature: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThermocyclerStateForm {
    pub module_id: String,
    #[serde(default)]
    pub block_target_temp: Option<f64>,
    #[serde(default)]
    pub lid_target_temp: Option<f64>,
    #[serde(default)]
    pub lid_open: bool,
}

/// A profile entry: a single step, or a cycle of steps repeated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProfileItem {
    Cycle {
        repetitions: u32,
        steps: Vec<ProfileStep>,
    },
    Step(ProfileStep),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThermocyclerProfileForm {
    pub module_id: String,
    pub profile: Vec<ProfileItem>,
    pub profile_volume: f64,
    pub profile_target_lid_temp: f64,
    #[serde(default)]
    pub block_target_temp_hold: Option<f64>,
    #[serde(default)]
    pub lid_target_temp_hold: Option<f64>,
    #[serde(default)]
    pub lid_open_hold: bool,
}

// ============================================================================
// Generated output
// ============================================================================

/// Generated command lists for a whole protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedProtocol {
    /// Output schema version
    pub schema: String,

    /// Protocol name
    pub name: String,

    /// Generator version
    pub generator: String,

    /// BLAKE3 over every step fingerprint in order
    pub fingerprint: String,

    pub steps: Vec<GeneratedStep>,

    /// Set when a step failed; later steps were not generated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<GenerationError>,
}

/// One generated step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedStep {
    pub index: usize,

    /// Creator that produced the commands
    pub step_type: String,

    pub description: String,

    /// BLAKE3 of the serialized command list
    pub fingerprint: String,

    pub commands: Vec<Command>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<CommandCreatorWarning>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub form_warnings: Vec<FormWarning>,
}

/// The step that stopped generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationError {
    pub step_index: usize,
    pub errors: Vec<CommandCreatorError>,
}

// ============================================================================
// Plan
// ============================================================================

/// What regeneration does to a step relative to a previous output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanAction {
    Create,
    Update,
    Destroy,
    NoOp,
}

impl fmt::Display for PlanAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "CREATE"),
            Self::Update => write!(f, "UPDATE"),
            Self::Destroy => write!(f, "DESTROY"),
            Self::NoOp => write!(f, "NO-OP"),
        }
    }
}

/// A single planned step change.
#[derive(Debug, Clone)]
pub struct PlannedChange {
    pub step_index: usize,
    pub step_type: String,
    pub action: PlanAction,
    pub command_count: usize,
    pub description: String,
}

/// Step-by-step comparison of a fresh generation against a previous one.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub name: String,
    pub changes: Vec<PlannedChange>,

    /// Summary counts
    pub to_create: u32,
    pub to_update: u32,
    pub to_destroy: u32,
    pub unchanged: u32,
}
