//! SG-001: Atomic command records and command-creator results.
//!
//! Commands serialize as `{"command": "<name>", "params": {...}}` with camelCase
//! param names. This is the boundary format handed to the protocol-file
//! serializer, so field names and nesting must not drift.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Command params
// ============================================================================

/// Params shared by aspirate, dispense, airGap and dispenseAirGap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AspDispAirgapParams {
    pub pipette: String,
    pub volume: f64,
    pub labware: String,
    pub well: String,
    pub offset_from_bottom_mm: f64,
    pub flow_rate: f64,
}

/// Blowout params.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlowoutParams {
    pub pipette: String,
    pub labware: String,
    pub well: String,
    pub flow_rate: f64,
    pub offset_from_bottom_mm: f64,
}

/// Touch-tip params.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TouchTipParams {
    pub pipette: String,
    pub labware: String,
    pub well: String,
    pub offset_from_bottom_mm: f64,
}

/// Params for pickUpTip and dropTip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipetteAccessParams {
    pub pipette: String,
    pub labware: String,
    pub well: String,
}

/// XYZ offset in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Offset {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// moveToWell params. `offset.z` is measured from the well bottom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveToWellParams {
    pub pipette: String,
    pub labware: String,
    pub well: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<Offset>,
}

/// How long a delay lasts: a number of seconds, or `true` for "until resumed".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Wait {
    Seconds(f64),
    UntilResume(bool),
}

/// Delay params.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayParams {
    pub wait: Wait,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Params for module commands that name only the module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleOnlyParams {
    pub module: String,
}

/// magneticModule/engageMagnet params.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngageMagnetParams {
    pub module: String,
    pub engage_height: f64,
}

/// Params for set/await temperature commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureParams {
    pub module: String,
    pub temperature: f64,
}

/// thermocycler/setTargetBlockTemperature params.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockTemperatureParams {
    pub module: String,
    pub temperature: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

/// One thermocycler profile cycle entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileStep {
    pub temperature: f64,
    #[serde(alias = "hold_time")]
    pub hold_time: f64,
}

/// thermocycler/runProfile params.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunProfileParams {
    pub module: String,
    pub profile: Vec<ProfileStep>,
    pub volume: f64,
}

// ============================================================================
// Commands
// ============================================================================

/// One indivisible hardware action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "params")]
pub enum Command {
    #[serde(rename = "aspirate")]
    Aspirate(AspDispAirgapParams),
    #[serde(rename = "dispense")]
    Dispense(AspDispAirgapParams),
    #[serde(rename = "airGap")]
    AirGap(AspDispAirgapParams),
    #[serde(rename = "dispenseAirGap")]
    DispenseAirGap(AspDispAirgapParams),
    #[serde(rename = "blowout")]
    Blowout(BlowoutParams),
    #[serde(rename = "touchTip")]
    TouchTip(TouchTipParams),
    #[serde(rename = "pickUpTip")]
    PickUpTip(PipetteAccessParams),
    #[serde(rename = "dropTip")]
    DropTip(PipetteAccessParams),
    #[serde(rename = "moveToWell")]
    MoveToWell(MoveToWellParams),
    #[serde(rename = "delay")]
    Delay(DelayParams),
    #[serde(rename = "magneticModule/engageMagnet")]
    EngageMagnet(EngageMagnetParams),
    #[serde(rename = "magneticModule/disengageMagnet")]
    DisengageMagnet(ModuleOnlyParams),
    #[serde(rename = "temperatureModule/setTargetTemperature")]
    SetTargetTemperature(TemperatureParams),
    #[serde(rename = "temperatureModule/awaitTemperature")]
    AwaitTemperature(TemperatureParams),
    #[serde(rename = "temperatureModule/deactivate")]
    DeactivateTemperature(ModuleOnlyParams),
    #[serde(rename = "thermocycler/setTargetBlockTemperature")]
    SetTargetBlockTemperature(BlockTemperatureParams),
    #[serde(rename = "thermocycler/setTargetLidTemperature")]
    SetTargetLidTemperature(TemperatureParams),
    #[serde(rename = "thermocycler/awaitBlockTemperature")]
    AwaitBlockTemperature(TemperatureParams),
    #[serde(rename = "thermocycler/awaitLidTemperature")]
    AwaitLidTemperature(TemperatureParams),
    #[serde(rename = "thermocycler/openLid")]
    OpenLid(ModuleOnlyParams),
    #[serde(rename = "thermocycler/closeLid")]
    CloseLid(ModuleOnlyParams),
    #[serde(rename = "thermocycler/deactivateBlock")]
    DeactivateBlock(ModuleOnlyParams),
    #[serde(rename = "thermocycler/deactivateLid")]
    DeactivateLid(ModuleOnlyParams),
    #[serde(rename = "thermocycler/runProfile")]
    RunProfile(RunProfileParams),
    #[serde(rename = "thermocycler/awaitProfileComplete")]
    AwaitProfileComplete(ModuleOnlyParams),
}

impl Command {
    /// Wire name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Aspirate(_) => "aspirate",
            Self::Dispense(_) => "dispense",
            Self::AirGap(_) => "airGap",
            Self::DispenseAirGap(_) => "dispenseAirGap",
            Self::Blowout(_) => "blowout",
            Self::TouchTip(_) => "touchTip",
            Self::PickUpTip(_) => "pickUpTip",
            Self::DropTip(_) => "dropTip",
            Self::MoveToWell(_) => "moveToWell",
            Self::Delay(_) => "delay",
            Self::EngageMagnet(_) => "magneticModule/engageMagnet",
            Self::DisengageMagnet(_) => "magneticModule/disengageMagnet",
            Self::SetTargetTemperature(_) => "temperatureModule/setTargetTemperature",
            Self::AwaitTemperature(_) => "temperatureModule/awaitTemperature",
            Self::DeactivateTemperature(_) => "temperatureModule/deactivate",
            Self::SetTargetBlockTemperature(_) => "thermocycler/setTargetBlockTemperature",
            Self::SetTargetLidTemperature(_) => "thermocycler/setTargetLidTemperature",
            Self::AwaitBlockTemperature(_) => "thermocycler/awaitBlockTemperature",
            Self::AwaitLidTemperature(_) => "thermocycler/awaitLidTemperature",
            Self::OpenLid(_) => "thermocycler/openLid",
            Self::CloseLid(_) => "thermocycler/closeLid",
            Self::DeactivateBlock(_) => "thermocycler/deactivateBlock",
            Self::DeactivateLid(_) => "thermocycler/deactivateLid",
            Self::RunProfile(_) => "thermocycler/runProfile",
            Self::AwaitProfileComplete(_) => "thermocycler/awaitProfileComplete",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================================
// Errors and warnings
// ============================================================================

/// Fatal command-creator error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorType {
    NoTipOnPipette,
    TipAlreadyOnPipette,
    NoTipInTiprackWell,
    PipetteDoesNotExist,
    LabwareDoesNotExist,
    WellDoesNotExist,
    ModuleDoesNotExist,
    ModuleTypeMismatch,
    InsufficientTips,
    InvalidVolume,
    PipetteVolumeExceeded,
    ThermocyclerLidClosed,
    InvalidArgs,
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NoTipOnPipette => "NO_TIP_ON_PIPETTE",
            Self::TipAlreadyOnPipette => "TIP_ALREADY_ON_PIPETTE",
            Self::NoTipInTiprackWell => "NO_TIP_IN_TIPRACK_WELL",
            Self::PipetteDoesNotExist => "PIPETTE_DOES_NOT_EXIST",
            Self::LabwareDoesNotExist => "LABWARE_DOES_NOT_EXIST",
            Self::WellDoesNotExist => "WELL_DOES_NOT_EXIST",
            Self::ModuleDoesNotExist => "MODULE_DOES_NOT_EXIST",
            Self::ModuleTypeMismatch => "MODULE_TYPE_MISMATCH",
            Self::InsufficientTips => "INSUFFICIENT_TIPS",
            Self::InvalidVolume => "INVALID_VOLUME",
            Self::PipetteVolumeExceeded => "PIPETTE_VOLUME_EXCEEDED",
            Self::ThermocyclerLidClosed => "THERMOCYCLER_LID_CLOSED",
            Self::InvalidArgs => "INVALID_ARGS",
        };
        write!(f, "{}", s)
    }
}

/// A fatal error: the step that produced it is not added to the timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandCreatorError {
    #[serde(rename = "type")]
    pub error_type: ErrorType,
    pub message: String,
}

impl fmt::Display for CommandCreatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type, self.message)
    }
}

/// Non-fatal warning kinds attached to a still-valid command list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningType {
    AspirateFromPristineWell,
    AspirateMoreThanWellContents,
    OverMaxWellVolume,
}

impl fmt::Display for WarningType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AspirateFromPristineWell => "ASPIRATE_FROM_PRISTINE_WELL",
            Self::AspirateMoreThanWellContents => "ASPIRATE_MORE_THAN_WELL_CONTENTS",
            Self::OverMaxWellVolume => "OVER_MAX_WELL_VOLUME",
        };
        write!(f, "{}", s)
    }
}

/// A non-fatal warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandCreatorWarning {
    #[serde(rename = "type")]
    pub warning_type: WarningType,
    pub message: String,
}

impl fmt::Display for CommandCreatorWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.warning_type, self.message)
    }
}

// ============================================================================
// Results
// ============================================================================

/// Successful command-creator output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandsAndWarnings {
    pub commands: Vec<Command>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<CommandCreatorWarning>,
}

impl CommandsAndWarnings {
    /// A result holding exactly one command and no warnings.
    pub fn single(command: Command) -> Self {
        Self {
            commands: vec![command],
            warnings: Vec::new(),
        }
    }
}

/// Failed command-creator output.
///
/// `prior_commands` holds what the composition layer had already produced for
/// the step before the failing creator ran. It is diagnostic only and must
/// never be sent on as the step's command list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandCreatorFailure {
    pub errors: Vec<CommandCreatorError>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prior_commands: Vec<Command>,
}

impl CommandCreatorFailure {
    pub fn new(errors: Vec<CommandCreatorError>) -> Self {
        Self {
            errors,
            prior_commands: Vec::new(),
        }
    }
}

impl From<CommandCreatorError> for CommandCreatorFailure {
    fn from(error: CommandCreatorError) -> Self {
        Self::new(vec![error])
    }
}

/// What every command creator returns.
pub type CommandCreatorResult = Result<CommandsAndWarnings, CommandCreatorFailure>;
