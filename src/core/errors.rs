//! SG-009: Error and warning constructors.
//!
//! Every creator builds its errors through these so messages stay uniform.

use super::command::{CommandCreatorError, CommandCreatorWarning, ErrorType, WarningType};
use super::context::ModuleType;

fn error(error_type: ErrorType, message: String) -> CommandCreatorError {
    CommandCreatorError {
        error_type,
        message,
    }
}

fn warning(warning_type: WarningType, message: String) -> CommandCreatorWarning {
    CommandCreatorWarning {
        warning_type,
        message,
    }
}

pub fn no_tip_on_pipette(pipette_id: &str, action: &str) -> CommandCreatorError {
    error(
        ErrorType::NoTipOnPipette,
        format!("attempted to {} with no tip on pipette '{}'", action, pipette_id),
    )
}

pub fn tip_already_on_pipette(pipette_id: &str) -> CommandCreatorError {
    error(
        ErrorType::TipAlreadyOnPipette,
        format!("pipette '{}' already has a tip", pipette_id),
    )
}

pub fn no_tip_in_tiprack_well(tiprack_id: &str, well: &str) -> CommandCreatorError {
    error(
        ErrorType::NoTipInTiprackWell,
        format!("no tip in well {} of tiprack '{}'", well, tiprack_id),
    )
}

pub fn pipette_does_not_exist(pipette_id: &str) -> CommandCreatorError {
    error(
        ErrorType::PipetteDoesNotExist,
        format!("pipette '{}' does not exist", pipette_id),
    )
}

pub fn labware_does_not_exist(labware_id: &str) -> CommandCreatorError {
    error(
        ErrorType::LabwareDoesNotExist,
        format!("labware '{}' does not exist", labware_id),
    )
}

pub fn well_does_not_exist(labware_id: &str, well: &str) -> CommandCreatorError {
    error(
        ErrorType::WellDoesNotExist,
        format!("well {} does not exist in labware '{}'", well, labware_id),
    )
}

pub fn module_does_not_exist(module_id: &str) -> CommandCreatorError {
    error(
        ErrorType::ModuleDoesNotExist,
        format!("module '{}' does not exist", module_id),
    )
}

pub fn module_type_mismatch(
    module_id: &str,
    expected: ModuleType,
    actual: ModuleType,
) -> CommandCreatorError {
    error(
        ErrorType::ModuleTypeMismatch,
        format!(
            "module '{}' is a {}, expected a {}",
            module_id, actual, expected
        ),
    )
}

pub fn insufficient_tips(pipette_id: &str) -> CommandCreatorError {
    error(
        ErrorType::InsufficientTips,
        format!("not enough tips left for pipette '{}'", pipette_id),
    )
}

pub fn invalid_volume(action: &str, volume: f64) -> CommandCreatorError {
    error(
        ErrorType::InvalidVolume,
        format!("cannot {} a volume of {} µL", action, volume),
    )
}

pub fn pipette_volume_exceeded(action: &str, volume: f64, max_volume: f64) -> CommandCreatorError {
    error(
        ErrorType::PipetteVolumeExceeded,
        format!(
            "attempted to {} {} µL, more than the tip can hold ({} µL)",
            action, volume, max_volume
        ),
    )
}

pub fn thermocycler_lid_closed(labware_id: &str) -> CommandCreatorError {
    error(
        ErrorType::ThermocyclerLidClosed,
        format!(
            "labware '{}' is in a thermocycler whose lid is not open",
            labware_id
        ),
    )
}

pub fn invalid_args(message: impl Into<String>) -> CommandCreatorError {
    error(ErrorType::InvalidArgs, message.into())
}

pub fn aspirate_from_pristine_well(labware_id: &str, well: &str) -> CommandCreatorWarning {
    warning(
        WarningType::AspirateFromPristineWell,
        format!(
            "aspirating from well {} of '{}', which has no tracked liquid",
            well, labware_id
        ),
    )
}

pub fn aspirate_more_than_well_contents(
    labware_id: &str,
    well: &str,
    volume: f64,
    available: f64,
) -> CommandCreatorWarning {
    warning(
        WarningType::AspirateMoreThanWellContents,
        format!(
            "aspirating {} µL from well {} of '{}', which holds {} µL",
            volume, well, labware_id, available
        ),
    )
}

pub fn over_max_well_volume(
    labware_id: &str,
    well: &str,
    volume: f64,
    capacity: f64,
) -> CommandCreatorWarning {
    warning(
        WarningType::OverMaxWellVolume,
        format!(
            "well {} of '{}' would hold {} µL, over its {} µL capacity",
            well, labware_id, volume, capacity
        ),
    )
}
