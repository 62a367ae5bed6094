//! SG-011: Form-level warning rules.
//!
//! Pure checks over hydrated form fields. Each rule returns at most one
//! warning; `compose_warnings` runs a list of rules and keeps what fired.

use super::context::{LabwareDefinition, PipetteSpec};
use super::types::MoveLiquidPath;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FormWarningType {
    BelowPipetteMinimumVolume,
    OverMaxWellVolume,
    BelowMinDisposalVolume,
}

impl fmt::Display for FormWarningType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BelowPipetteMinimumVolume => write!(f, "BELOW_PIPETTE_MINIMUM_VOLUME"),
            Self::OverMaxWellVolume => write!(f, "OVER_MAX_WELL_VOLUME"),
            Self::BelowMinDisposalVolume => write!(f, "BELOW_MIN_DISPOSAL_VOLUME"),
        }
    }
}

/// A non-blocking problem with a step's form values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormWarning {
    #[serde(rename = "type")]
    pub warning_type: FormWarningType,
    pub title: String,
    /// Form fields whose values trigger the warning
    pub dependent_fields: Vec<String>,
}

impl FormWarning {
    fn new(warning_type: FormWarningType) -> Self {
        let (title, fields): (&str, &[&str]) = match warning_type {
            FormWarningType::BelowPipetteMinimumVolume => (
                "Specified volume is below pipette minimum",
                &["pipette", "volume"],
            ),
            FormWarningType::OverMaxWellVolume => (
                "Dispense volume will overflow a destination well",
                &["dispense_labware", "dispense_wells", "volume"],
            ),
            FormWarningType::BelowMinDisposalVolume => (
                "Below recommended disposal volume",
                &["disposal_volume", "pipette"],
            ),
        };
        Self {
            warning_type,
            title: title.to_string(),
            dependent_fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }
}

impl fmt::Display for FormWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.warning_type, self.title)
    }
}

/// Form fields after ids are resolved to their definitions.
#[derive(Debug, Clone, Default)]
pub struct HydratedFields<'a> {
    pub pipette: Option<&'a PipetteSpec>,
    pub volume: Option<f64>,
    pub dispense_labware: Option<&'a LabwareDefinition>,
    pub dispense_wells: &'a [String],
    pub disposal_volume: Option<f64>,
}

pub type WarningChecker = fn(&HydratedFields) -> Option<FormWarning>;

pub fn below_pipette_minimum_volume(fields: &HydratedFields) -> Option<FormWarning> {
    let spec = fields.pipette?;
    let volume = fields.volume?;
    (volume < spec.min_volume)
        .then(|| FormWarning::new(FormWarningType::BelowPipetteMinimumVolume))
}

pub fn max_dispense_well_volume(fields: &HydratedFields) -> Option<FormWarning> {
    let labware = fields.dispense_labware?;
    let volume = fields.volume?;
    let exceeded = fields.dispense_wells.iter().any(|well| {
        labware
            .well(well)
            .map(|w| volume > w.total_liquid_volume)
            .unwrap_or(false)
    });
    exceeded.then(|| FormWarning::new(FormWarningType::OverMaxWellVolume))
}

/// A missing or zero disposal volume counts as below the minimum.
pub fn min_disposal_volume(fields: &HydratedFields) -> Option<FormWarning> {
    let spec = fields.pipette?;
    let below = match fields.disposal_volume {
        None => true,
        Some(v) if v <= 0.0 => true,
        Some(v) => v < spec.min_volume,
    };
    below.then(|| FormWarning::new(FormWarningType::BelowMinDisposalVolume))
}

/// Run every checker in order and collect the warnings that fired.
pub fn compose_warnings(checkers: &[WarningChecker], fields: &HydratedFields) -> Vec<FormWarning> {
    checkers.iter().filter_map(|check| check(fields)).collect()
}

/// Rules for a moveLiquid step. The disposal rule only applies to multi-dispense.
pub fn move_liquid_warnings(path: MoveLiquidPath, fields: &HydratedFields) -> Vec<FormWarning> {
    let mut checkers: Vec<WarningChecker> =
        vec![below_pipette_minimum_volume, max_dispense_well_volume];
    if path == MoveLiquidPath::MultiDispense {
        checkers.push(min_disposal_volume);
    }
    compose_warnings(&checkers, fields)
}

/// Rules for a mix step.
pub fn mix_warnings(fields: &HydratedFields) -> Vec<FormWarning> {
    compose_warnings(&[below_pipette_minimum_volume], fields)
}
