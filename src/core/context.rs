//! SG-003: Invariant context: reference data that never changes during simulation.
//!
//! Pipette specs, labware definitions and module entities are built once per
//! protocol. Every creator reads them; nothing writes them.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Labware
// ============================================================================

/// Geometry and capacity of a single well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WellDefinition {
    /// Depth from top to bottom (mm)
    pub depth: f64,

    /// Maximum liquid the well holds (µL)
    pub total_liquid_volume: f64,
}

/// A labware definition (plate, reservoir, tiprack, trash).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabwareDefinition {
    /// Human-readable name
    pub display_name: String,

    /// Tipracks hold one tip per well
    #[serde(default)]
    pub is_tiprack: bool,

    /// Per-tip volume (tipracks only)
    #[serde(default)]
    pub tip_volume: Option<f64>,

    /// Well names grouped by column, top row first
    pub ordering: Vec<Vec<String>>,

    /// Per-well geometry
    pub wells: IndexMap<String, WellDefinition>,
}

impl LabwareDefinition {
    pub fn well(&self, name: &str) -> Option<&WellDefinition> {
        self.wells.get(name)
    }

    /// The first well in canonical order (A1 for every grid labware).
    pub fn first_well(&self) -> Option<&str> {
        self.ordering
            .iter()
            .flatten()
            .next()
            .map(String::as_str)
    }

    /// The column containing `well`.
    pub fn column_of(&self, well: &str) -> Option<&[String]> {
        self.ordering
            .iter()
            .find(|col| col.iter().any(|w| w == well))
            .map(Vec::as_slice)
    }

    /// Depth of `well`, or 0 if the well is unknown.
    pub fn well_depth(&self, well: &str) -> f64 {
        self.well(well).map(|w| w.depth).unwrap_or(0.0)
    }

    /// Per-labware touch-tip height: 1 mm below the top of the first well.
    pub fn default_touch_tip_offset(&self) -> f64 {
        let depth = self
            .first_well()
            .map(|w| self.well_depth(w))
            .unwrap_or(0.0);
        (depth - 1.0).max(0.0)
    }
}

/// A placed labware instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabwareEntity {
    pub id: String,
    pub labware_type: String,
}

// ============================================================================
// Pipettes
// ============================================================================

/// Physical pipette model spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipetteSpec {
    pub name: String,
    pub channels: u8,
    pub min_volume: f64,
    pub max_volume: f64,
    pub default_aspirate_flow_rate: f64,
    pub default_dispense_flow_rate: f64,
    pub default_blowout_flow_rate: f64,
}

/// A pipette mounted for this protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipetteEntity {
    pub id: String,
    pub spec: PipetteSpec,

    /// Tiprack model this pipette is restricted to, if any
    #[serde(default)]
    pub tiprack_model: Option<String>,
}

// ============================================================================
// Modules
// ============================================================================

/// Hardware module kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleType {
    #[serde(rename = "magneticModuleType")]
    Magnetic,
    #[serde(rename = "temperatureModuleType")]
    Temperature,
    #[serde(rename = "thermocyclerModuleType")]
    Thermocycler,
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Magnetic => write!(f, "magneticModuleType"),
            Self::Temperature => write!(f, "temperatureModuleType"),
            Self::Thermocycler => write!(f, "thermocyclerModuleType"),
        }
    }
}

/// A module placed on the deck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleEntity {
    pub id: String,
    pub module_type: ModuleType,
    pub model: String,
}

// ============================================================================
// Context
// ============================================================================

/// Immutable reference data for one protocol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvariantContext {
    /// Labware type → definition
    pub labware_definitions: IndexMap<String, LabwareDefinition>,

    /// Labware id → entity
    pub labware_entities: IndexMap<String, LabwareEntity>,

    /// Pipette id → entity
    pub pipette_entities: IndexMap<String, PipetteEntity>,

    /// Module id → entity
    pub module_entities: IndexMap<String, ModuleEntity>,
}

impl InvariantContext {
    pub fn pipette(&self, pipette_id: &str) -> Option<&PipetteEntity> {
        self.pipette_entities.get(pipette_id)
    }

    pub fn module(&self, module_id: &str) -> Option<&ModuleEntity> {
        self.module_entities.get(module_id)
    }

    pub fn has_labware(&self, labware_id: &str) -> bool {
        self.labware_entities.contains_key(labware_id)
    }

    /// Definition for a placed labware instance.
    pub fn labware_definition(&self, labware_id: &str) -> Option<&LabwareDefinition> {
        self.labware_entities
            .get(labware_id)
            .and_then(|entity| self.labware_definitions.get(&entity.labware_type))
    }

    /// Usable tip capacity for a pipette: the smaller of the pipette's maximum
    /// and its assigned tiprack's tip volume.
    pub fn pipette_tip_capacity(&self, pipette_id: &str) -> Option<f64> {
        let pipette = self.pipette(pipette_id)?;
        let tip_volume = pipette
            .tiprack_model
            .as_ref()
            .and_then(|model| self.labware_definitions.get(model))
            .and_then(|def| def.tip_volume);
        Some(match tip_volume {
            Some(tip) => tip.min(pipette.spec.max_volume),
            None => pipette.spec.max_volume,
        })
    }
}
