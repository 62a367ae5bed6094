//! SG-005: Robot state, the snapshot threaded through every command creator.
//!
//! A `RobotState` is never mutated in place by a creator. Maps are held behind
//! `Arc` so cloning a state is a handful of refcount bumps, and updating one
//! tiprack (or one labware's liquid) copies only that entry.

use super::context::{InvariantContext, ModuleType};
use super::definitions::{FIXED_TRASH_ID, FIXED_TRASH_SLOT, FIXED_TRASH_TYPE};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Volumes below this are treated as empty.
pub const VOLUME_EPSILON: f64 = 1e-6;

/// Pipette mount side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mount {
    Left,
    Right,
}

impl fmt::Display for Mount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => write!(f, "left"),
            Self::Right => write!(f, "right"),
        }
    }
}

/// Per-pipette physical state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipetteState {
    pub mount: Mount,
    pub channels: u8,
    pub max_volume: f64,
    #[serde(default)]
    pub tiprack_model: Option<String>,
}

/// Where a labware sits. `slot` is a deck slot ("1".."12") or a module id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabwareState {
    pub labware_type: String,
    pub slot: String,
}

/// Temperature module status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemperatureStatus {
    Deactivated,
    ApproachingTarget,
    AtTarget,
}

/// Module-specific state, tagged by module type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ModuleState {
    #[serde(rename = "magneticModuleType")]
    Magnetic {
        engaged: bool,
        #[serde(default)]
        engage_height: Option<f64>,
    },
    #[serde(rename = "temperatureModuleType")]
    Temperature {
        status: TemperatureStatus,
        #[serde(default)]
        target_temperature: Option<f64>,
    },
    #[serde(rename = "thermocyclerModuleType")]
    Thermocycler {
        #[serde(default)]
        block_target_temp: Option<f64>,
        #[serde(default)]
        lid_target_temp: Option<f64>,
        /// None means unknown; only `Some(true)` counts as open
        #[serde(default)]
        lid_open: Option<bool>,
    },
}

impl ModuleState {
    /// State of a freshly powered module.
    pub fn initial(module_type: ModuleType) -> Self {
        match module_type {
            ModuleType::Magnetic => Self::Magnetic {
                engaged: false,
                engage_height: None,
            },
            ModuleType::Temperature => Self::Temperature {
                status: TemperatureStatus::Deactivated,
                target_temperature: None,
            },
            ModuleType::Thermocycler => Self::Thermocycler {
                block_target_temp: None,
                lid_target_temp: None,
                lid_open: None,
            },
        }
    }

    pub fn module_type(&self) -> ModuleType {
        match self {
            Self::Magnetic { .. } => ModuleType::Magnetic,
            Self::Temperature { .. } => ModuleType::Temperature,
            Self::Thermocycler { .. } => ModuleType::Thermocycler,
        }
    }
}

/// A module on the deck.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleRobotState {
    pub slot: String,
    pub module_state: ModuleState,
}

/// Whether a pipette carries a tip, and how much that tip holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipetteTipState {
    pub has_tip: bool,
    #[serde(default)]
    pub tip_max_volume: Option<f64>,
}

/// Well name → has tip.
pub type WellTips = IndexMap<String, bool>;

/// Tip presence for every tiprack and pipette.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TipState {
    pub tipracks: Arc<IndexMap<String, Arc<WellTips>>>,
    pub pipettes: Arc<IndexMap<String, PipetteTipState>>,
}

/// Ingredient group → volume (µL).
pub type Contents = IndexMap<String, f64>;

/// Well name → contents.
pub type LabwareContents = IndexMap<String, Contents>;

/// Tracked liquid: per well, and per pipette channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiquidState {
    pub labware: Arc<IndexMap<String, Arc<LabwareContents>>>,
    pub pipettes: Arc<IndexMap<String, Contents>>,
}

/// Total volume of a contents map.
pub fn total_volume(contents: &Contents) -> f64 {
    contents.values().sum()
}

/// Full simulated robot state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RobotState {
    pub pipettes: Arc<IndexMap<String, PipetteState>>,
    pub labware: Arc<IndexMap<String, LabwareState>>,
    pub modules: Arc<IndexMap<String, ModuleRobotState>>,

    /// Tiprack id → pipette id
    #[serde(default)]
    pub tiprack_assignment: Arc<IndexMap<String, String>>,

    pub tip_state: TipState,

    /// None when the protocol does not track liquid
    #[serde(default)]
    pub liquid_state: Option<LiquidState>,
}

/// Declared placements used to build an initial state.
#[derive(Debug, Clone, Default)]
pub struct DeckSetup {
    /// Labware id → slot
    pub labware_slots: IndexMap<String, String>,
    /// Pipette id → mount
    pub pipette_mounts: IndexMap<String, Mount>,
    /// Module id → slot
    pub module_slots: IndexMap<String, String>,
    /// Tiprack id → pipette id
    pub tiprack_assignment: IndexMap<String, String>,
    /// Labware id → well → ingredient group → volume; None disables tracking
    pub liquids: Option<IndexMap<String, LabwareContents>>,
}

impl RobotState {
    /// Build the state at the start of a protocol: every tiprack full, no
    /// pipette holding a tip, every module in its powered-on state. The fixed
    /// trash is added when the setup does not place it.
    pub fn initial(ctx: &InvariantContext, setup: &DeckSetup) -> Self {
        let pipettes: IndexMap<String, PipetteState> = setup
            .pipette_mounts
            .iter()
            .filter_map(|(id, mount)| {
                ctx.pipette(id).map(|entity| {
                    (
                        id.clone(),
                        PipetteState {
                            mount: *mount,
                            channels: entity.spec.channels,
                            max_volume: entity.spec.max_volume,
                            tiprack_model: entity.tiprack_model.clone(),
                        },
                    )
                })
            })
            .collect();

        let mut labware: IndexMap<String, LabwareState> = setup
            .labware_slots
            .iter()
            .filter_map(|(id, slot)| {
                ctx.labware_entities.get(id).map(|entity| {
                    (
                        id.clone(),
                        LabwareState {
                            labware_type: entity.labware_type.clone(),
                            slot: slot.clone(),
                        },
                    )
                })
            })
            .collect();
        if !labware.contains_key(FIXED_TRASH_ID) {
            labware.insert(
                FIXED_TRASH_ID.to_string(),
                LabwareState {
                    labware_type: FIXED_TRASH_TYPE.to_string(),
                    slot: FIXED_TRASH_SLOT.to_string(),
                },
            );
        }

        let modules: IndexMap<String, ModuleRobotState> = setup
            .module_slots
            .iter()
            .filter_map(|(id, slot)| {
                ctx.module(id).map(|entity| {
                    (
                        id.clone(),
                        ModuleRobotState {
                            slot: slot.clone(),
                            module_state: ModuleState::initial(entity.module_type),
                        },
                    )
                })
            })
            .collect();

        let tipracks: IndexMap<String, Arc<WellTips>> = labware
            .iter()
            .filter_map(|(id, lw)| {
                let def = ctx.labware_definitions.get(&lw.labware_type)?;
                if !def.is_tiprack {
                    return None;
                }
                let wells: WellTips = def.wells.keys().map(|w| (w.clone(), true)).collect();
                Some((id.clone(), Arc::new(wells)))
            })
            .collect();

        let tip_pipettes: IndexMap<String, PipetteTipState> = pipettes
            .keys()
            .map(|id| (id.clone(), PipetteTipState::default()))
            .collect();

        let liquid_state = setup.liquids.as_ref().map(|liquids| LiquidState {
            labware: Arc::new(
                liquids
                    .iter()
                    .map(|(id, wells)| (id.clone(), Arc::new(wells.clone())))
                    .collect(),
            ),
            pipettes: Arc::new(IndexMap::new()),
        });

        Self {
            pipettes: Arc::new(pipettes),
            labware: Arc::new(labware),
            modules: Arc::new(modules),
            tiprack_assignment: Arc::new(setup.tiprack_assignment.clone()),
            tip_state: TipState {
                tipracks: Arc::new(tipracks),
                pipettes: Arc::new(tip_pipettes),
            },
            liquid_state,
        }
    }

    pub fn pipette_has_tip(&self, pipette_id: &str) -> bool {
        self.tip_state
            .pipettes
            .get(pipette_id)
            .map(|t| t.has_tip)
            .unwrap_or(false)
    }

    /// Whether a tiprack well still holds a tip.
    pub fn tiprack_well_has_tip(&self, tiprack_id: &str, well: &str) -> bool {
        self.tip_state
            .tipracks
            .get(tiprack_id)
            .and_then(|wells| wells.get(well).copied())
            .unwrap_or(false)
    }

    /// Tracked contents of a well; None when untracked or empty.
    pub fn well_contents(&self, labware_id: &str, well: &str) -> Option<&Contents> {
        self.liquid_state
            .as_ref()?
            .labware
            .get(labware_id)?
            .get(well)
            .filter(|c| total_volume(c) > VOLUME_EPSILON)
    }

    /// Tracked contents of a pipette channel.
    pub fn pipette_contents(&self, pipette_id: &str) -> Option<&Contents> {
        self.liquid_state.as_ref()?.pipettes.get(pipette_id)
    }

    /// The module a labware sits on, if its slot names a module.
    pub fn module_under_labware(&self, labware_id: &str) -> Option<&ModuleRobotState> {
        let slot = &self.labware.get(labware_id)?.slot;
        self.modules.get(slot)
    }
}
