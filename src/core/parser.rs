//! SG-013: Protocol YAML parsing, validation and deck loading.
//!
//! Parses protocol.yaml and validates structural constraints:
//! - Version must be "1.0"
//! - Pipette models and labware types must be known
//! - Slots must exist and hold at most one item
//! - Every id a step, assignment or liquid names must be declared

use super::context::{
    InvariantContext, LabwareDefinition, LabwareEntity, ModuleEntity, ModuleType, PipetteEntity,
};
use super::definitions::{
    builtin_labware_definition, builtin_pipette_spec, DECK_SLOTS, FIXED_TRASH_ID,
    FIXED_TRASH_SLOT, FIXED_TRASH_TYPE,
};
use super::state::{DeckSetup, RobotState};
use super::types::*;
use indexmap::IndexMap;
use std::path::Path;

/// Validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

fn err(errors: &mut Vec<ValidationError>, message: String) {
    errors.push(ValidationError { message });
}

/// Parse a protocol.yaml file from disk.
pub fn parse_protocol_file(path: &Path) -> Result<ProtocolFile, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    parse_protocol(&content)
}

/// Parse a protocol.yaml from a string.
pub fn parse_protocol(yaml: &str) -> Result<ProtocolFile, String> {
    serde_yaml_ng::from_str(yaml).map_err(|e| format!("YAML parse error: {}", e))
}

/// Resolve a labware type against custom then built-in definitions.
pub fn resolve_labware_definition(file: &ProtocolFile, labware_type: &str) -> Option<LabwareDefinition> {
    file.labware_definitions
        .get(labware_type)
        .cloned()
        .or_else(|| builtin_labware_definition(labware_type))
}

/// Validate a parsed protocol. Returns a list of errors (empty = valid).
pub fn validate_protocol(file: &ProtocolFile) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if file.version != "1.0" {
        err(
            &mut errors,
            format!("version must be \"1.0\", got \"{}\"", file.version),
        );
    }
    if file.name.is_empty() {
        err(&mut errors, "name must not be empty".to_string());
    }

    validate_pipettes(file, &mut errors);
    validate_deck(file, &mut errors);
    validate_assignments(file, &mut errors);
    validate_liquids(file, &mut errors);
    for (index, step) in file.steps.iter().enumerate() {
        validate_step(file, index, step, &mut errors);
    }

    errors
}

fn validate_pipettes(file: &ProtocolFile, errors: &mut Vec<ValidationError>) {
    let mut mounts = IndexMap::new();
    for (id, pipette) in &file.pipettes {
        if builtin_pipette_spec(&pipette.name).is_none() {
            err(errors, format!("pipette '{}' has unknown model '{}'", id, pipette.name));
        }
        if let Some(other) = mounts.insert(pipette.mount, id) {
            err(
                errors,
                format!(
                    "pipettes '{}' and '{}' share the {} mount",
                    other, id, pipette.mount
                ),
            );
        }
        if let Some(model) = &pipette.tiprack_model {
            match resolve_labware_definition(file, model) {
                Some(def) if def.is_tiprack => {}
                Some(_) => err(
                    errors,
                    format!("pipette '{}' tiprack model '{}' is not a tiprack", id, model),
                ),
                None => err(
                    errors,
                    format!("pipette '{}' has unknown tiprack model '{}'", id, model),
                ),
            }
        }
    }
}

fn deck_slot_ok(slot: u32) -> bool {
    (1..=DECK_SLOTS).contains(&slot)
}

fn validate_deck(file: &ProtocolFile, errors: &mut Vec<ValidationError>) {
    // slot → occupant id
    let mut occupied: IndexMap<String, String> = IndexMap::new();
    let mut claim = |slot: String, id: &str, errors: &mut Vec<ValidationError>| {
        if let Some(other) = occupied.insert(slot.clone(), id.to_string()) {
            err(
                errors,
                format!("'{}' and '{}' both occupy slot {}", other, id, slot),
            );
        }
    };

    for (id, module) in &file.modules {
        match module.slot.deck_number() {
            Some(n) if deck_slot_ok(n) => claim(n.to_string(), id, errors),
            _ => err(
                errors,
                format!("module '{}' has invalid slot '{}'", id, module.slot),
            ),
        }
    }

    for (id, labware) in &file.labware {
        if resolve_labware_definition(file, &labware.labware_type).is_none() {
            err(
                errors,
                format!("labware '{}' has unknown type '{}'", id, labware.labware_type),
            );
        }
        match (&labware.slot, labware.slot.deck_number()) {
            (_, Some(n)) if deck_slot_ok(n) => {
                if n.to_string() == FIXED_TRASH_SLOT && id != FIXED_TRASH_ID {
                    err(
                        errors,
                        format!(
                            "labware '{}' uses slot {}, reserved for the fixed trash",
                            id, FIXED_TRASH_SLOT
                        ),
                    );
                }
                claim(n.to_string(), id, errors);
            }
            (SlotRef::Named(module_id), None) if file.modules.contains_key(module_id) => {
                claim(format!("module:{}", module_id), id, errors);
            }
            _ => err(
                errors,
                format!("labware '{}' has invalid slot '{}'", id, labware.slot),
            ),
        }
    }
}

fn validate_assignments(file: &ProtocolFile, errors: &mut Vec<ValidationError>) {
    for (tiprack, pipette) in &file.tiprack_assignment {
        match file.labware.get(tiprack) {
            None => err(
                errors,
                format!("tiprack assignment names unknown labware '{}'", tiprack),
            ),
            Some(decl) => {
                let is_rack = resolve_labware_definition(file, &decl.labware_type)
                    .map(|d| d.is_tiprack)
                    .unwrap_or(false);
                if !is_rack {
                    err(
                        errors,
                        format!("tiprack assignment names '{}', which is not a tiprack", tiprack),
                    );
                }
            }
        }
        if !file.pipettes.contains_key(pipette) {
            err(
                errors,
                format!("tiprack '{}' assigned to unknown pipette '{}'", tiprack, pipette),
            );
        }
    }
}

fn validate_liquids(file: &ProtocolFile, errors: &mut Vec<ValidationError>) {
    let Some(liquids) = &file.liquids else {
        return;
    };
    for (labware_id, wells) in liquids {
        let Some(def) = labware_def(file, labware_id) else {
            err(errors, format!("liquids name unknown labware '{}'", labware_id));
            continue;
        };
        for (well, contents) in wells {
            if def.well(well).is_none() {
                err(
                    errors,
                    format!("liquids name unknown well '{}' in '{}'", well, labware_id),
                );
            }
            if contents.values().any(|v| *v < 0.0 || !v.is_finite()) {
                err(
                    errors,
                    format!("liquid volume in '{}' {} must be non-negative", labware_id, well),
                );
            }
        }
    }
}

fn labware_def(file: &ProtocolFile, labware_id: &str) -> Option<LabwareDefinition> {
    file.labware
        .get(labware_id)
        .and_then(|decl| resolve_labware_definition(file, &decl.labware_type))
}

fn check_pipette(file: &ProtocolFile, step: usize, pipette: &str, errors: &mut Vec<ValidationError>) {
    if !file.pipettes.contains_key(pipette) {
        err(
            errors,
            format!("step {} references unknown pipette '{}'", step + 1, pipette),
        );
    }
}

fn check_wells(
    file: &ProtocolFile,
    step: usize,
    labware_id: &str,
    wells: &[String],
    errors: &mut Vec<ValidationError>,
) {
    let Some(def) = labware_def(file, labware_id) else {
        err(
            errors,
            format!("step {} references unknown labware '{}'", step + 1, labware_id),
        );
        return;
    };
    if wells.is_empty() {
        err(
            errors,
            format!("step {} selects no wells in '{}'", step + 1, labware_id),
        );
    }
    for well in wells {
        if def.well(well).is_none() {
            err(
                errors,
                format!(
                    "step {} references unknown well '{}' in '{}'",
                    step + 1,
                    well,
                    labware_id
                ),
            );
        }
    }
}

fn check_module(
    file: &ProtocolFile,
    step: usize,
    module_id: &str,
    expected: ModuleType,
    errors: &mut Vec<ValidationError>,
) {
    match file.modules.get(module_id) {
        None => err(
            errors,
            format!("step {} references unknown module '{}'", step + 1, module_id),
        ),
        Some(m) if m.module_type != expected => err(
            errors,
            format!(
                "step {} needs a {} but '{}' is a {}",
                step + 1,
                expected,
                module_id,
                m.module_type
            ),
        ),
        Some(_) => {}
    }
}

fn check_volume(i: usize, field: &str, volume: f64, errors: &mut Vec<ValidationError>) {
    if !volume.is_finite() || volume <= 0.0 {
        err(
            errors,
            format!("step {} {} must be a positive finite number, got {}", i + 1, field, volume),
        );
    }
}

fn validate_step(file: &ProtocolFile, i: usize, step: &StepForm, errors: &mut Vec<ValidationError>) {
    match step {
        StepForm::MoveLiquid(form) => {
            check_pipette(file, i, &form.pipette, errors);
            check_wells(file, i, &form.aspirate_labware, &form.aspirate_wells, errors);
            check_wells(file, i, &form.dispense_labware, &form.dispense_wells, errors);
            check_volume(i, "volume", form.volume, errors);
            if let Some(disposal) = form.disposal_volume {
                if !disposal.is_finite() || disposal < 0.0 {
                    err(
                        errors,
                        format!("step {} disposal volume {} is not a finite amount", i + 1, disposal),
                    );
                }
            }
            if let Some(location) = &form.disposal_location {
                if !file.labware.contains_key(location) && location != FIXED_TRASH_ID {
                    err(
                        errors,
                        format!("step {} disposal location '{}' is not labware", i + 1, location),
                    );
                }
            }
        }
        StepForm::Mix(form) => {
            check_pipette(file, i, &form.pipette, errors);
            check_wells(file, i, &form.labware, &form.wells, errors);
            check_volume(i, "volume", form.volume, errors);
        }
        StepForm::Pause(form) => {
            let total = form.hours * 3600.0 + form.minutes * 60.0 + form.seconds;
            if form.pause_action == PauseAction::UntilTime && total < 0.0 {
                err(errors, format!("step {} pause time must not be negative", i + 1));
            }
        }
        StepForm::Magnet(form) => {
            check_module(file, i, &form.module_id, ModuleType::Magnetic, errors);
            if form.magnet_action == MagnetAction::Engage && form.engage_height.is_none() {
                err(errors, format!("step {} engages the magnet without a height", i + 1));
            }
        }
        StepForm::Temperature(form) => {
            check_module(file, i, &form.module_id, ModuleType::Temperature, errors);
            if form.set_temperature && form.target_temperature.is_none() {
                err(
                    errors,
                    format!("step {} sets a temperature without a target", i + 1),
                );
            }
        }
        StepForm::ThermocyclerState(form) => {
            check_module(file, i, &form.module_id, ModuleType::Thermocycler, errors);
        }
        StepForm::ThermocyclerProfile(form) => {
            check_module(file, i, &form.module_id, ModuleType::Thermocycler, errors);
            if form.profile.is_empty() {
                err(errors, format!("step {} has an empty profile", i + 1));
            }
        }
    }
}

// ============================================================================
// Deck loading
// ============================================================================

/// Build the invariant context and initial robot state for a validated
/// protocol. The fixed trash is added when the file does not place it.
pub fn build_context(file: &ProtocolFile) -> Result<(InvariantContext, RobotState), String> {
    let mut ctx = InvariantContext::default();
    let mut setup = DeckSetup::default();

    let place = |ctx: &mut InvariantContext, id: &str, labware_type: &str| -> Result<(), String> {
        if !ctx.labware_definitions.contains_key(labware_type) {
            let def = resolve_labware_definition(file, labware_type)
                .ok_or_else(|| format!("labware '{}' has unknown type '{}'", id, labware_type))?;
            ctx.labware_definitions.insert(labware_type.to_string(), def);
        }
        ctx.labware_entities.insert(
            id.to_string(),
            LabwareEntity {
                id: id.to_string(),
                labware_type: labware_type.to_string(),
            },
        );
        Ok(())
    };

    for (id, decl) in &file.labware {
        place(&mut ctx, id, &decl.labware_type)?;
        setup.labware_slots.insert(id.clone(), decl.slot.to_string());
    }
    if !ctx.labware_entities.contains_key(FIXED_TRASH_ID) {
        place(&mut ctx, FIXED_TRASH_ID, FIXED_TRASH_TYPE)?;
        setup
            .labware_slots
            .insert(FIXED_TRASH_ID.to_string(), FIXED_TRASH_SLOT.to_string());
    }

    for (id, decl) in &file.pipettes {
        let spec = builtin_pipette_spec(&decl.name)
            .ok_or_else(|| format!("pipette '{}' has unknown model '{}'", id, decl.name))?;
        if let Some(model) = &decl.tiprack_model {
            if !ctx.labware_definitions.contains_key(model) {
                if let Some(def) = resolve_labware_definition(file, model) {
                    ctx.labware_definitions.insert(model.clone(), def);
                }
            }
        }
        ctx.pipette_entities.insert(
            id.clone(),
            PipetteEntity {
                id: id.clone(),
                spec,
                tiprack_model: decl.tiprack_model.clone(),
            },
        );
        setup.pipette_mounts.insert(id.clone(), decl.mount);
    }

    for (id, decl) in &file.modules {
        ctx.module_entities.insert(
            id.clone(),
            ModuleEntity {
                id: id.clone(),
                module_type: decl.module_type,
                model: decl.model.clone(),
            },
        );
        setup.module_slots.insert(id.clone(), decl.slot.to_string());
    }

    setup.tiprack_assignment = file.tiprack_assignment.clone();
    setup.liquids = file.liquids.clone();

    let state = RobotState::initial(&ctx, &setup);
    tracing::debug!(
        labware = ctx.labware_entities.len(),
        pipettes = ctx.pipette_entities.len(),
        modules = ctx.module_entities.len(),
        "deck loaded"
    );
    Ok((ctx, state))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASIC: &str = r#"
version: "1.0"
name: serial-dilution
pipettes:
  p300:
    name: p300_single
    mount: left
    tiprack_model: opentrons_96_tiprack_300ul
labware:
  tips:
    type: opentrons_96_tiprack_300ul
    slot: 1
  plate:
    type: corning_96_wellplate_360ul_flat
    slot: 2
  trough:
    type: usascientific_12_reservoir_22ml
    slot: 3
  pcr:
    type: biorad_96_wellplate_200ul_pcr
    slot: tc
modules:
  tc:
    type: thermocyclerModuleType
    model: thermocyclerModuleV1
    slot: 7
liquids:
  trough:
    A1: { water: 10000 }
steps:
  - step_type: moveLiquid
    pipette: p300
    volume: 100
    aspirate_labware: trough
    aspirate_wells: [A1]
    dispense_labware: plate
    dispense_wells: [A1, A2, A3]
  - step_type: pause
    pause_action: untilTime
    seconds: 30
  - step_type: thermocyclerState
    module_id: tc
    block_target_temp: 4
    lid_open: true
"#;

    fn messages(yaml: &str) -> Vec<String> {
        let file = parse_protocol(yaml).unwrap();
        validate_protocol(&file)
            .into_iter()
            .map(|e| e.message)
            .collect()
    }

    #[test]
    fn test_sg013_parse_valid() {
        let file = parse_protocol(BASIC).unwrap();
        assert_eq!(file.name, "serial-dilution");
        assert_eq!(file.steps.len(), 3);
        assert_eq!(file.labware["pcr"].slot, SlotRef::Named("tc".to_string()));
        assert!(validate_protocol(&file).is_empty());
    }

    #[test]
    fn test_sg013_parse_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("protocol.yaml");
        std::fs::write(&path, BASIC).unwrap();
        let file = parse_protocol_file(&path).unwrap();
        assert_eq!(file.pipettes.len(), 1);

        let missing = parse_protocol_file(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(missing.contains("failed to read"));
    }

    #[test]
    fn test_sg013_parse_error_has_context() {
        let e = parse_protocol("version: [").unwrap_err();
        assert!(e.starts_with("YAML parse error"));
    }

    #[test]
    fn test_sg013_bad_version_and_name() {
        let yaml = BASIC
            .replace("version: \"1.0\"", "version: \"2.0\"")
            .replace("name: serial-dilution", "name: \"\"");
        let msgs = messages(&yaml);
        assert!(msgs.iter().any(|m| m.contains("version must be")));
        assert!(msgs.iter().any(|m| m.contains("name must not be empty")));
    }

    #[test]
    fn test_sg013_unknown_models() {
        let yaml = BASIC
            .replace("name: p300_single", "name: p9000_single")
            .replace("type: corning_96_wellplate_360ul_flat", "type: mystery_plate");
        let msgs = messages(&yaml);
        assert!(msgs.iter().any(|m| m.contains("unknown model 'p9000_single'")));
        assert!(msgs.iter().any(|m| m.contains("unknown type 'mystery_plate'")));
    }

    #[test]
    fn test_sg013_slot_conflicts() {
        let yaml = BASIC.replace("    slot: 2\n", "    slot: 1\n");
        let msgs = messages(&yaml);
        assert!(msgs.iter().any(|m| m.contains("both occupy slot 1")));

        let yaml = BASIC.replace("    slot: 3\n", "    slot: 12\n");
        let msgs = messages(&yaml);
        assert!(msgs.iter().any(|m| m.contains("reserved for the fixed trash")));

        let yaml = BASIC.replace("    slot: 3\n", "    slot: 13\n");
        let msgs = messages(&yaml);
        assert!(msgs.iter().any(|m| m.contains("invalid slot '13'")));
    }

    #[test]
    fn test_sg013_non_finite_step_volume() {
        for bad in [".inf", ".nan", "-5"] {
            let yaml = BASIC.replace("    volume: 100\n", &format!("    volume: {}\n", bad));
            let msgs = messages(&yaml);
            assert!(
                msgs.iter().any(|m| m.contains("volume must be a positive finite number")),
                "{}",
                bad
            );
        }
    }

    #[test]
    fn test_sg013_step_references() {
        let yaml = BASIC
            .replace("aspirate_wells: [A1]", "aspirate_wells: [Z99]")
            .replace("module_id: tc", "module_id: ghost");
        let msgs = messages(&yaml);
        assert!(msgs.iter().any(|m| m.contains("unknown well 'Z99'")));
        assert!(msgs.iter().any(|m| m.contains("unknown module 'ghost'")));
    }

    #[test]
    fn test_sg013_custom_labware_definition() {
        let yaml = r#"
version: "1.0"
name: custom
labware_definitions:
  tube_rack_2:
    display_name: Two tubes
    ordering: [[A1, B1]]
    wells:
      A1: { depth: 40, total_liquid_volume: 1500 }
      B1: { depth: 40, total_liquid_volume: 1500 }
labware:
  tubes:
    type: tube_rack_2
    slot: 4
"#;
        let file = parse_protocol(yaml).unwrap();
        assert!(validate_protocol(&file).is_empty());
        let (ctx, _) = build_context(&file).unwrap();
        assert_eq!(ctx.labware_definition("tubes").unwrap().wells.len(), 2);
    }

    #[test]
    fn test_sg013_build_context_adds_trash() {
        let file = parse_protocol(BASIC).unwrap();
        let (ctx, state) = build_context(&file).unwrap();
        assert!(ctx.has_labware(FIXED_TRASH_ID));
        assert_eq!(state.labware[FIXED_TRASH_ID].slot, "12");
        assert_eq!(state.labware["pcr"].slot, "tc");
        assert!(state.tip_state.tipracks.contains_key("tips"));
        assert!(state.liquid_state.is_some());
        assert_eq!(ctx.pipette_tip_capacity("p300"), Some(300.0));
    }
}
