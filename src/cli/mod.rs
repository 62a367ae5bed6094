//! SG-040: CLI subcommands: init, validate, plan, generate.

use crate::core::{codegen, parser, planner, types};
use clap::Subcommand;
use std::path::{Path, PathBuf};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new protocol directory
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Validate protocol.yaml without generating commands
    Validate {
        /// Path to protocol.yaml
        #[arg(short, long, default_value = "protocol.yaml")]
        file: PathBuf,
    },

    /// Show which steps would change against a previous generation
    Plan {
        /// Path to protocol.yaml
        #[arg(short, long, default_value = "protocol.yaml")]
        file: PathBuf,

        /// Previously generated output
        #[arg(long, default_value = "protocol.json")]
        previous: PathBuf,
    },

    /// Generate robot commands for every step
    Generate {
        /// Path to protocol.yaml
        #[arg(short, long, default_value = "protocol.yaml")]
        file: PathBuf,

        /// Output JSON path
        #[arg(short, long, default_value = "protocol.json")]
        output: PathBuf,
    },
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Init { path } => cmd_init(&path),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Plan { file, previous } => cmd_plan(&file, &previous),
        Commands::Generate { file, output } => cmd_generate(&file, &output),
    }
}

const TEMPLATE: &str = r#"version: "1.0"
name: my-protocol
description: "Generated by stepgen"

pipettes:
  p300:
    name: p300_single
    mount: left
    tiprack_model: opentrons_96_tiprack_300ul

labware:
  tiprack:
    type: opentrons_96_tiprack_300ul
    slot: 1
  source:
    type: usascientific_12_reservoir_22ml
    slot: 2
  dest:
    type: corning_96_wellplate_360ul_flat
    slot: 3

modules: {}

steps:
  - step_type: moveLiquid
    pipette: p300
    volume: 100
    change_tip: always
    aspirate_labware: source
    aspirate_wells: [A1]
    dispense_labware: dest
    dispense_wells: [A1, B1, C1]
"#;

fn cmd_init(path: &Path) -> Result<(), String> {
    let protocol_path = path.join("protocol.yaml");
    if protocol_path.exists() {
        return Err(format!("{} already exists", protocol_path.display()));
    }
    std::fs::create_dir_all(path)
        .map_err(|e| format!("cannot create {}: {}", path.display(), e))?;
    std::fs::write(&protocol_path, TEMPLATE)
        .map_err(|e| format!("cannot write {}: {}", protocol_path.display(), e))?;

    println!("Initialized protocol at {}", path.display());
    println!("  Created: {}", protocol_path.display());
    Ok(())
}

fn cmd_validate(file: &Path) -> Result<(), String> {
    let protocol = parser::parse_protocol_file(file)?;
    let errors = parser::validate_protocol(&protocol);

    if errors.is_empty() {
        println!(
            "OK: {} ({} pipettes, {} labware, {} modules, {} steps)",
            protocol.name,
            protocol.pipettes.len(),
            protocol.labware.len(),
            protocol.modules.len(),
            protocol.steps.len()
        );
        Ok(())
    } else {
        for e in &errors {
            eprintln!("  ERROR: {}", e);
        }
        Err(format!("{} validation error(s)", errors.len()))
    }
}

/// Parse and validate a protocol file, returning errors if invalid.
fn parse_and_validate(file: &Path) -> Result<types::ProtocolFile, String> {
    let protocol = parser::parse_protocol_file(file)?;
    let errors = parser::validate_protocol(&protocol);
    if errors.is_empty() {
        return Ok(protocol);
    }
    for e in &errors {
        eprintln!("  ERROR: {}", e);
    }
    Err("validation failed".to_string())
}

/// Load a previous generation, if one exists.
fn load_previous(path: &Path) -> Result<Option<types::GeneratedProtocol>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let previous = serde_json::from_str(&content)
        .map_err(|e| format!("invalid generated output {}: {}", path.display(), e))?;
    Ok(Some(previous))
}

fn cmd_plan(file: &Path, previous_path: &Path) -> Result<(), String> {
    let protocol = parse_and_validate(file)?;
    let generated = codegen::generate(&protocol)?;
    let previous = load_previous(previous_path)?;
    let plan = planner::plan(&generated, previous.as_ref());

    print_plan(&plan);
    report_generation_error(&generated)
}

/// Display a plan to stdout.
fn print_plan(plan: &types::ExecutionPlan) {
    println!("Planning: {} ({} steps)", plan.name, plan.changes.len());
    println!();

    for change in &plan.changes {
        let symbol = match change.action {
            types::PlanAction::Create => "+",
            types::PlanAction::Update => "~",
            types::PlanAction::Destroy => "-",
            types::PlanAction::NoOp => " ",
        };
        println!(
            "  {} {} [{} commands]",
            symbol, change.description, change.command_count
        );
    }

    println!();
    println!(
        "Plan: {} to add, {} to change, {} to remove, {} unchanged.",
        plan.to_create, plan.to_update, plan.to_destroy, plan.unchanged
    );
}

/// Print the failing step, if any, and turn it into a CLI error.
fn report_generation_error(generated: &types::GeneratedProtocol) -> Result<(), String> {
    let Some(error) = &generated.error else {
        return Ok(());
    };
    for e in &error.errors {
        eprintln!("  ERROR: step {}: {}", error.step_index + 1, e);
    }
    Err(format!("step {} failed", error.step_index + 1))
}

fn cmd_generate(file: &Path, output: &Path) -> Result<(), String> {
    let protocol = parse_and_validate(file)?;
    let generated = codegen::generate(&protocol)?;
    report_generation_error(&generated)?;

    for step in &generated.steps {
        for w in &step.form_warnings {
            eprintln!("  WARNING: step {}: {}", step.index + 1, w);
        }
        for w in &step.warnings {
            eprintln!("  WARNING: step {}: {}", step.index + 1, w);
        }
    }

    write_output(output, &generated)?;

    let commands: usize = generated.steps.iter().map(|s| s.commands.len()).sum();
    println!(
        "Generated: {} ({} steps, {} commands)",
        generated.name,
        generated.steps.len(),
        commands
    );
    println!("  Fingerprint: {}", generated.fingerprint);
    println!("  Written: {}", output.display());
    Ok(())
}

/// Write generated output as JSON. Atomic: temp file + rename.
fn write_output(path: &Path, generated: &types::GeneratedProtocol) -> Result<(), String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("cannot create dir {}: {}", parent.display(), e))?;
    }
    let json = serde_json::to_string_pretty(generated)
        .map_err(|e| format!("serialize error: {}", e))?;

    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, &json)
        .map_err(|e| format!("cannot write {}: {}", tmp_path.display(), e))?;
    std::fs::rename(&tmp_path, path)
        .map_err(|e| format!("cannot rename {} → {}: {}", tmp_path.display(), path.display(), e))?;
    Ok(())
}
