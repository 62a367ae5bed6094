//! Core engine: types, robot state, selectors, effects, composition, planning.

pub mod args;
pub mod codegen;
pub mod command;
pub mod context;
pub mod definitions;
pub mod effects;
pub mod errors;
pub mod executor;
pub mod fingerprint;
pub mod forms;
pub mod parser;
pub mod planner;
pub mod selectors;
pub mod state;
pub mod types;
pub mod warnings;

#[cfg(test)]
pub mod fixtures;
