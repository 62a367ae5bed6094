//! Compound step creators: whole protocol steps built from atomic creators.
//!
//! Every compound creator validates its args, lays out a list of curried
//! atomic creators and reduces them against the robot state it is given.

pub mod consolidate;
pub mod distribute;
pub mod mix;
pub mod modules;
pub mod transfer;
pub mod utils;

pub use consolidate::consolidate;
pub use distribute::distribute;
pub use mix::mix;
pub use modules::{
    deactivate_temperature_step, disengage_magnet_step, engage_magnet_step, pause,
    set_temperature_step, thermocycler_profile_step, thermocycler_state_step,
};
pub use transfer::transfer;
