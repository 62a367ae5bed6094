//! Stepgen: deterministic step generation for liquid-handling robots.
//!
//! Protocol steps are expanded into atomic robot commands while a simulated
//! robot state tracks tips, liquid and modules. Every step's output is
//! BLAKE3-fingerprinted so regenerations can be diffed.

pub mod atomic;
pub mod cli;
pub mod compound;
pub mod core;
pub mod logging;
