//! Atomic command creators: one creator per hardware action.
//!
//! Each creator validates its preconditions against the context and the
//! current robot state, then emits exactly the commands for its action. No
//! creator changes state itself; the effects layer derives the next state
//! from the emitted commands.

pub mod air_gap;
pub mod aspirate;
pub mod blowout;
pub mod delay;
pub mod dispense;
pub mod modules;
pub mod tips;

pub use air_gap::{air_gap, dispense_air_gap};
pub use aspirate::aspirate;
pub use blowout::{blowout, touch_tip};
pub use delay::{delay, move_to_well, DelayArgs, DelayTarget};
pub use dispense::dispense;
pub use tips::{drop_tip, pick_up_tip};

use crate::core::command::{
    CommandCreatorError, CommandCreatorFailure, CommandCreatorResult, CommandsAndWarnings,
};
use crate::core::context::InvariantContext;
use crate::core::errors;
use crate::core::state::{ModuleState, RobotState};

/// Collects precondition failures for one creator call.
pub(crate) struct Checks<'a> {
    ctx: &'a InvariantContext,
    state: &'a RobotState,
    errors: Vec<CommandCreatorError>,
}

impl<'a> Checks<'a> {
    pub(crate) fn new(ctx: &'a InvariantContext, state: &'a RobotState) -> Self {
        Self {
            ctx,
            state,
            errors: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, error: CommandCreatorError) {
        self.errors.push(error);
    }

    /// Pipette exists in both context and state.
    pub(crate) fn pipette(&mut self, pipette_id: &str) -> bool {
        let exists =
            self.ctx.pipette(pipette_id).is_some() && self.state.pipettes.contains_key(pipette_id);
        if !exists {
            self.push(errors::pipette_does_not_exist(pipette_id));
        }
        exists
    }

    /// Pipette exists and carries a tip.
    pub(crate) fn pipette_with_tip(&mut self, pipette_id: &str, action: &str) -> bool {
        if !self.pipette(pipette_id) {
            return false;
        }
        let has_tip = self.state.pipette_has_tip(pipette_id);
        if !has_tip {
            self.push(errors::no_tip_on_pipette(pipette_id, action));
        }
        has_tip
    }

    /// Labware is placed, and the well exists in its definition.
    pub(crate) fn labware_well(&mut self, labware_id: &str, well: &str) -> bool {
        if !self.ctx.has_labware(labware_id) || !self.state.labware.contains_key(labware_id) {
            self.push(errors::labware_does_not_exist(labware_id));
            return false;
        }
        match self.ctx.labware_definition(labware_id) {
            Some(def) if def.well(well).is_none() => {
                self.push(errors::well_does_not_exist(labware_id, well));
                false
            }
            _ => true,
        }
    }

    /// Labware is not inside a thermocycler whose lid is closed or unknown.
    pub(crate) fn lid_open(&mut self, labware_id: &str) {
        if let Some(module) = self.state.module_under_labware(labware_id) {
            if let ModuleState::Thermocycler { lid_open, .. } = module.module_state {
                if lid_open != Some(true) {
                    self.push(errors::thermocycler_lid_closed(labware_id));
                }
            }
        }
    }

    /// Volume is a finite number above zero.
    pub(crate) fn positive_volume(&mut self, action: &str, volume: f64) -> bool {
        let ok = volume.is_finite() && volume > 0.0;
        if !ok {
            self.push(errors::invalid_volume(action, volume));
        }
        ok
    }

    pub(crate) fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Return `output` if every check passed.
    pub(crate) fn finish(self, output: CommandsAndWarnings) -> CommandCreatorResult {
        if self.errors.is_empty() {
            Ok(output)
        } else {
            Err(CommandCreatorFailure::new(self.errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::command::ErrorType;
    use crate::core::fixtures::*;

    #[test]
    fn test_sg020_checks_collect_errors() {
        let ctx = make_context();
        let state = make_state();
        let mut checks = Checks::new(&ctx, &state);
        assert!(!checks.pipette_with_tip("p300SingleId", "aspirate"));
        assert!(!checks.labware_well("ghostId", "A1"));
        assert!(!checks.labware_well("sourcePlateId", "Q99"));
        let failure = checks.finish(CommandsAndWarnings::default()).unwrap_err();
        let types: Vec<ErrorType> = failure.errors.iter().map(|e| e.error_type).collect();
        assert_eq!(
            types,
            vec![
                ErrorType::NoTipOnPipette,
                ErrorType::LabwareDoesNotExist,
                ErrorType::WellDoesNotExist
            ]
        );
    }

    #[test]
    fn test_sg020_unknown_pipette_skips_tip_check() {
        let ctx = make_context();
        let state = make_state();
        let mut checks = Checks::new(&ctx, &state);
        checks.pipette_with_tip("ghost", "aspirate");
        let failure = checks.finish(CommandsAndWarnings::default()).unwrap_err();
        assert_eq!(failure.errors.len(), 1);
        assert_eq!(failure.errors[0].error_type, ErrorType::PipetteDoesNotExist);
    }

    #[test]
    fn test_sg020_lid_must_be_open() {
        let ctx = make_context();
        let closed = make_state();
        let mut checks = Checks::new(&ctx, &closed);
        checks.lid_open("pcrPlateId");
        checks.lid_open("sourcePlateId");
        assert!(!checks.is_ok());

        let open = with_lid(make_state(), true);
        let mut checks = Checks::new(&ctx, &open);
        checks.lid_open("pcrPlateId");
        assert!(checks.is_ok());
    }

    #[test]
    fn test_sg020_volume_must_be_positive() {
        let ctx = make_context();
        let state = make_state();
        let mut checks = Checks::new(&ctx, &state);
        assert!(checks.positive_volume("dispense", 10.0));
        assert!(!checks.positive_volume("dispense", 0.0));
        assert!(!checks.positive_volume("dispense", f64::NAN));
        assert!(!checks.is_ok());
    }
}
