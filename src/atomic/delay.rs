//! SG-026: delay and moveToWell.

use super::Checks;
use crate::core::command::{
    Command, CommandCreatorResult, CommandsAndWarnings, DelayParams, MoveToWellParams, Offset, Wait,
};
use crate::core::context::InvariantContext;
use crate::core::state::RobotState;

/// Where the tip waits during a delay.
#[derive(Debug, Clone, PartialEq)]
pub struct DelayTarget {
    pub pipette: String,
    pub labware: String,
    pub well: String,
    pub mm_from_bottom: f64,
}

/// A delay, optionally held at a well.
#[derive(Debug, Clone, PartialEq)]
pub struct DelayArgs {
    pub wait: Wait,
    pub message: Option<String>,
    pub target: Option<DelayTarget>,
}

impl DelayArgs {
    pub fn seconds(seconds: f64) -> Self {
        Self {
            wait: Wait::Seconds(seconds),
            message: None,
            target: None,
        }
    }
}

/// Move the tip to a well.
pub fn move_to_well(
    params: &MoveToWellParams,
    ctx: &InvariantContext,
    state: &RobotState,
) -> CommandCreatorResult {
    let mut checks = Checks::new(ctx, state);
    checks.pipette(&params.pipette);
    checks.labware_well(&params.labware, &params.well);
    checks.lid_open(&params.labware);
    checks.finish(CommandsAndWarnings::single(Command::MoveToWell(params.clone())))
}

/// Wait, first moving to the target well when one is given.
pub fn delay(args: &DelayArgs, ctx: &InvariantContext, state: &RobotState) -> CommandCreatorResult {
    let delay = Command::Delay(DelayParams {
        wait: args.wait,
        message: args.message.clone(),
    });
    let Some(target) = &args.target else {
        return Ok(CommandsAndWarnings::single(delay));
    };
    let moved = move_to_well(
        &MoveToWellParams {
            pipette: target.pipette.clone(),
            labware: target.labware.clone(),
            well: target.well.clone(),
            offset: Some(Offset {
                x: 0.0,
                y: 0.0,
                z: target.mm_from_bottom,
            }),
        },
        ctx,
        state,
    )?;
    let mut commands = moved.commands;
    commands.push(delay);
    Ok(CommandsAndWarnings {
        commands,
        warnings: moved.warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::command::ErrorType;
    use crate::core::fixtures::*;

    #[test]
    fn test_sg026_plain_delay() {
        let ctx = make_context();
        let out = delay(&DelayArgs::seconds(42.0), &ctx, &make_state()).unwrap();
        assert_eq!(
            out.commands,
            vec![Command::Delay(DelayParams {
                wait: Wait::Seconds(42.0),
                message: None
            })]
        );
    }

    #[test]
    fn test_sg026_delay_until_resume() {
        let ctx = make_context();
        let args = DelayArgs {
            wait: Wait::UntilResume(true),
            message: Some("add reagent".to_string()),
            target: None,
        };
        let out = delay(&args, &ctx, &make_state()).unwrap();
        let json = serde_json::to_value(&out.commands[0]).unwrap();
        assert_eq!(json["params"]["wait"], true);
        assert_eq!(json["params"]["message"], "add reagent");
    }

    #[test]
    fn test_sg026_delay_at_well_moves_first() {
        let ctx = make_context();
        let args = DelayArgs {
            wait: Wait::Seconds(12.0),
            message: None,
            target: Some(DelayTarget {
                pipette: "p300SingleId".to_string(),
                labware: "sourcePlateId".to_string(),
                well: "A1".to_string(),
                mm_from_bottom: 14.0,
            }),
        };
        let out = delay(&args, &ctx, &make_state()).unwrap();
        assert_eq!(out.commands.len(), 2);
        let json = serde_json::to_value(&out.commands[0]).unwrap();
        assert_eq!(json["command"], "moveToWell");
        assert_eq!(json["params"]["offset"]["z"], 14.0);
        assert_eq!(out.commands[1].name(), "delay");
    }

    #[test]
    fn test_sg026_move_to_unknown_labware() {
        let ctx = make_context();
        let params = MoveToWellParams {
            pipette: "p300SingleId".to_string(),
            labware: "ghostId".to_string(),
            well: "A1".to_string(),
            offset: None,
        };
        let failure = move_to_well(&params, &ctx, &make_state()).unwrap_err();
        assert_eq!(failure.errors[0].error_type, ErrorType::LabwareDoesNotExist);
    }
}
