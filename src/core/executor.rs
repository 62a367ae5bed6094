//! SG-008: Command composition and the protocol timeline.
//!
//! Creators are curried (params bound now, robot state supplied later) and
//! reduced in order: each creator sees the state left by the commands before
//! it. The first error stops the chain.

use super::command::{
    Command, CommandCreatorError, CommandCreatorFailure, CommandCreatorResult,
    CommandCreatorWarning, CommandsAndWarnings,
};
use super::context::InvariantContext;
use super::effects;
use super::state::RobotState;
use serde::Serialize;

/// A plain command creator.
pub type CommandCreator<P> = fn(&P, &InvariantContext, &RobotState) -> CommandCreatorResult;

/// A creator with its params already bound.
pub type CurriedCommandCreator =
    Box<dyn Fn(&InvariantContext, &RobotState) -> CommandCreatorResult + Send + Sync>;

/// Bind `params` to `creator`.
pub fn curry_command_creator<P>(creator: CommandCreator<P>, params: P) -> CurriedCommandCreator
where
    P: Send + Sync + 'static,
{
    Box::new(move |ctx, state| creator(&params, ctx, state))
}

/// Wrap a closure as a curried creator.
pub fn curry_fn<F>(f: F) -> CurriedCommandCreator
where
    F: Fn(&InvariantContext, &RobotState) -> CommandCreatorResult + Send + Sync + 'static,
{
    Box::new(f)
}

/// Commands, warnings and resulting state of a successful reduction.
#[derive(Debug, Clone)]
pub struct StepOutput {
    pub commands: Vec<Command>,
    pub warnings: Vec<CommandCreatorWarning>,
    pub robot_state: RobotState,
}

/// Run creators in order, threading state. Returns the final state too.
pub fn reduce_with_state(
    creators: &[CurriedCommandCreator],
    ctx: &InvariantContext,
    initial: &RobotState,
) -> Result<StepOutput, CommandCreatorFailure> {
    let mut state = initial.clone();
    let mut commands = Vec::new();
    let mut warnings = Vec::new();

    for (i, creator) in creators.iter().enumerate() {
        match creator(ctx, &state) {
            Ok(out) => {
                for command in &out.commands {
                    effects::apply_command(command, ctx, &mut state);
                }
                commands.extend(out.commands);
                warnings.extend(out.warnings);
            }
            Err(failure) => {
                tracing::debug!(
                    creator = i,
                    errors = failure.errors.len(),
                    "command creator failed, stopping chain"
                );
                commands.extend(failure.prior_commands);
                return Err(CommandCreatorFailure {
                    errors: failure.errors,
                    prior_commands: commands,
                });
            }
        }
    }

    Ok(StepOutput {
        commands,
        warnings,
        robot_state: state,
    })
}

/// Run creators in order and flatten their commands and warnings.
///
/// On the first failure only that creator's errors are returned. Commands
/// already produced are kept in `prior_commands` for diagnostics.
pub fn reduce_command_creators(
    creators: &[CurriedCommandCreator],
    ctx: &InvariantContext,
    initial: &RobotState,
) -> CommandCreatorResult {
    reduce_with_state(creators, ctx, initial).map(|out| CommandsAndWarnings {
        commands: out.commands,
        warnings: out.warnings,
    })
}

/// Fold a list of curried creators into one.
pub fn sequence(creators: Vec<CurriedCommandCreator>) -> CurriedCommandCreator {
    Box::new(move |ctx, state| reduce_command_creators(&creators, ctx, state))
}

// ============================================================================
// Timeline
// ============================================================================

/// One successfully generated step.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineFrame {
    pub commands: Vec<Command>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<CommandCreatorWarning>,
    #[serde(skip)]
    pub robot_state: RobotState,
}

/// The step that stopped the timeline.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineError {
    pub step_index: usize,
    pub errors: Vec<CommandCreatorError>,
}

/// Every step's output in order, up to the first failing step.
#[derive(Debug, Clone, Serialize)]
pub struct Timeline {
    pub frames: Vec<TimelineFrame>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TimelineError>,
}

impl Timeline {
    /// All commands across all generated steps.
    pub fn commands(&self) -> impl Iterator<Item = &Command> {
        self.frames.iter().flat_map(|f| f.commands.iter())
    }

    pub fn warning_count(&self) -> usize {
        self.frames.iter().map(|f| f.warnings.len()).sum()
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Run each step against the state left by the previous one.
pub fn command_creators_timeline(
    steps: &[CurriedCommandCreator],
    ctx: &InvariantContext,
    initial: &RobotState,
) -> Timeline {
    let mut frames = Vec::with_capacity(steps.len());
    let mut state = initial.clone();

    for (i, step) in steps.iter().enumerate() {
        match step(ctx, &state) {
            Ok(out) => {
                let next = effects::apply_commands(&out.commands, ctx, &state);
                tracing::debug!(
                    step = i,
                    commands = out.commands.len(),
                    warnings = out.warnings.len(),
                    "step generated"
                );
                frames.push(TimelineFrame {
                    commands: out.commands,
                    warnings: out.warnings,
                    robot_state: next.clone(),
                });
                state = next;
            }
            Err(failure) => {
                tracing::debug!(step = i, "step failed, timeline stopped");
                return Timeline {
                    frames,
                    error: Some(TimelineError {
                        step_index: i,
                        errors: failure.errors,
                    }),
                };
            }
        }
    }

    Timeline {
        frames,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::command::*;
    use crate::core::errors;
    use crate::core::fixtures::*;

    fn emit_delay(seconds: &f64, _: &InvariantContext, _: &RobotState) -> CommandCreatorResult {
        Ok(CommandsAndWarnings::single(Command::Delay(DelayParams {
            wait: Wait::Seconds(*seconds),
            message: None,
        })))
    }

    fn fail(message: &String, _: &InvariantContext, _: &RobotState) -> CommandCreatorResult {
        Err(errors::invalid_args(message.clone()).into())
    }

    fn pick_up(well: &String, _: &InvariantContext, state: &RobotState) -> CommandCreatorResult {
        if state.pipette_has_tip("p300SingleId") {
            return Err(errors::tip_already_on_pipette("p300SingleId").into());
        }
        Ok(CommandsAndWarnings::single(Command::PickUpTip(
            PipetteAccessParams {
                pipette: "p300SingleId".to_string(),
                labware: "tiprack1Id".to_string(),
                well: well.clone(),
            },
        )))
    }

    #[test]
    fn test_sg008_reduce_flattens_in_order() {
        let ctx = make_context();
        let creators = vec![
            curry_command_creator(emit_delay, 1.0),
            curry_command_creator(emit_delay, 2.0),
        ];
        let out = reduce_command_creators(&creators, &ctx, &make_state()).unwrap();
        assert_eq!(out.commands.len(), 2);
        assert_eq!(
            out.commands[1],
            Command::Delay(DelayParams {
                wait: Wait::Seconds(2.0),
                message: None
            })
        );
    }

    #[test]
    fn test_sg008_short_circuit_on_error() {
        let ctx = make_context();
        let creators = vec![
            curry_command_creator(emit_delay, 1.0),
            curry_command_creator(fail, "second".to_string()),
            curry_command_creator(emit_delay, 3.0),
        ];
        let failure = reduce_command_creators(&creators, &ctx, &make_state()).unwrap_err();
        assert_eq!(failure.errors.len(), 1);
        assert_eq!(failure.errors[0].message, "second");
        assert_eq!(failure.prior_commands.len(), 1);
    }

    #[test]
    fn test_sg008_state_threads_between_creators() {
        let ctx = make_context();
        let creators = vec![
            curry_command_creator(pick_up, "A1".to_string()),
            curry_command_creator(pick_up, "B1".to_string()),
        ];
        let failure = reduce_command_creators(&creators, &ctx, &make_state()).unwrap_err();
        assert_eq!(failure.errors[0].error_type, ErrorType::TipAlreadyOnPipette);
    }

    #[test]
    fn test_sg008_reduce_with_state_returns_next_state() {
        let ctx = make_context();
        let state = make_state();
        let creators = vec![curry_command_creator(pick_up, "A1".to_string())];
        let out = reduce_with_state(&creators, &ctx, &state).unwrap();
        assert!(out.robot_state.pipette_has_tip("p300SingleId"));
        assert!(!state.pipette_has_tip("p300SingleId"));
    }

    #[test]
    fn test_sg008_sequence_nests() {
        let ctx = make_context();
        let inner = sequence(vec![
            curry_command_creator(emit_delay, 1.0),
            curry_command_creator(emit_delay, 2.0),
        ]);
        let creators = vec![inner, curry_command_creator(emit_delay, 3.0)];
        let out = reduce_command_creators(&creators, &ctx, &make_state()).unwrap();
        assert_eq!(out.commands.len(), 3);
    }

    #[test]
    fn test_sg008_timeline_stops_at_failing_step() {
        let ctx = make_context();
        let steps = vec![
            curry_command_creator(pick_up, "A1".to_string()),
            curry_command_creator(emit_delay, 5.0),
            curry_command_creator(pick_up, "B1".to_string()),
            curry_command_creator(emit_delay, 6.0),
        ];
        let timeline = command_creators_timeline(&steps, &ctx, &make_state());
        assert_eq!(timeline.frames.len(), 2);
        assert!(!timeline.is_ok());
        let error = timeline.error.as_ref().unwrap();
        assert_eq!(error.step_index, 2);
        assert_eq!(timeline.commands().count(), 2);
        assert!(timeline.frames[0].robot_state.pipette_has_tip("p300SingleId"));
    }

    #[test]
    fn test_sg008_curried_creators_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>(_: &T) {}
        let creator = curry_command_creator(emit_delay, 1.0);
        assert_send_sync(&creator);
    }
}
