use super::{HandlerContext, HandlerOutcome};
use crate::eval;
use cah_core::error::ErrorCategory;
use cah_core::workflow::ScriptAssignment;

/// Runs each `assignments` entry in order (each a variable bound to an
/// expression), then, if `expression`/`output_var` are set, evaluates
/// `expression` last and both assigns it to `output_var` and records
/// it as the node's own output.
pub fn handle(expression: Option<&str>, output_var: Option<&str>, assignments: &[ScriptAssignment], ctx: &HandlerContext) -> HandlerOutcome {
    let mut outcome = HandlerOutcome::done();
    let mut working = ctx.eval.clone();
    for assignment in assignments {
        match eval::evaluate(&assignment.expression, &working) {
            Ok(v) => {
                working.variables.insert(assignment.variable.clone(), v.clone());
                outcome.variable_updates.insert(assignment.variable.clone(), v);
            }
            Err(e) => {
                return HandlerOutcome::failed(format!("script assignment to '{}' failed: {e}", assignment.variable), ErrorCategory::Permanent);
            }
        }
    }

    if let Some(expr) = expression {
        match eval::evaluate(expr, &working) {
            Ok(v) => {
                if let Some(name) = output_var {
                    outcome.variable_updates.insert(name.to_string(), v.clone());
                }
                outcome.output = Some(v);
            }
            Err(e) => return HandlerOutcome::failed(format!("script expression failed: {e}"), ErrorCategory::Permanent),
        }
    }

    outcome
}
