use super::{HandlerContext, HandlerOutcome};
use crate::eval;
use cah_core::error::ErrorCategory;
use cah_core::workflow::Assignment;

/// Applies each assignment in order, so a later one may reference a
/// variable an earlier one just set. `is_expression` assignments carry
/// their expression text as a JSON string in `value`.
pub fn handle(assignments: &[Assignment], ctx: &HandlerContext) -> HandlerOutcome {
    let mut outcome = HandlerOutcome::done();
    let mut working = ctx.eval.clone();
    for assignment in assignments {
        let resolved = if assignment.is_expression {
            let Some(expr) = assignment.value.as_str() else {
                return HandlerOutcome::failed(
                    format!("assignment to '{}' is marked as an expression but its value is not a string", assignment.variable),
                    ErrorCategory::Permanent,
                );
            };
            match eval::evaluate(expr, &working) {
                Ok(v) => v,
                Err(e) => return HandlerOutcome::failed(format!("assignment expression for '{}' failed: {e}", assignment.variable), ErrorCategory::Permanent),
            }
        } else {
            assignment.value.clone()
        };
        working.variables.insert(assignment.variable.clone(), resolved.clone());
        outcome.variable_updates.insert(assignment.variable.clone(), resolved);
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::EvalContext;
    use serde_json::json;
    use std::collections::HashMap;

    fn ctx(eval: EvalContext) -> HandlerContext<'static> {
        HandlerContext {
            eval,
            now_ms: 0,
            loop_counts: Box::leak(Box::new(HashMap::new())),
        }
    }

    #[test]
    fn later_assignment_sees_earlier_ones() {
        let assignments = vec![
            Assignment { variable: "x".into(), value: json!(2), is_expression: false },
            Assignment { variable: "y".into(), value: json!("x + 1"), is_expression: true },
        ];
        let outcome = handle(&assignments, &ctx(EvalContext::default()));
        assert_eq!(outcome.variable_updates.get("y"), Some(&json!(3.0)));
    }
}
