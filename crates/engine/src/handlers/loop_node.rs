use super::{HandlerContext, HandlerOutcome};
use crate::eval;
use cah_core::workflow::{LoopKind, NodeId};
use serde_json::{json, Value as JsonValue};

fn iter_key(node_id: &NodeId) -> String {
    format!("__loop_iter::{node_id}")
}

/// Evaluates the continuation condition and records it as the node's
/// own boolean output (`outputs.<node_id>`). Downstream edges route on
/// that value: one back into the body (taken while `true`, capped by
/// `max_iterations` here and independently by the loop-back edge's own
/// `max_loops`), one out of the loop (taken once `false`).
///
/// `For` treats `init`/`step` as expressions assigned to `loop_var`
/// (evaluated once, then re-evaluated after each pass) and `end` as
/// the continuation condition, evaluated with `loop_var` bound to its
/// current value.
pub fn handle(node_id: &NodeId, kind: &LoopKind, loop_var: &str, max_iterations: u32, ctx: &HandlerContext) -> HandlerOutcome {
    let key = iter_key(node_id);
    let iter = ctx.eval.variables.get(&key).and_then(|v| v.as_u64()).unwrap_or(0);

    let mut working = ctx.eval.clone();
    if let LoopKind::For { init, .. } = kind {
        if iter == 0 && !working.variables.contains_key(loop_var) {
            if let Ok(v) = eval::evaluate(init, &working) {
                working.variables.insert(loop_var.to_string(), v);
            }
        }
    }

    let exhausted = iter >= max_iterations as u64;
    let continue_loop = !exhausted
        && match kind {
            LoopKind::While { condition } => eval::evaluate_bool(condition, &working),
            LoopKind::Until { condition } => !eval::evaluate_bool(condition, &working),
            LoopKind::For { end, .. } => eval::evaluate_bool(end, &working),
        };

    let mut outcome = HandlerOutcome::done();
    outcome.output = Some(json!(continue_loop));

    if !continue_loop {
        outcome.variable_updates.insert(key, JsonValue::Null);
        return outcome;
    }

    outcome.variable_updates.insert(key, json!(iter + 1));
    if let LoopKind::For { init, step } = kind {
        if iter == 0 {
            if let Ok(v) = eval::evaluate(init, &ctx.eval) {
                working.variables.insert(loop_var.to_string(), v.clone());
                outcome.variable_updates.insert(loop_var.to_string(), v);
            }
        }
        if let Ok(next_val) = eval::evaluate(step, &working) {
            outcome.variable_updates.insert(loop_var.to_string(), next_val);
        }
    }
    outcome
}
