use super::{HandlerContext, HandlerOutcome};
use crate::eval;
use cah_core::error::ErrorCategory;
use cah_core::workflow::{ForeachMode, NodeId};
use serde_json::{json, Value as JsonValue};

fn items_key(node_id: &NodeId) -> String {
    format!("__foreach_items::{node_id}")
}

fn index_key(node_id: &NodeId) -> String {
    format!("__foreach_index::{node_id}")
}

/// Like [`super::loop_node`], `foreach` is a controller that emits a
/// `has_more` boolean output routing back into its body or out past
/// it, binding `item_var`/`index_var` to the current element each
/// pass. `collection` is evaluated once (on the first pass) and
/// snapshotted, so later mutation of the source variable doesn't
/// reshuffle iteration mid-run.
///
/// True concurrent fan-out for `mode: parallel` is out of scope for a
/// single controller node — items are still retired one at a time
/// through the queue. Genuine concurrency is what the `parallel`/
/// `join` node pair is for.
pub fn handle(
    node_id: &NodeId,
    collection: &str,
    item_var: &str,
    index_var: Option<&str>,
    _body_nodes: &[NodeId],
    _mode: ForeachMode,
    _max_parallel: Option<u32>,
    ctx: &HandlerContext,
) -> HandlerOutcome {
    let ik = items_key(node_id);
    let xk = index_key(node_id);

    let items = match ctx.eval.variables.get(&ik) {
        Some(JsonValue::Array(items)) => items.clone(),
        _ => match eval::evaluate(collection, &ctx.eval) {
            Ok(JsonValue::Array(items)) => items,
            Ok(other) => return HandlerOutcome::failed(format!("foreach collection did not evaluate to an array, got {other}"), ErrorCategory::Permanent),
            Err(e) => return HandlerOutcome::failed(format!("foreach collection expression failed: {e}"), ErrorCategory::Permanent),
        },
    };

    let index = ctx.eval.variables.get(&xk).and_then(|v| v.as_u64()).unwrap_or(0) as usize;
    let mut outcome = HandlerOutcome::done();

    if index >= items.len() {
        outcome.output = Some(json!(false));
        outcome.variable_updates.insert(ik, JsonValue::Null);
        outcome.variable_updates.insert(xk, JsonValue::Null);
        return outcome;
    }

    outcome.output = Some(json!(true));
    outcome.variable_updates.insert(ik, JsonValue::Array(items.clone()));
    outcome.variable_updates.insert(item_var.to_string(), items[index].clone());
    if let Some(idx_name) = index_var {
        outcome.variable_updates.insert(idx_name.to_string(), json!(index));
    }
    outcome.variable_updates.insert(xk, json!(index as u64 + 1));
    outcome
}
