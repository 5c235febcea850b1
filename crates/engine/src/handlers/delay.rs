use super::{HandlerContext, HandlerOutcome};
use cah_core::workflow::{DelayUnit, NodeId};
use serde_json::{json, Value as JsonValue};

fn scratch_key(node_id: &NodeId) -> String {
    format!("__delay_until::{node_id}")
}

/// First dispatch computes and records the fire time; every later
/// dispatch (re-enqueued by the worker after `delay_ms`) just checks
/// whether that time has passed.
pub fn handle(node_id: &NodeId, value: u64, unit: DelayUnit, ctx: &HandlerContext) -> HandlerOutcome {
    let key = scratch_key(node_id);
    match ctx.eval.variables.get(&key).and_then(|v| v.as_u64()) {
        Some(until_ms) if ctx.now_ms >= until_ms => {
            let mut outcome = HandlerOutcome::done();
            // clear the scratch variable so a retried run of this node
            // (loop body re-entry) recomputes its own fire time
            outcome.variable_updates.insert(key, JsonValue::Null);
            outcome
        }
        Some(until_ms) => HandlerOutcome::retry(until_ms.saturating_sub(ctx.now_ms)),
        None => {
            let until_ms = ctx.now_ms + unit.to_ms(value);
            let mut outcome = HandlerOutcome::retry(until_ms.saturating_sub(ctx.now_ms));
            outcome.variable_updates.insert(key, json!(until_ms));
            outcome
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::EvalContext;
    use std::collections::HashMap;

    fn ctx(now_ms: u64, vars: EvalContext) -> HandlerContext<'static> {
        HandlerContext {
            eval: vars,
            now_ms,
            loop_counts: Box::leak(Box::new(HashMap::new())),
        }
    }

    #[test]
    fn first_dispatch_schedules_and_retries() {
        let outcome = handle(&NodeId::new("d1"), 5, DelayUnit::Seconds, &ctx(1000, EvalContext::default()));
        assert!(matches!(outcome.status, Some(super::HandlerStatus::Retry { delay_ms: 5000 })));
    }

    #[test]
    fn completes_once_fire_time_passed() {
        let mut eval = EvalContext::default();
        eval.variables.insert("__delay_until::d1".into(), json!(1500));
        let outcome = handle(&NodeId::new("d1"), 5, DelayUnit::Seconds, &ctx(2000, eval));
        assert_eq!(outcome.status, Some(super::HandlerStatus::Done));
    }
}
