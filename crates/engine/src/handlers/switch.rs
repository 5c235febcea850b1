use super::{HandlerContext, HandlerOutcome};
use crate::eval;
use cah_core::error::ErrorCategory;
use cah_core::workflow::SwitchCase;
use serde_json::json;

fn stringify(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Evaluates `expression` once, picks the first case whose `value`
/// matches (string comparison against the stringified result), falling
/// back to the `default` case (the one with `value: None`) if present.
/// Every case target that was *not* picked is marked `skipped` so a
/// downstream `join` doesn't wait on an unreachable branch forever.
pub fn handle(expression: &str, cases: &[SwitchCase], ctx: &HandlerContext) -> HandlerOutcome {
    let result = match eval::evaluate(expression, &ctx.eval) {
        Ok(v) => v,
        Err(e) => return HandlerOutcome::failed(format!("switch expression failed: {e}"), ErrorCategory::Permanent),
    };
    let needle = stringify(&result);

    let chosen = cases
        .iter()
        .find(|c| c.value.as_deref() == Some(needle.as_str()))
        .or_else(|| cases.iter().find(|c| c.value.is_none()));

    let Some(chosen) = chosen else {
        return HandlerOutcome::failed(format!("switch value '{needle}' matched no case and there is no default"), ErrorCategory::Permanent);
    };

    let mut outcome = HandlerOutcome::done();
    outcome.output = Some(json!(needle));
    outcome.skip_nodes = cases
        .iter()
        .filter(|c| c.target_node != chosen.target_node)
        .map(|c| c.target_node.clone())
        .collect();
    outcome
}
