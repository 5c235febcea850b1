use super::{HandlerContext, HandlerOutcome};
use crate::eval;
use serde_json::json;

/// Evaluates `expression` and records the boolean result as the node's
/// own output (`outputs.<node_id>`), so downstream edges can route on
/// `outputs.<node_id> == true`.
pub fn handle(expression: &str, ctx: &HandlerContext) -> HandlerOutcome {
    let result = eval::evaluate_bool(expression, &ctx.eval);
    HandlerOutcome {
        output: Some(json!(result)),
        ..HandlerOutcome::done()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn records_boolean_result_as_output() {
        let mut eval_ctx = eval::EvalContext::default();
        eval_ctx.variables.insert("x".into(), json!(5));
        let ctx = HandlerContext {
            eval: eval_ctx,
            now_ms: 0,
            loop_counts: &HashMap::new(),
        };
        let outcome = handle("x > 3", &ctx);
        assert_eq!(outcome.output, Some(json!(true)));
    }
}
