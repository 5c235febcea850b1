use super::*;
use serde_json::json;

fn ctx_with(vars: &[(&str, JsonValue)]) -> EvalContext {
    let mut ctx = EvalContext::default();
    for (k, v) in vars {
        ctx.variables.insert((*k).to_string(), v.clone());
    }
    ctx
}

#[test]
fn evaluates_simple_comparison() {
    let ctx = ctx_with(&[("count", json!(5))]);
    assert!(evaluate_bool("count > 3", &ctx));
    assert!(!evaluate_bool("count > 10", &ctx));
}

#[test]
fn evaluates_dotted_member_access() {
    let ctx = ctx_with(&[("user", json!({"name": "ava", "age": 30}))]);
    assert_eq!(evaluate("user.name", &ctx).unwrap(), json!("ava"));
    assert!(evaluate_bool("user.age >= 18", &ctx));
}

#[test]
fn evaluates_outputs_namespace() {
    let mut ctx = EvalContext::default();
    ctx.outputs.insert("fetch_data".to_string(), json!({"status": "ok"}));
    assert!(evaluate_bool("outputs.fetch_data.status == 'ok'", &ctx));
}

#[test]
fn evaluates_boolean_operators() {
    let ctx = ctx_with(&[("a", json!(true)), ("b", json!(false))]);
    assert!(evaluate_bool("a && !b", &ctx));
    assert!(evaluate_bool("a || b", &ctx));
    assert!(!evaluate_bool("!a && b", &ctx));
}

#[test]
fn evaluates_in_membership() {
    let ctx = ctx_with(&[("role", json!("admin")), ("roles", json!(["admin", "owner"]))]);
    assert!(evaluate_bool("role in roles", &ctx));
    assert!(!evaluate_bool("'guest' in roles", &ctx));
}

#[test]
fn evaluates_arithmetic() {
    let ctx = ctx_with(&[("x", json!(3)), ("y", json!(4))]);
    assert_eq!(evaluate("x + y * 2", &ctx).unwrap(), json!(11.0));
}

#[test]
fn unknown_identifier_is_an_error_but_evaluate_bool_swallows_it() {
    let ctx = EvalContext::default();
    assert!(evaluate("missing > 1", &ctx).is_err());
    assert!(!evaluate_bool("missing > 1", &ctx));
}

#[test]
fn malformed_expression_never_panics() {
    let ctx = EvalContext::default();
    assert!(!evaluate_bool("((unterminated", &ctx));
    assert!(!evaluate_bool("", &ctx));
}
