use super::{HandlerContext, HandlerOutcome};
use cah_core::error::ErrorCategory;
use cah_core::workflow::NodeId;
use chrono::{DateTime, Utc};
use serde_json::{json, Value as JsonValue};

fn scratch_key(node_id: &NodeId) -> String {
    format!("__schedule_until::{node_id}")
}

/// Either a fixed `datetime` (RFC3339) or a `cron` expression (with an
/// optional IANA `timezone`, UTC otherwise) must be set — node
/// construction from the planner is expected to enforce this, but a
/// misconfigured node fails permanently rather than looping forever.
pub fn handle(node_id: &NodeId, cron: Option<&str>, datetime: Option<&str>, timezone: Option<&str>, ctx: &HandlerContext) -> HandlerOutcome {
    let key = scratch_key(node_id);
    if let Some(until_ms) = ctx.eval.variables.get(&key).and_then(|v| v.as_u64()) {
        if ctx.now_ms >= until_ms {
            let mut outcome = HandlerOutcome::done();
            outcome.variable_updates.insert(key, JsonValue::Null);
            return outcome;
        }
        return HandlerOutcome::retry(until_ms.saturating_sub(ctx.now_ms));
    }

    let now = DateTime::<Utc>::from_timestamp_millis(ctx.now_ms as i64).unwrap_or_else(Utc::now);
    let next = if let Some(dt) = datetime {
        match DateTime::parse_from_rfc3339(dt) {
            Ok(parsed) => Some(parsed.with_timezone(&Utc)),
            Err(e) => return HandlerOutcome::failed(format!("invalid schedule datetime '{dt}': {e}"), ErrorCategory::Permanent),
        }
    } else if let Some(expr) = cron {
        match cah_adapters::next_fire_after(expr, timezone, now) {
            Ok(next) => Some(next),
            Err(e) => return HandlerOutcome::failed(format!("invalid schedule cron: {e}"), ErrorCategory::Permanent),
        }
    } else {
        return HandlerOutcome::failed("schedule node has neither cron nor datetime configured", ErrorCategory::Permanent);
    };

    let Some(next) = next else {
        return HandlerOutcome::failed("schedule node could not compute a fire time", ErrorCategory::Permanent);
    };
    let until_ms = next.timestamp_millis().max(0) as u64;
    let mut outcome = HandlerOutcome::retry(until_ms.saturating_sub(ctx.now_ms));
    outcome.variable_updates.insert(key, json!(until_ms));
    outcome
}
