use super::HandlerOutcome;

/// `join` nodes do no work themselves; the worker only dispatches one
/// once every incoming branch has settled (see
/// `state_manager::join_inputs_settled`), so by the time this runs
/// there is nothing left to check.
pub fn handle() -> HandlerOutcome {
    HandlerOutcome::done()
}
