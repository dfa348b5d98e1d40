use crate::{AuditState, Effect, Msg};

/// Pure update function: applies a message to state and returns any effects.
///
/// Messages stamped with a ticket other than the current session's are
/// dropped without touching state.
pub fn update(mut state: AuditState, msg: Msg) -> (AuditState, Vec<Effect>) {
    let effects = match msg {
        Msg::JobOpened { job_id, started_at } => state.open_job(job_id.as_deref(), started_at),
        Msg::JobClosed => state.close_job(),
        Msg::StatusReceived { ticket, snapshot } if state.is_current(ticket) => {
            state.apply_snapshot(snapshot)
        }
        Msg::StatusFailed { ticket, message } if state.is_current(ticket) => {
            state.apply_poll_failure(&message)
        }
        Msg::StepTimerFired { ticket, generation } if state.is_current(ticket) => {
            state.advance_steps(generation)
        }
        Msg::AiPreferenceResolved { ticket, opt_in } if state.is_current(ticket) => {
            state.apply_ai_preference(opt_in)
        }
        Msg::AiInsightsResolved { ticket, result } if state.is_current(ticket) => {
            state.apply_ai_result(result)
        }
        Msg::A11yReportResolved { ticket, result } if state.is_current(ticket) => {
            state.apply_a11y_result(result)
        }
        Msg::StatusReceived { .. }
        | Msg::StatusFailed { .. }
        | Msg::StepTimerFired { .. }
        | Msg::AiPreferenceResolved { .. }
        | Msg::AiInsightsResolved { .. }
        | Msg::A11yReportResolved { .. }
        | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}
