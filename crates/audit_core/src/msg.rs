use std::time::SystemTime;

use crate::{A11yReport, StatusSnapshot, Ticket};

/// Inputs to [`crate::update`]. Everything produced by background work carries
/// the ticket of the job session that requested it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Consumer switched to a job id (or to none).
    JobOpened {
        job_id: Option<String>,
        started_at: SystemTime,
    },
    /// Consumer went away.
    JobClosed,
    /// A status poll came back.
    StatusReceived {
        ticket: Ticket,
        snapshot: StatusSnapshot,
    },
    /// A status poll failed at the transport level.
    StatusFailed { ticket: Ticket, message: String },
    /// Narration interval elapsed for the narration `generation`.
    StepTimerFired { ticket: Ticket, generation: u64 },
    /// Per-job AI opt-in read from the preference stores.
    AiPreferenceResolved { ticket: Ticket, opt_in: bool },
    AiInsightsResolved {
        ticket: Ticket,
        result: Result<Vec<String>, String>,
    },
    A11yReportResolved {
        ticket: Ticket,
        result: Result<A11yReport, String>,
    },
    /// Fallback for placeholder wiring.
    NoOp,
}
