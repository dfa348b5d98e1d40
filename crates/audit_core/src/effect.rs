use std::time::Duration;

use crate::{InsightsRequest, RecentTest, Ticket};

/// Work requested by [`crate::update`]; executed by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Abort every timer and request belonging to earlier sessions.
    CancelJobTasks,
    ResolveAiPreference {
        ticket: Ticket,
        job_id: String,
    },
    PollStatus {
        ticket: Ticket,
        job_id: String,
        delay: Duration,
    },
    /// (Re)arms the single narration timer, replacing any pending one.
    ArmStepTimer {
        ticket: Ticket,
        generation: u64,
        delay: Duration,
    },
    ClearStepTimer,
    FetchAiInsights {
        ticket: Ticket,
        request: InsightsRequest,
    },
    FetchA11yReport {
        ticket: Ticket,
        url: String,
    },
    RecordRecentTest {
        entry: RecentTest,
    },
}
