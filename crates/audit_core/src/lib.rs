//! Audit core: pure polling/enrichment state machine and view-model helpers.
mod effect;
mod enrichment;
mod model;
mod msg;
mod phase;
mod poller;
mod recent;
mod recommend;
mod state;
mod steps;
mod update;
mod urls;
mod view_model;

pub use effect::Effect;
pub use enrichment::{EnrichmentPolicy, EnrichmentState};
pub use model::{
    A11yReport, A11ySummary, Impact, InsightsRequest, Metrics, RecentTest, SiteInfo,
    StatusSnapshot, Violation, ViolationNode,
};
pub use msg::Msg;
pub use phase::{Phase, PhaseTracker};
pub use poller::{PollBackoff, INITIAL_POLL_INTERVAL, MAX_POLL_INTERVAL, POLL_STEP};
pub use recent::{push_recent, RECENT_TESTS_LIMIT};
pub use recommend::recommendations;
pub use state::{AuditState, JobState, Ticket, MISSING_RESULTS, UPSTREAM_FAILURE};
pub use steps::{
    announce, Announcement, Narration, StepAnnouncer, A11Y_STEPS, AI_STEPS, DONE_MESSAGE,
    FAILED_MESSAGE, QUEUED_STEPS, RUNNING_STEPS, STEP_INTERVAL,
};
pub use update::update;
pub use urls::{clean_job_id, is_http_url, normalize_url_for_dedupe};
pub use view_model::{AuditViewModel, ReportData};
