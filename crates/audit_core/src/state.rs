use std::time::{Duration, SystemTime};

use crate::enrichment::{EnrichmentPolicy, EnrichmentState};
use crate::phase::{Phase, PhaseTracker};
use crate::poller::PollBackoff;
use crate::steps::{Narration, StepAnnouncer, DONE_MESSAGE, FAILED_MESSAGE, STEP_INTERVAL};
use crate::view_model::{AuditViewModel, ReportData};
use crate::{
    recommend, A11yReport, Effect, InsightsRequest, Metrics, RecentTest, SiteInfo, StatusSnapshot,
};

/// Identifies one job session; bumped on every job switch.
pub type Ticket = u64;

/// User-facing reason for a job the test runner reported as failed.
pub const UPSTREAM_FAILURE: &str = "Test failed";
/// Reason used when a finished job carries no first-view data.
pub const MISSING_RESULTS: &str = "Test finished without first-view results";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum JobState {
    #[default]
    Idle,
    /// `phase` is `None` until the first status response arrives.
    Polling { phase: Option<Phase> },
    Finished { metrics: Metrics, revealed: bool },
    Errored { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuditState {
    ticket: Ticket,
    policy: EnrichmentPolicy,
    job_id: Option<String>,
    job: JobState,
    tracker: PhaseTracker,
    announcer: StepAnnouncer,
    backoff: PollBackoff,
    step_message: String,
    server_status: String,
    site: SiteInfo,
    started_at: Option<SystemTime>,
    historical: bool,
    loading: bool,
    ai_opt_in: Option<bool>,
    ai_requested: bool,
    a11y_requested: bool,
    ai: EnrichmentState<Vec<String>>,
    a11y: EnrichmentState<A11yReport>,
    recent_recorded: bool,
    dirty: bool,
}

impl AuditState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: EnrichmentPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn ticket(&self) -> Ticket {
        self.ticket
    }

    pub fn job(&self) -> &JobState {
        &self.job
    }

    pub fn policy(&self) -> EnrichmentPolicy {
        self.policy
    }

    pub fn view(&self) -> AuditViewModel {
        let data = match &self.job {
            JobState::Finished {
                metrics,
                revealed: true,
            } => Some(ReportData {
                metrics: metrics.clone(),
                site: self.site.clone(),
            }),
            _ => None,
        };
        let error = match &self.job {
            JobState::Errored { reason } => Some(reason.clone()),
            _ => None,
        };
        let retry_url = error.as_ref().and(self.site.site_url.clone());
        let recommendations = data
            .as_ref()
            .map(|d| {
                recommend::recommendations(&d.metrics)
                    .into_iter()
                    .map(ToOwned::to_owned)
                    .collect()
            })
            .unwrap_or_default();
        let status_text = if self.step_message.is_empty() {
            self.server_status.clone()
        } else {
            self.step_message.clone()
        };

        AuditViewModel {
            job_id: self.job_id.clone(),
            phase: self.tracker.current(),
            status_text,
            loading: self.loading,
            error,
            data,
            is_historical: self.historical,
            started_at: self.started_at,
            ai: self.ai.clone(),
            a11y: self.a11y.clone(),
            recommendations,
            retry_url,
        }
    }

    /// Returns whether anything changed since the last call, clearing the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn is_current(&self, ticket: Ticket) -> bool {
        ticket == self.ticket && !matches!(self.job, JobState::Idle)
    }

    /// Resets every per-job field and starts a new session for `job_id`.
    pub(crate) fn open_job(&mut self, job_id: Option<&str>, started_at: SystemTime) -> Vec<Effect> {
        let mut effects = self.close_job();
        let Some(job_id) = crate::urls::clean_job_id(job_id) else {
            return effects;
        };

        self.job_id = Some(job_id.to_string());
        self.started_at = Some(started_at);
        self.job = JobState::Polling { phase: None };
        effects.push(Effect::ResolveAiPreference {
            ticket: self.ticket,
            job_id: job_id.to_string(),
        });
        effects.push(Effect::PollStatus {
            ticket: self.ticket,
            job_id: job_id.to_string(),
            delay: Duration::ZERO,
        });
        effects
    }

    pub(crate) fn close_job(&mut self) -> Vec<Effect> {
        *self = Self {
            ticket: self.ticket.wrapping_add(1),
            policy: self.policy,
            dirty: true,
            ..Self::default()
        };
        vec![Effect::CancelJobTasks]
    }

    pub(crate) fn apply_snapshot(&mut self, snapshot: StatusSnapshot) -> Vec<Effect> {
        let JobState::Polling { phase: observed } = &self.job else {
            return Vec::new();
        };
        let first_hit = observed.is_none();

        self.site.merge(&snapshot.site);
        if let Some(text) = snapshot.status_text.as_ref().filter(|t| !t.is_empty()) {
            self.server_status = text.clone();
        }
        self.dirty = true;

        let metrics = snapshot.trusted_metrics().cloned();
        if first_hit {
            match (snapshot.phase, &metrics) {
                (Phase::Finished, Some(metrics)) => {
                    self.historical = true;
                    return self.finish(metrics.clone());
                }
                (Phase::Error, _) => {
                    self.historical = true;
                    return self.fail(UPSTREAM_FAILURE);
                }
                _ => self.loading = true,
            }
        }

        match (snapshot.phase, metrics) {
            (Phase::Finished, Some(metrics)) => self.finish(metrics),
            (Phase::Finished, None) => self.fail(MISSING_RESULTS),
            (Phase::Error, _) => self.fail(UPSTREAM_FAILURE),
            (phase, _) => {
                let mut effects = self.commit_progress(phase);
                if let Some(job_id) = self.job_id.clone() {
                    effects.push(Effect::PollStatus {
                        ticket: self.ticket,
                        job_id,
                        delay: self.backoff.next_delay(),
                    });
                }
                effects
            }
        }
    }

    pub(crate) fn apply_poll_failure(&mut self, message: &str) -> Vec<Effect> {
        if !matches!(self.job, JobState::Polling { .. }) {
            return Vec::new();
        }
        let reason = if message.trim().is_empty() {
            "Polling failed"
        } else {
            message
        };
        self.fail(reason)
    }

    pub(crate) fn advance_steps(&mut self, generation: u64) -> Vec<Effect> {
        if generation != self.announcer.generation() {
            return Vec::new();
        }
        let Some(announcement) = self.announcer.tick() else {
            return Vec::new();
        };
        if announcement.promote_to_running {
            return self.commit_progress(Phase::Running);
        }
        self.step_message = announcement.message.to_string();
        self.dirty = true;
        vec![self.arm_step_timer()]
    }

    pub(crate) fn apply_ai_preference(&mut self, opt_in: bool) -> Vec<Effect> {
        if self.ai_opt_in.is_some() {
            return Vec::new();
        }
        self.ai_opt_in = Some(opt_in);
        self.dirty = true;
        self.settle_enrichments()
    }

    pub(crate) fn apply_ai_result(&mut self, result: Result<Vec<String>, String>) -> Vec<Effect> {
        if !self.ai.loading {
            return Vec::new();
        }
        self.ai.settle(result);
        self.dirty = true;
        self.settle_enrichments()
    }

    pub(crate) fn apply_a11y_result(&mut self, result: Result<A11yReport, String>) -> Vec<Effect> {
        if !self.a11y.loading {
            return Vec::new();
        }
        self.a11y.settle(result);
        self.dirty = true;
        self.settle_enrichments()
    }

    /// Commits a queued/running phase and restarts narration when it changed.
    fn commit_progress(&mut self, phase: Phase) -> Vec<Effect> {
        let before = self.tracker.current();
        if !self.tracker.propose(phase) {
            return Vec::new();
        }
        self.job = JobState::Polling { phase: Some(phase) };
        self.dirty = true;
        if before == Some(phase) {
            return Vec::new();
        }
        let narration = match phase {
            Phase::Queued => Narration::Queued,
            Phase::Running => Narration::Running,
            Phase::Finished | Phase::Error => return Vec::new(),
        };
        self.step_message = self.announcer.start(narration).to_string();
        vec![self.arm_step_timer()]
    }

    fn finish(&mut self, metrics: Metrics) -> Vec<Effect> {
        self.tracker.propose(Phase::Finished);
        self.announcer.stop();
        self.step_message = DONE_MESSAGE.to_string();
        self.job = JobState::Finished {
            metrics,
            revealed: false,
        };
        self.dirty = true;

        let mut effects = vec![Effect::ClearStepTimer];
        effects.extend(self.settle_enrichments());
        effects
    }

    fn fail(&mut self, reason: &str) -> Vec<Effect> {
        self.tracker.propose(Phase::Error);
        self.announcer.stop();
        self.step_message = FAILED_MESSAGE.to_string();
        self.job = JobState::Errored {
            reason: reason.to_string(),
        };
        self.loading = false;
        self.dirty = true;
        vec![Effect::ClearStepTimer]
    }

    /// Fires any enrichment that became possible, refreshes narration and
    /// reveals the metrics once the policy allows it.
    fn settle_enrichments(&mut self) -> Vec<Effect> {
        if !matches!(self.job, JobState::Finished { .. }) {
            return Vec::new();
        }
        let mut effects = self.request_enrichments();
        effects.extend(self.refresh_narration());

        let waiting = self.a11y.loading || self.ai.loading || self.ai_opt_in.is_none();
        if waiting && self.policy.blocks(self.historical) {
            self.loading = true;
        } else {
            effects.extend(self.reveal());
        }
        effects
    }

    fn request_enrichments(&mut self) -> Vec<Effect> {
        let JobState::Finished { metrics, .. } = &self.job else {
            return Vec::new();
        };
        let mut effects = Vec::new();

        if !self.a11y_requested {
            if let Some(url) = self.site.site_url.clone() {
                self.a11y_requested = true;
                self.a11y.begin();
                effects.push(Effect::FetchA11yReport {
                    ticket: self.ticket,
                    url,
                });
            }
        }

        if !self.ai_requested && self.ai_opt_in == Some(true) {
            self.ai_requested = true;
            self.ai.begin();
            effects.push(Effect::FetchAiInsights {
                ticket: self.ticket,
                request: InsightsRequest {
                    metrics: metrics.clone(),
                    site_url: self.site.site_url.clone(),
                    site_title: self.site.site_title.clone(),
                    test_id: self.job_id.clone(),
                },
            });
        }

        if !effects.is_empty() {
            self.dirty = true;
        }
        effects
    }

    fn refresh_narration(&mut self) -> Vec<Effect> {
        match Narration::enrichment(self.a11y.loading, self.ai.loading) {
            Some(narration) if self.announcer.narration() == Some(&narration) => Vec::new(),
            Some(narration) => {
                self.step_message = self.announcer.start(narration).to_string();
                vec![self.arm_step_timer()]
            }
            None if self.announcer.narration().is_some() => {
                self.announcer.stop();
                self.step_message = DONE_MESSAGE.to_string();
                vec![Effect::ClearStepTimer]
            }
            None => Vec::new(),
        }
    }

    fn reveal(&mut self) -> Vec<Effect> {
        let JobState::Finished { revealed, .. } = &mut self.job else {
            return Vec::new();
        };
        if *revealed {
            return Vec::new();
        }
        *revealed = true;
        self.loading = false;
        self.dirty = true;

        if self.recent_recorded {
            return Vec::new();
        }
        let Some(test_id) = self.job_id.clone() else {
            return Vec::new();
        };
        self.recent_recorded = true;
        vec![Effect::RecordRecentTest {
            entry: RecentTest {
                test_id,
                url: self.site.site_url.clone(),
                title: self.site.site_title.clone(),
                run_at: self.site.run_at.clone(),
            },
        }]
    }

    fn arm_step_timer(&self) -> Effect {
        Effect::ArmStepTimer {
            ticket: self.ticket,
            generation: self.announcer.generation(),
            delay: STEP_INTERVAL,
        }
    }
}
