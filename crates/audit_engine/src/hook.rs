use std::future::Future;
use std::sync::Arc;
use std::time::SystemTime;

use audit_core::{update, AuditState, AuditViewModel, Effect, EnrichmentPolicy, InsightsRequest, Msg};
use audit_logging::{audit_debug, audit_error, audit_info, audit_warn};
use tokio::sync::{mpsc, watch};
use tokio::task::{AbortHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::session::SessionRecords;
use crate::sources::{A11ySource, InsightsSource, StatusSource};

/// Everything the hook talks to.
#[derive(Clone)]
pub struct HookDeps {
    pub status: Arc<dyn StatusSource>,
    pub insights: Arc<dyn InsightsSource>,
    pub a11y: Arc<dyn A11ySource>,
    pub records: Arc<SessionRecords>,
}

/// Background work of the current job session. Dropping it aborts every
/// task, timers included.
#[derive(Default)]
struct JobTasks {
    token: CancellationToken,
    set: JoinSet<()>,
    step_timer: Option<AbortHandle>,
}

impl JobTasks {
    fn clear_step_timer(&mut self) {
        if let Some(handle) = self.step_timer.take() {
            handle.abort();
        }
    }
}

/// Client runtime for one audit view: owns the state, runs effects on tokio
/// and feeds their results back through [`update`].
///
/// Must be used from within a tokio runtime.
pub struct AuditHook {
    state: AuditState,
    deps: HookDeps,
    msg_tx: mpsc::UnboundedSender<Msg>,
    msg_rx: mpsc::UnboundedReceiver<Msg>,
    tasks: JobTasks,
    /// Recent-test writes; they outlive the job session that issued them.
    writes: JoinSet<()>,
    view_tx: watch::Sender<AuditViewModel>,
}

impl AuditHook {
    pub fn new(deps: HookDeps, policy: EnrichmentPolicy) -> Self {
        let state = AuditState::with_policy(policy);
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let (view_tx, _) = watch::channel(state.view());
        Self {
            state,
            deps,
            msg_tx,
            msg_rx,
            tasks: JobTasks::default(),
            writes: JoinSet::new(),
            view_tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<AuditViewModel> {
        self.view_tx.subscribe()
    }

    pub fn view(&self) -> AuditViewModel {
        self.state.view()
    }

    /// Background tasks still owned by the current job session.
    pub fn pending_tasks(&self) -> usize {
        self.tasks.set.len()
    }

    /// Switches to `job_id`; `None` or a blank id leaves the hook idle.
    pub fn open(&mut self, job_id: Option<&str>) {
        self.dispatch(Msg::JobOpened {
            job_id: job_id.map(str::to_string),
            started_at: SystemTime::now(),
        });
    }

    pub fn close(&mut self) {
        self.dispatch(Msg::JobClosed);
    }

    pub fn dispatch(&mut self, msg: Msg) {
        let state = std::mem::take(&mut self.state);
        let (next, effects) = update(state, msg);
        self.state = next;
        if self.state.consume_dirty() {
            self.view_tx.send_replace(self.state.view());
        }
        for effect in effects {
            self.run_effect(effect);
        }
    }

    /// Applies the next message produced by background work. Returns `false`
    /// once nothing is queued and no task is left that could produce one;
    /// pending recent-test writes are awaited first.
    pub async fn process_next(&mut self) -> bool {
        loop {
            if let Ok(msg) = self.msg_rx.try_recv() {
                self.dispatch(msg);
                return true;
            }
            if self.tasks.set.is_empty() {
                while let Some(joined) = self.writes.join_next().await {
                    if let Err(err) = joined {
                        audit_error!("Recent test write failed: {}", err);
                    }
                }
                return false;
            }
            tokio::select! {
                biased;
                Some(msg) = self.msg_rx.recv() => {
                    self.dispatch(msg);
                    return true;
                }
                joined = self.tasks.set.join_next() => {
                    if let Some(Err(err)) = joined {
                        if err.is_panic() {
                            audit_error!("Background task panicked: {}", err);
                        }
                    }
                }
            }
        }
    }

    /// Drives the job until it settles.
    pub async fn run_until_idle(&mut self) {
        while self.process_next().await {}
    }

    fn run_effect(&mut self, effect: Effect) {
        match effect {
            Effect::CancelJobTasks => {
                self.tasks.token.cancel();
                // Dropping the set aborts whatever is still running.
                self.tasks = JobTasks::default();
            }
            Effect::ResolveAiPreference { ticket, job_id } => {
                let records = Arc::clone(&self.deps.records);
                self.spawn(async move {
                    let opt_in = records.ai_preference(&job_id).await;
                    Some(Msg::AiPreferenceResolved { ticket, opt_in })
                });
            }
            Effect::PollStatus {
                ticket,
                job_id,
                delay,
            } => {
                let status = Arc::clone(&self.deps.status);
                self.spawn(async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    audit_debug!("Polling job={}", job_id);
                    Some(match status.check_status(&job_id).await {
                        Ok(snapshot) => Msg::StatusReceived { ticket, snapshot },
                        Err(err) => {
                            audit_warn!("Status poll failed job={} error={}", job_id, err);
                            Msg::StatusFailed {
                                ticket,
                                message: err.to_string(),
                            }
                        }
                    })
                });
            }
            Effect::ArmStepTimer {
                ticket,
                generation,
                delay,
            } => {
                self.tasks.clear_step_timer();
                let handle = self.spawn(async move {
                    tokio::time::sleep(delay).await;
                    Some(Msg::StepTimerFired { ticket, generation })
                });
                self.tasks.step_timer = Some(handle);
            }
            Effect::ClearStepTimer => self.tasks.clear_step_timer(),
            Effect::FetchAiInsights { ticket, request } => {
                let records = Arc::clone(&self.deps.records);
                let insights = Arc::clone(&self.deps.insights);
                self.spawn(async move {
                    let result = fetch_insights(&records, insights.as_ref(), &request).await;
                    Some(Msg::AiInsightsResolved { ticket, result })
                });
            }
            Effect::FetchA11yReport { ticket, url } => {
                let a11y = Arc::clone(&self.deps.a11y);
                self.spawn(async move {
                    let result = a11y.scan(&url).await.map_err(|err| {
                        audit_warn!("Accessibility report unavailable url={} error={}", url, err);
                        err.to_string()
                    });
                    Some(Msg::A11yReportResolved { ticket, result })
                });
            }
            Effect::RecordRecentTest { entry } => {
                let records = Arc::clone(&self.deps.records);
                audit_info!("Recording recent test id={}", entry.test_id);
                self.writes.spawn(async move {
                    records.record_recent(entry).await;
                });
            }
        }
    }

    /// Spawns `work` into the current session; its message is delivered only
    /// while the session has not been cancelled.
    fn spawn<F>(&mut self, work: F) -> AbortHandle
    where
        F: Future<Output = Option<Msg>> + Send + 'static,
    {
        let token = self.tasks.token.clone();
        let tx = self.msg_tx.clone();
        self.tasks.set.spawn(async move {
            let msg = tokio::select! {
                _ = token.cancelled() => None,
                msg = work => msg,
            };
            if let Some(msg) = msg.filter(|_| !token.is_cancelled()) {
                let _ = tx.send(msg);
            }
        })
    }
}

/// Local cache first, then the source; a fresh answer is kept locally.
async fn fetch_insights(
    records: &SessionRecords,
    insights: &dyn InsightsSource,
    request: &InsightsRequest,
) -> Result<Vec<String>, String> {
    let test_id = request.test_id.as_deref();
    if let Some(test_id) = test_id {
        if let Some(cached) = records.cached_insights(test_id).await {
            return Ok(cached);
        }
    }
    match insights.insights(request).await {
        Ok(suggestions) => {
            if let Some(test_id) = test_id {
                records.store_insights(test_id, &suggestions).await;
            }
            Ok(suggestions)
        }
        Err(err) => {
            audit_warn!("AI insights unavailable: {}", err);
            Err(err.to_string())
        }
    }
}
