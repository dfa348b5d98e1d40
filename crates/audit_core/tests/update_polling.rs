use std::sync::Once;
use std::time::{Duration, SystemTime};

use audit_core::{
    update, AuditState, Effect, JobState, Metrics, Msg, Phase, SiteInfo, StatusSnapshot, Ticket,
    A11Y_STEPS, QUEUED_STEPS, RUNNING_STEPS, STEP_INTERVAL, UPSTREAM_FAILURE,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(audit_logging::initialize_for_tests);
}

fn open(job_id: &str) -> (AuditState, Vec<Effect>) {
    update(
        AuditState::new(),
        Msg::JobOpened {
            job_id: Some(job_id.to_string()),
            started_at: SystemTime::UNIX_EPOCH,
        },
    )
}

fn receive(state: AuditState, snapshot: StatusSnapshot) -> (AuditState, Vec<Effect>) {
    let ticket = state.ticket();
    update(state, Msg::StatusReceived { ticket, snapshot })
}

fn snapshot(phase: Phase) -> StatusSnapshot {
    StatusSnapshot {
        site: SiteInfo {
            site_url: Some("https://a.test".to_string()),
            ..SiteInfo::default()
        },
        ..StatusSnapshot::new(phase)
    }
}

fn finished(requests: u64) -> StatusSnapshot {
    StatusSnapshot {
        metrics: Some(Metrics {
            ttfb_ms: 120,
            fcp_ms: 900,
            speed_index_ms: 1500,
            requests,
            transferred_bytes: 4096,
            ..Metrics::default()
        }),
        ..snapshot(Phase::Finished)
    }
}

fn armed_generation(effects: &[Effect]) -> u64 {
    effects
        .iter()
        .rev()
        .find_map(|effect| match effect {
            Effect::ArmStepTimer { generation, .. } => Some(*generation),
            _ => None,
        })
        .expect("step timer armed")
}

fn poll_delays(effects: &[Effect]) -> Vec<Duration> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::PollStatus { delay, .. } => Some(*delay),
            _ => None,
        })
        .collect()
}

#[test]
fn opening_a_job_polls_immediately_and_resolves_preference() {
    init_logging();
    let (state, effects) = open("abc123");
    let ticket = state.ticket();

    assert_eq!(
        effects,
        vec![
            Effect::CancelJobTasks,
            Effect::ResolveAiPreference {
                ticket,
                job_id: "abc123".to_string(),
            },
            Effect::PollStatus {
                ticket,
                job_id: "abc123".to_string(),
                delay: Duration::ZERO,
            },
        ]
    );
    let view = state.view();
    assert_eq!(view.phase, None);
    assert!(!view.loading);
    assert!(view.started_at.is_some());
}

#[test]
fn opening_without_job_id_only_cancels() {
    init_logging();
    let (state, effects) = update(
        AuditState::new(),
        Msg::JobOpened {
            job_id: Some("  ".to_string()),
            started_at: SystemTime::UNIX_EPOCH,
        },
    );
    assert_eq!(effects, vec![Effect::CancelJobTasks]);
    assert_eq!(state.job(), &JobState::Idle);
    assert_eq!(state.view().started_at, None);
}

#[test]
fn queued_running_finished_sequence_reveals_metrics() {
    init_logging();
    let (state, _) = open("abc");

    let (state, effects) = receive(state, snapshot(Phase::Queued));
    assert_eq!(state.view().phase, Some(Phase::Queued));
    assert!(state.view().loading);
    assert_eq!(state.view().status_text, QUEUED_STEPS[0]);
    assert_eq!(poll_delays(&effects), vec![Duration::from_millis(3000)]);

    let (state, effects) = receive(state, snapshot(Phase::Running));
    assert_eq!(state.view().phase, Some(Phase::Running));
    assert_eq!(state.view().status_text, RUNNING_STEPS[0]);
    assert_eq!(poll_delays(&effects), vec![Duration::from_millis(4000)]);

    let (state, effects) = receive(state, finished(5));
    let view = state.view();
    assert_eq!(view.phase, Some(Phase::Finished));
    assert!(!view.loading);
    assert!(!view.is_historical);
    assert_eq!(view.data.as_ref().unwrap().metrics.requests, 5);
    assert!(poll_delays(&effects).is_empty());
    assert!(effects.contains(&Effect::ClearStepTimer));
    assert!(effects
        .iter()
        .any(|e| matches!(e, Effect::RecordRecentTest { entry } if entry.test_id == "abc")));
}

#[test]
fn poll_delay_caps_at_six_seconds() {
    init_logging();
    let (mut state, _) = open("abc");
    let mut delays = Vec::new();
    for _ in 0..6 {
        let (next, effects) = receive(state, snapshot(Phase::Running));
        delays.extend(poll_delays(&effects));
        state = next;
    }
    let millis: Vec<_> = delays.iter().map(Duration::as_millis).collect();
    assert_eq!(millis, vec![3000, 4000, 5000, 6000, 6000, 6000]);
}

#[test]
fn single_error_snapshot_fails_and_halts_polling() {
    init_logging();
    let (state, _) = open("abc");
    let (state, effects) = receive(state, snapshot(Phase::Error));

    let view = state.view();
    assert_eq!(view.phase, Some(Phase::Error));
    assert_eq!(view.error.as_deref(), Some(UPSTREAM_FAILURE));
    assert!(!view.loading);
    assert_eq!(view.retry_url.as_deref(), Some("https://a.test"));
    assert!(poll_delays(&effects).is_empty());
    assert_eq!(effects, vec![Effect::ClearStepTimer]);

    // Nothing applies once terminal.
    let (after, effects) = receive(state.clone(), snapshot(Phase::Running));
    assert_eq!(after.view().phase, Some(Phase::Error));
    assert!(effects.is_empty());
}

#[test]
fn historical_finished_load_skips_narration() {
    init_logging();
    let (state, _) = open("old");
    let (state, effects) = receive(state, finished(9));

    let view = state.view();
    assert!(view.is_historical);
    assert_eq!(view.phase, Some(Phase::Finished));
    assert_eq!(view.data.unwrap().metrics.requests, 9);
    assert!(!effects
        .iter()
        .any(|e| matches!(e, Effect::PollStatus { .. })));
    // Only the enrichment narration runs; the queued/running lists never show.
    assert!(view.a11y.loading);
    assert_eq!(view.status_text, A11Y_STEPS[0]);
}

#[test]
fn historical_error_load_is_terminal_immediately() {
    init_logging();
    let (state, _) = open("old");
    let (state, _) = receive(state, StatusSnapshot::new(Phase::Error));
    let view = state.view();
    assert!(view.is_historical);
    assert_eq!(view.phase, Some(Phase::Error));
    assert_eq!(view.error.as_deref(), Some(UPSTREAM_FAILURE));
    assert_eq!(view.retry_url, None);
}

#[test]
fn phase_never_moves_backwards() {
    init_logging();
    let sequences: Vec<Vec<Phase>> = vec![
        vec![Phase::Running, Phase::Queued, Phase::Running, Phase::Queued],
        vec![Phase::Queued, Phase::Queued, Phase::Running, Phase::Queued, Phase::Error],
        vec![Phase::Queued, Phase::Running, Phase::Running, Phase::Queued],
    ];
    for sequence in sequences {
        let (mut state, _) = open("mono");
        let mut seen: Vec<Phase> = Vec::new();
        for phase in sequence {
            let (next, _) = receive(state, snapshot(phase));
            seen.extend(next.view().phase);
            state = next;
        }
        assert!(
            seen.windows(2).all(|w| w[0] <= w[1]),
            "regressed: {seen:?}"
        );
    }
}

#[test]
fn transport_failure_becomes_terminal_error() {
    init_logging();
    let (state, _) = open("abc");
    let (state, _) = receive(state, snapshot(Phase::Queued));
    let ticket = state.ticket();
    let (state, effects) = update(
        state,
        Msg::StatusFailed {
            ticket,
            message: "connection reset".to_string(),
        },
    );
    let view = state.view();
    assert_eq!(view.phase, Some(Phase::Error));
    assert_eq!(view.error.as_deref(), Some("connection reset"));
    assert_eq!(effects, vec![Effect::ClearStepTimer]);
}

#[test]
fn stale_ticket_updates_are_dropped() {
    init_logging();
    let (state, _) = open("job-a");
    let stale: Ticket = state.ticket();
    let (state, _) = update(
        state,
        Msg::JobOpened {
            job_id: Some("job-b".to_string()),
            started_at: SystemTime::UNIX_EPOCH,
        },
    );
    assert_ne!(state.ticket(), stale);

    let (next, effects) = update(
        state.clone(),
        Msg::StatusReceived {
            ticket: stale,
            snapshot: finished(5),
        },
    );
    assert_eq!(next, state);
    assert!(effects.is_empty());
    assert_eq!(next.view().job_id.as_deref(), Some("job-b"));
    assert_eq!(next.view().data, None);
}

#[test]
fn two_queued_ticks_promote_to_running() {
    init_logging();
    let (state, _) = open("abc");
    let (state, effects) = receive(state, snapshot(Phase::Queued));
    let ticket = state.ticket();
    let generation = armed_generation(&effects);

    let (state, effects) = update(state, Msg::StepTimerFired { ticket, generation });
    assert_eq!(state.view().status_text, QUEUED_STEPS[1]);
    assert_eq!(state.view().phase, Some(Phase::Queued));
    assert_eq!(
        effects,
        vec![Effect::ArmStepTimer {
            ticket,
            generation,
            delay: STEP_INTERVAL
        }]
    );

    let (state, _) = update(state, Msg::StepTimerFired { ticket, generation });
    assert_eq!(state.view().phase, Some(Phase::Running));
    assert_eq!(state.view().status_text, RUNNING_STEPS[0]);

    // The server still says queued; the promotion is not undone.
    let (state, _) = receive(state, snapshot(Phase::Queued));
    assert_eq!(state.view().phase, Some(Phase::Running));
}

#[test]
fn running_narration_holds_on_last_step() {
    init_logging();
    let (state, _) = open("abc");
    let (mut state, effects) = receive(state, snapshot(Phase::Running));
    let ticket = state.ticket();
    let generation = armed_generation(&effects);
    for _ in 0..RUNNING_STEPS.len() + 3 {
        let (next, effects) = update(state, Msg::StepTimerFired { ticket, generation });
        assert_eq!(effects.len(), 1, "heartbeat keeps re-arming");
        state = next;
    }
    assert_eq!(state.view().status_text, *RUNNING_STEPS.last().unwrap());
    assert_eq!(state.view().phase, Some(Phase::Running));
}

#[test]
fn closing_resets_everything() {
    init_logging();
    let (state, _) = open("abc");
    let (state, _) = receive(state, finished(5));
    let (mut state, effects) = update(state, Msg::JobClosed);
    assert_eq!(effects, vec![Effect::CancelJobTasks]);
    assert!(state.consume_dirty());
    let view = state.view();
    assert_eq!(view.job_id, None);
    assert_eq!(view.data, None);
    assert_eq!(view.phase, None);
}

#[test]
fn finished_without_metrics_is_reported_as_failure() {
    init_logging();
    let (state, _) = open("abc");
    let (state, _) = receive(state, snapshot(Phase::Running));
    let (state, effects) = receive(state, snapshot(Phase::Finished));
    assert_eq!(state.view().phase, Some(Phase::Error));
    assert!(poll_delays(&effects).is_empty());
}

#[test]
fn tick_armed_for_an_earlier_narration_is_ignored() {
    init_logging();
    let (state, _) = open("abc");
    let (state, effects) = receive(state, snapshot(Phase::Running));
    let ticket = state.ticket();
    let running = armed_generation(&effects);

    // Finishing restarts narration for the pending accessibility scan.
    let (state, effects) = receive(state, finished(5));
    let enrichment = armed_generation(&effects);
    assert_ne!(enrichment, running);
    assert_eq!(state.view().status_text, A11Y_STEPS[0]);

    let (state, effects) = update(
        state,
        Msg::StepTimerFired {
            ticket,
            generation: running,
        },
    );
    assert!(effects.is_empty());
    assert_eq!(state.view().status_text, A11Y_STEPS[0]);

    let (state, _) = update(
        state,
        Msg::StepTimerFired {
            ticket,
            generation: enrichment,
        },
    );
    assert_eq!(state.view().status_text, A11Y_STEPS[1]);
}
