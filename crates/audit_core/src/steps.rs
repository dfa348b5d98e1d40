//! Cosmetic progress narration. Nothing here is consulted for correctness.
use std::time::Duration;

pub const STEP_INTERVAL: Duration = Duration::from_millis(4000);

pub const QUEUED_STEPS: &[&str] = &[
    "Waiting for a test agent…",
    "Reserving an available browser…",
];

pub const RUNNING_STEPS: &[&str] = &[
    "Launching a clean browser…",
    "Fetching the page…",
    "Measuring paint timings…",
    "Collecting network waterfall…",
    "Finalizing results…",
];

pub const A11Y_STEPS: &[&str] = &[
    "Running accessibility checks…",
    "Checking contrast, labels and landmarks…",
];

pub const AI_STEPS: &[&str] = &[
    "Generating AI insights…",
    "Analyzing performance data…",
    "Crafting recommendations…",
];

pub const DONE_MESSAGE: &str = "Done";
pub const FAILED_MESSAGE: &str = "The test failed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Narration {
    Queued,
    Running,
    /// Post-finish waiting, assembled from the enrichments actually pending.
    Enrichment(Vec<&'static str>),
}

impl Narration {
    pub fn enrichment(a11y_pending: bool, ai_pending: bool) -> Option<Self> {
        let mut steps = Vec::new();
        if a11y_pending {
            steps.extend_from_slice(A11Y_STEPS);
        }
        if ai_pending {
            steps.extend_from_slice(AI_STEPS);
        }
        if steps.is_empty() {
            None
        } else {
            Some(Narration::Enrichment(steps))
        }
    }

    pub fn steps(&self) -> &[&'static str] {
        match self {
            Narration::Queued => QUEUED_STEPS,
            Narration::Running => RUNNING_STEPS,
            Narration::Enrichment(steps) => steps,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Announcement {
    pub message: &'static str,
    /// The queued list ran out: the caller should promote the phase to running.
    pub promote_to_running: bool,
}

/// Message to display after `ticks` elapsed intervals of `narration`.
///
/// Lists never loop: queued promotes once exhausted, the others hold on
/// their last entry.
pub fn announce(narration: &Narration, ticks: usize) -> Announcement {
    let steps = narration.steps();
    let Some(last) = steps.len().checked_sub(1) else {
        return Announcement {
            message: "",
            promote_to_running: false,
        };
    };
    Announcement {
        message: steps[ticks.min(last)],
        promote_to_running: matches!(narration, Narration::Queued) && ticks > last,
    }
}

/// Tick counter over the current narration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StepAnnouncer {
    narration: Option<Narration>,
    ticks: usize,
    /// Bumped on every `start`; timers carry it so ticks armed for an
    /// earlier narration are ignored.
    generation: u64,
}

impl StepAnnouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a fresh narration and returns its first message.
    pub fn start(&mut self, narration: Narration) -> &'static str {
        self.ticks = 0;
        self.generation = self.generation.wrapping_add(1);
        let message = announce(&narration, 0).message;
        self.narration = Some(narration);
        message
    }

    pub fn stop(&mut self) {
        self.narration = None;
        self.ticks = 0;
    }

    pub fn narration(&self) -> Option<&Narration> {
        self.narration.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Advances one interval. `None` when no narration is active.
    pub fn tick(&mut self) -> Option<Announcement> {
        let narration = self.narration.as_ref()?;
        self.ticks += 1;
        Some(announce(narration, self.ticks))
    }
}
