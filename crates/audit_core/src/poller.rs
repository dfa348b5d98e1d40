use std::time::Duration;

pub const INITIAL_POLL_INTERVAL: Duration = Duration::from_millis(2000);
pub const POLL_STEP: Duration = Duration::from_millis(1000);
pub const MAX_POLL_INTERVAL: Duration = Duration::from_millis(6000);

/// Linear backoff between status polls: `min(previous + 1s, 6s)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollBackoff {
    previous: Duration,
}

impl Default for PollBackoff {
    fn default() -> Self {
        Self {
            previous: INITIAL_POLL_INTERVAL,
        }
    }
}

impl PollBackoff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_delay(&mut self) -> Duration {
        let next = (self.previous + POLL_STEP).min(MAX_POLL_INTERVAL);
        self.previous = next;
        next
    }
}
