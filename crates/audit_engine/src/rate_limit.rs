use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use audit_logging::audit_warn;

use crate::clock::{system_clock, Clock};
use crate::config::RateLimitConfig;

/// Sliding-window limiter guarding job creation, one window per caller key.
///
/// Denied attempts are recorded too, so hammering the endpoint keeps the
/// caller locked out.
pub struct SubmissionGate {
    config: RateLimitConfig,
    hits: Mutex<HashMap<String, VecDeque<u64>>>,
    now_ms: Clock,
}

impl SubmissionGate {
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_clock(config, system_clock())
    }

    pub fn with_clock(config: RateLimitConfig, now_ms: Clock) -> Self {
        Self {
            config,
            hits: Mutex::new(HashMap::new()),
            now_ms,
        }
    }

    /// Records an attempt for `key` and returns whether it is allowed.
    pub fn check(&self, key: &str) -> bool {
        let now = (self.now_ms)();
        let window_start = now.saturating_sub(self.config.window.as_millis() as u64);

        let mut hits = self.hits.lock().expect("lock submission gate");
        let recent = hits.entry(key.to_string()).or_default();
        while recent.front().is_some_and(|&at| at <= window_start) {
            recent.pop_front();
        }
        recent.push_back(now);

        let allowed = recent.len() <= self.config.max;
        if !allowed {
            audit_warn!(
                "Submission denied key={} attempts_in_window={} max={}",
                key,
                recent.len(),
                self.config.max
            );
        }
        allowed
    }
}
