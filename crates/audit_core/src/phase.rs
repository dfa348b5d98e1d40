use std::fmt;

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

/// Coarse lifecycle state of a job. The declaration order is the ordering.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Queued,
    Running,
    Finished,
    Error,
}

impl Phase {
    pub fn ordinal(self) -> u8 {
        match self {
            Phase::Queued => 0,
            Phase::Running => 1,
            Phase::Finished => 2,
            Phase::Error => 3,
        }
    }

    /// Missing or unrecognized values map to `Queued`.
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("running") => Phase::Running,
            Some("finished") => Phase::Finished,
            Some("error") => Phase::Error,
            _ => Phase::Queued,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Queued => "queued",
            Phase::Running => "running",
            Phase::Finished => "finished",
            Phase::Error => "error",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire shape of a phase field: a label, or anything else (null, numbers).
#[derive(Deserialize)]
#[serde(untagged)]
enum RawPhase {
    Label(String),
    Other(IgnoredAny),
}

pub(crate) fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Phase, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawPhase::deserialize(deserializer)? {
        RawPhase::Label(label) => Phase::parse_lenient(Some(&label)),
        RawPhase::Other(_) => Phase::Queued,
    })
}

/// Commits a phase only when it does not move backwards.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PhaseTracker {
    committed: Option<Phase>,
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Phase> {
        self.committed
    }

    /// Returns `true` when `proposed` was applied (ordinal >= last committed).
    pub fn propose(&mut self, proposed: Phase) -> bool {
        match self.committed {
            Some(current) if proposed.ordinal() < current.ordinal() => false,
            _ => {
                self.committed = Some(proposed);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Phase, PhaseTracker};

    #[test]
    fn ordering_matches_ordinals() {
        assert!(Phase::Queued < Phase::Running);
        assert!(Phase::Running < Phase::Finished);
        assert!(Phase::Finished < Phase::Error);
        assert_eq!(Phase::Error.ordinal(), 3);
    }

    #[test]
    fn unknown_phase_defaults_to_queued() {
        assert_eq!(Phase::parse_lenient(None), Phase::Queued);
        assert_eq!(Phase::parse_lenient(Some("pending")), Phase::Queued);
        assert_eq!(Phase::parse_lenient(Some(" Running ")), Phase::Running);
    }

    #[test]
    fn tracker_rejects_regression_but_accepts_repeat() {
        let mut tracker = PhaseTracker::new();
        assert!(tracker.propose(Phase::Running));
        assert!(!tracker.propose(Phase::Queued));
        assert!(tracker.propose(Phase::Running));
        assert_eq!(tracker.current(), Some(Phase::Running));
        assert!(tracker.propose(Phase::Error));
        assert!(!tracker.propose(Phase::Finished));
        assert_eq!(tracker.current(), Some(Phase::Error));
    }
}
