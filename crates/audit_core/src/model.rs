use serde::{Deserialize, Serialize};

/// Timing and size facts about one page load (first view).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub ttfb_ms: u64,
    pub fcp_ms: u64,
    pub speed_index_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lcp_ms: Option<u64>,
    pub requests: u64,
    pub transferred_bytes: u64,
    #[serde(default)]
    pub on_load_ms: u64,
    #[serde(default)]
    pub fully_loaded_ms: u64,
}

/// Metadata about the tested site as reported by the test runner.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_url: Option<String>,
}

impl SiteInfo {
    /// Overlays every field present in `other`; absent fields keep their value.
    pub fn merge(&mut self, other: &SiteInfo) {
        fn overlay(slot: &mut Option<String>, incoming: &Option<String>) {
            if let Some(value) = incoming.as_ref().filter(|v| !v.is_empty()) {
                *slot = Some(value.clone());
            }
        }
        overlay(&mut self.site_url, &other.site_url);
        overlay(&mut self.site_title, &other.site_title);
        overlay(&mut self.run_at, &other.run_at);
        overlay(&mut self.summary_url, &other.summary_url);
        overlay(&mut self.json_url, &other.json_url);
    }
}

/// One status response, folded into state and then discarded.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    #[serde(default, deserialize_with = "crate::phase::deserialize_lenient")]
    pub phase: crate::Phase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Metrics>,
    #[serde(flatten)]
    pub site: SiteInfo,
}

impl StatusSnapshot {
    pub fn new(phase: crate::Phase) -> Self {
        Self {
            phase,
            ..Self::default()
        }
    }

    /// Metrics are only trusted on a finished snapshot.
    pub fn trusted_metrics(&self) -> Option<&Metrics> {
        match self.phase {
            crate::Phase::Finished => self.metrics.as_ref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Minor,
    Moderate,
    Serious,
    Critical,
}

impl Impact {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "minor" => Some(Self::Minor),
            "moderate" => Some(Self::Moderate),
            "serious" => Some(Self::Serious),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(default)]
    pub target: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<Impact>,
    pub help: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_url: Option<String>,
    #[serde(default)]
    pub nodes: Vec<ViolationNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct A11ySummary {
    pub violations: u64,
    pub passes: u64,
    pub incomplete: u64,
    pub inapplicable: u64,
}

/// Accessibility scan result, keyed by normalized URL rather than job id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct A11yReport {
    pub url: String,
    pub summary: A11ySummary,
    pub violations: Vec<Violation>,
    pub generated_at: String,
}

/// Entry of the per-session "recent tests" list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentTest {
    pub test_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_at: Option<String>,
}

/// Payload sent to the AI insights endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightsRequest {
    pub metrics: Metrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_id: Option<String>,
}
