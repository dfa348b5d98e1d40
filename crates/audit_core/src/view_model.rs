use std::time::SystemTime;

use crate::{A11yReport, EnrichmentState, Metrics, Phase, SiteInfo};

/// Metrics plus the site metadata they belong to. Only present once revealed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportData {
    pub metrics: Metrics,
    pub site: SiteInfo,
}

/// Everything the rendering layer consumes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuditViewModel {
    pub job_id: Option<String>,
    pub phase: Option<Phase>,
    /// Rotating narration, falling back to the raw server status.
    pub status_text: String,
    pub loading: bool,
    pub error: Option<String>,
    pub data: Option<ReportData>,
    pub is_historical: bool,
    pub started_at: Option<SystemTime>,
    pub ai: EnrichmentState<Vec<String>>,
    pub a11y: EnrichmentState<A11yReport>,
    pub recommendations: Vec<String>,
    /// URL to resubmit after a terminal failure, when known.
    pub retry_url: Option<String>,
}
