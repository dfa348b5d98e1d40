use std::sync::Arc;

use async_trait::async_trait;
use audit_core::{clean_job_id, is_http_url, A11yReport, InsightsRequest, RecentTest, StatusSnapshot};
use audit_logging::{audit_info, audit_warn};

use crate::a11y::{A11yScanner, A11yService, HttpA11yScanner};
use crate::cache::ResultCache;
use crate::config::{AuditConfig, LocationPreset};
use crate::insights::{AnthropicProvider, InsightsProvider, InsightsService};
use crate::persist::KeyValueStore;
use crate::rate_limit::SubmissionGate;
use crate::session::{SessionBackend, SessionStore};
use crate::wpt::{Submission, WptClient};
use crate::ApiError;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunTestRequest {
    pub url: String,
    pub location: Option<LocationPreset>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct A11yScanRequest {
    pub url: String,
    pub tags: Vec<String>,
}

/// Rate-limit key for a caller: first `X-Forwarded-For` hop, else the peer.
pub fn client_key(forwarded_for: Option<&str>, peer: Option<&str>) -> String {
    forwarded_for
        .and_then(|header| header.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .or_else(|| peer.map(str::trim).filter(|p| !p.is_empty()))
        .unwrap_or("unknown")
        .to_string()
}

/// Server-side composition root: owns the gate, caches and upstream clients
/// and answers the handler contracts.
pub struct AuditService {
    gate: SubmissionGate,
    wpt: WptClient,
    insights: InsightsService,
    a11y: A11yService,
    sessions: SessionStore,
}

impl AuditService {
    pub fn new(config: &AuditConfig, session_store: Arc<dyn KeyValueStore>) -> Result<Self, ApiError> {
        let provider = AnthropicProvider::from_config(config)?
            .map(|p| Arc::new(p) as Arc<dyn InsightsProvider>);
        let scanner = HttpA11yScanner::from_config(config)?
            .map(|s| Arc::new(s) as Arc<dyn A11yScanner>);
        Ok(Self {
            gate: SubmissionGate::new(config.rate_limit),
            wpt: WptClient::new(config)?,
            insights: InsightsService::new(provider, ResultCache::new(), config.cache_ttl_seconds),
            a11y: A11yService::new(scanner, ResultCache::new(), config.cache_ttl_seconds),
            sessions: SessionStore::new(session_store),
        })
    }

    /// Replaces the default gate, e.g. with one on a manual clock.
    pub fn with_gate(mut self, gate: SubmissionGate) -> Self {
        self.gate = gate;
        self
    }

    pub async fn run_test(&self, client_key: &str, request: RunTestRequest) -> Result<Submission, ApiError> {
        let url = request.url.trim();
        if !is_http_url(url) {
            return Err(ApiError::invalid("Invalid url"));
        }
        if !self.gate.check(client_key) {
            return Err(ApiError::RateLimited);
        }
        let submission = self
            .wpt
            .submit(url, request.location.unwrap_or_default())
            .await?;
        audit_info!("Test accepted id={} url={}", submission.test_id, url);
        Ok(submission)
    }

    pub async fn check_status(&self, job_id: Option<&str>) -> Result<StatusSnapshot, ApiError> {
        let Some(job_id) = clean_job_id(job_id) else {
            return Err(ApiError::invalid("Missing testId"));
        };
        self.wpt.status(job_id).await
    }

    pub async fn ai_insights(&self, request: &InsightsRequest) -> Result<Vec<String>, ApiError> {
        self.insights.insights(request).await.inspect_err(|err| {
            audit_warn!("AI insights failed status={} error={}", err.status_code(), err)
        })
    }

    pub async fn a11y_scan(&self, request: &A11yScanRequest) -> Result<A11yReport, ApiError> {
        let url = request.url.trim();
        if !is_http_url(url) {
            return Err(ApiError::invalid("Invalid url"));
        }
        self.a11y.scan(url, &request.tags).await.inspect_err(|err| {
            audit_warn!("Accessibility scan failed url={} error={}", url, err)
        })
    }

    pub async fn recent_tests(&self, session_id: &str) -> Result<Vec<RecentTest>, ApiError> {
        self.sessions.recent_tests(session_id).await
    }

    pub async fn add_recent_test(&self, session_id: &str, entry: RecentTest) -> Result<(), ApiError> {
        self.sessions.add_recent_test(session_id, entry).await
    }

    pub async fn ai_preference(&self, session_id: &str, test_id: &str) -> Result<Option<bool>, ApiError> {
        self.sessions.ai_preference(session_id, test_id).await
    }

    pub async fn set_ai_preference(
        &self,
        session_id: &str,
        test_id: &str,
        use_ai: bool,
    ) -> Result<(), ApiError> {
        self.sessions.set_ai_preference(session_id, test_id, use_ai).await
    }
}

#[async_trait]
impl SessionBackend for AuditService {
    async fn recent_tests(&self, session_id: &str) -> Result<Vec<RecentTest>, ApiError> {
        AuditService::recent_tests(self, session_id).await
    }

    async fn add_recent_test(&self, session_id: &str, entry: RecentTest) -> Result<(), ApiError> {
        AuditService::add_recent_test(self, session_id, entry).await
    }

    async fn ai_preference(&self, session_id: &str, test_id: &str) -> Result<Option<bool>, ApiError> {
        AuditService::ai_preference(self, session_id, test_id).await
    }

    async fn set_ai_preference(
        &self,
        session_id: &str,
        test_id: &str,
        use_ai: bool,
    ) -> Result<(), ApiError> {
        AuditService::set_ai_preference(self, session_id, test_id, use_ai).await
    }
}

#[cfg(test)]
mod tests {
    use super::client_key;

    #[test]
    fn client_key_prefers_first_forwarded_hop() {
        assert_eq!(client_key(Some(" 10.0.0.1 , 10.0.0.2"), Some("127.0.0.1")), "10.0.0.1");
        assert_eq!(client_key(Some(""), Some("127.0.0.1")), "127.0.0.1");
        assert_eq!(client_key(None, None), "unknown");
    }
}
