use async_trait::async_trait;
use audit_core::{A11yReport, InsightsRequest, StatusSnapshot};

use crate::service::{A11yScanRequest, AuditService};
use crate::ApiError;

/// Where job status comes from.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn check_status(&self, job_id: &str) -> Result<StatusSnapshot, ApiError>;
}

#[async_trait]
pub trait InsightsSource: Send + Sync {
    async fn insights(&self, request: &InsightsRequest) -> Result<Vec<String>, ApiError>;
}

#[async_trait]
pub trait A11ySource: Send + Sync {
    async fn scan(&self, url: &str) -> Result<A11yReport, ApiError>;
}

#[async_trait]
impl StatusSource for AuditService {
    async fn check_status(&self, job_id: &str) -> Result<StatusSnapshot, ApiError> {
        AuditService::check_status(self, Some(job_id)).await
    }
}

#[async_trait]
impl InsightsSource for AuditService {
    async fn insights(&self, request: &InsightsRequest) -> Result<Vec<String>, ApiError> {
        self.ai_insights(request).await
    }
}

#[async_trait]
impl A11ySource for AuditService {
    async fn scan(&self, url: &str) -> Result<A11yReport, ApiError> {
        self.a11y_scan(&A11yScanRequest {
            url: url.to_string(),
            tags: Vec::new(),
        })
        .await
    }
}
