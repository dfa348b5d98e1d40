use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use audit_core::{InsightsRequest, Metrics};
use audit_logging::{audit_debug, audit_warn};
use serde::Serialize;
use serde_json::{json, Value};

use crate::cache::ResultCache;
use crate::config::AuditConfig;
use crate::error::{map_json_error, map_reqwest_error};
use crate::ApiError;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const MAX_TOKENS: u32 = 400;
pub const MAX_SUGGESTIONS: usize = 6;

const SYSTEM_PROMPT: &str = "You are a helpful, encouraging web performance consultant. \
Write recommendations in a friendly, conversational tone that makes optimization feel \
approachable and achievable.";

const INSTRUCTIONS: [&str; 6] = [
    "You are a friendly web performance consultant. Given these WebPageTest results, provide 3-5 recommendations.",
    "Write in a casual, supportive but professional tone. Assume the user is moderately technical. Try not to repeat yourself across recommendations.",
    "Do not add superfluous greetings or refer to yourself in the first person.",
    "Focus on the biggest wins: server response time, render-blocking resources, image optimization, third-party scripts, and resource delivery.",
    "Make each recommendation feel approachable and explain the \"why\" briefly. Avoid overly-technical jargon and focus on highest impact points.",
    "Return ONLY a JSON array of strings. No prose, no keys.",
];

/// Text-completion backend for insights.
#[async_trait]
pub trait InsightsProvider: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, ApiError>;
}

pub struct AnthropicProvider {
    url: String,
    api_key: String,
    model: String,
    http: reqwest::Client,
}

impl AnthropicProvider {
    /// `None` when no API key is configured.
    pub fn from_config(config: &AuditConfig) -> Result<Option<Self>, ApiError> {
        let Some(api_key) = config.claude_api_key.clone() else {
            return Ok(None);
        };
        Ok(Some(Self {
            url: config.anthropic_url.clone(),
            api_key,
            model: config.claude_model.clone(),
            http: config.http.build_client()?,
        }))
    }
}

#[async_trait]
impl InsightsProvider for AnthropicProvider {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, ApiError> {
        let body = json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "system": system,
            "messages": [{ "role": "user", "content": prompt }],
        });
        let response = self
            .http
            .post(&self.url)
            .header("content-type", "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .body(serde_json::to_vec(&body).map_err(map_json_error)?)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let text = response.text().await.map_err(map_reqwest_error)?;
        let json: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
        if !status.is_success() {
            let message = json
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("AI request failed");
            audit_warn!("AI provider rejected request status={} message={}", status, message);
            return Err(ApiError::upstream(status.as_u16(), message));
        }

        Ok(json
            .get("content")
            .and_then(Value::as_array)
            .and_then(|blocks| {
                blocks
                    .iter()
                    .find(|block| block.get("type").and_then(Value::as_str) == Some("text"))
            })
            .and_then(|block| block.get("text"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }
}

/// Compact, ordered view of a run used both in the prompt and as a cache
/// signature.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunSummary<'a> {
    url: &'a str,
    title: &'a str,
    ttfb_ms: u64,
    fcp_ms: u64,
    lcp_ms: Option<u64>,
    speed_index_ms: u64,
    requests: u64,
    #[serde(rename = "transferredMB")]
    transferred_mb: f64,
    on_load_ms: u64,
    fully_loaded_ms: u64,
}

fn summarize(request: &InsightsRequest) -> RunSummary<'_> {
    let Metrics {
        ttfb_ms,
        fcp_ms,
        speed_index_ms,
        lcp_ms,
        requests,
        transferred_bytes,
        on_load_ms,
        fully_loaded_ms,
    } = request.metrics;
    RunSummary {
        url: request.site_url.as_deref().unwrap_or_default(),
        title: request.site_title.as_deref().unwrap_or_default(),
        ttfb_ms,
        fcp_ms,
        lcp_ms,
        speed_index_ms,
        requests,
        transferred_mb: (transferred_bytes as f64 / 1024.0 / 1024.0 * 100.0).round() / 100.0,
        on_load_ms,
        fully_loaded_ms,
    }
}

/// `test:{id}` when the job is known, otherwise a signature of the run.
pub fn cache_key(request: &InsightsRequest) -> String {
    match request.test_id.as_deref().filter(|id| !id.trim().is_empty()) {
        Some(id) => format!("test:{id}"),
        None => format!(
            "sig:{}",
            serde_json::to_string(&summarize(request)).unwrap_or_default()
        ),
    }
}

pub fn build_prompt(request: &InsightsRequest) -> String {
    let summary = serde_json::to_string_pretty(&summarize(request)).unwrap_or_default();
    let mut lines: Vec<&str> = INSTRUCTIONS.to_vec();
    lines.push("");
    lines.push(&summary);
    lines.join("\n")
}

/// JSON array of strings, else one suggestion per non-blank line. Leading
/// dashes are stripped, duplicates dropped, at most [`MAX_SUGGESTIONS`] kept.
pub fn parse_suggestions(text: &str) -> Vec<String> {
    let raw: Vec<String> = match serde_json::from_str::<Value>(text.trim()) {
        Ok(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
    };

    let mut seen = HashSet::new();
    raw.iter()
        .map(|s| s.trim_start_matches('-').trim().to_string())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.clone()))
        .take(MAX_SUGGESTIONS)
        .collect()
}

/// Cached insights on top of an optional provider.
pub struct InsightsService {
    provider: Option<Arc<dyn InsightsProvider>>,
    cache: ResultCache<Vec<String>>,
    ttl_seconds: u64,
}

impl InsightsService {
    pub fn new(
        provider: Option<Arc<dyn InsightsProvider>>,
        cache: ResultCache<Vec<String>>,
        ttl_seconds: u64,
    ) -> Self {
        Self {
            provider,
            cache,
            ttl_seconds,
        }
    }

    pub async fn insights(&self, request: &InsightsRequest) -> Result<Vec<String>, ApiError> {
        let Some(provider) = self.provider.clone() else {
            return Err(ApiError::NotConfigured {
                what: "AI".to_string(),
                status: 501,
            });
        };
        let key = cache_key(request);
        let prompt = build_prompt(request);
        audit_debug!("Insights requested key={}", key);
        self.cache
            .with_cache(&key, self.ttl_seconds, move || async move {
                let text = provider.complete(SYSTEM_PROMPT, &prompt).await?;
                Ok(parse_suggestions(&text))
            })
            .await
    }
}
