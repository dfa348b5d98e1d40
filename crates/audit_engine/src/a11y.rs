use std::sync::Arc;

use async_trait::async_trait;
use audit_core::{normalize_url_for_dedupe, A11yReport, A11ySummary, Impact, Violation, ViolationNode};
use audit_logging::{audit_debug, audit_warn};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::cache::ResultCache;
use crate::clock::{utc_timestamp, Timestamp};
use crate::config::AuditConfig;
use crate::error::{map_json_error, map_reqwest_error};
use crate::ApiError;

/// Produces raw axe-style results for a page.
#[async_trait]
pub trait A11yScanner: Send + Sync {
    async fn scan(&self, url: &str, tags: &[String]) -> Result<Value, ApiError>;
}

/// Scanner reached over HTTP: `POST {endpoint}` with `{url, tags}`.
pub struct HttpA11yScanner {
    endpoint: String,
    http: reqwest::Client,
}

impl HttpA11yScanner {
    pub fn from_config(config: &AuditConfig) -> Result<Option<Self>, ApiError> {
        let Some(endpoint) = config.a11y_scanner_url.clone() else {
            return Ok(None);
        };
        Ok(Some(Self {
            endpoint,
            http: config.http.build_client()?,
        }))
    }
}

#[async_trait]
impl A11yScanner for HttpA11yScanner {
    async fn scan(&self, url: &str, tags: &[String]) -> Result<Value, ApiError> {
        let body = json!({ "url": url, "tags": tags });
        let response = self
            .http
            .post(&self.endpoint)
            .header("content-type", "application/json")
            .body(serde_json::to_vec(&body).map_err(map_json_error)?)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status();
        let text = response.text().await.map_err(map_reqwest_error)?;
        if !status.is_success() {
            audit_warn!("Accessibility scanner failed status={}", status);
            return Err(ApiError::upstream(500, "a11y scan failed"));
        }
        serde_json::from_str(&text).map_err(map_json_error)
    }
}

/// Unwraps tool-style envelopes (`content[0]` of type `json` or `text`).
fn unwrap_payload(raw: &Value) -> Result<Value, ApiError> {
    let first = raw
        .get("content")
        .and_then(Value::as_array)
        .and_then(|blocks| blocks.first());
    let inner = match first.and_then(|block| block.get("type")).and_then(Value::as_str) {
        Some("json") => first.and_then(|block| block.get("json")).unwrap_or(raw),
        Some("text") => first.and_then(|block| block.get("text")).unwrap_or(raw),
        _ => raw,
    };
    match inner {
        Value::String(text) => serde_json::from_str(text).map_err(map_json_error),
        other => Ok(other.clone()),
    }
}

fn count(data: &Value, name: &str) -> u64 {
    data.pointer(&format!("/counts/{name}"))
        .and_then(Value::as_u64)
        .or_else(|| data.get(name).and_then(Value::as_array).map(|v| v.len() as u64))
        .unwrap_or(0)
}

fn string(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn violation(raw: &Value) -> Violation {
    let description = string(raw.get("description"));
    Violation {
        id: raw
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        impact: raw.get("impact").and_then(Value::as_str).and_then(Impact::parse),
        help: string(raw.get("help"))
            .or_else(|| description.clone())
            .unwrap_or_else(|| "Issue".to_string()),
        description,
        help_url: string(raw.get("helpUrl")),
        nodes: raw
            .get("nodes")
            .and_then(Value::as_array)
            .map(|nodes| {
                nodes
                    .iter()
                    .map(|node| ViolationNode {
                        html: string(node.get("html")),
                        target: node
                            .get("target")
                            .and_then(Value::as_array)
                            .map(|t| t.iter().filter_map(Value::as_str).map(str::to_string).collect())
                            .unwrap_or_default(),
                        failure_summary: string(node.get("failureSummary")),
                    })
                    .collect()
            })
            .unwrap_or_default(),
    }
}

/// Maps raw scanner output (object or JSON text) to a report.
pub fn normalize_axe_result(
    url: &str,
    raw: &Value,
    generated_at: String,
) -> Result<A11yReport, ApiError> {
    let data = unwrap_payload(raw)?;
    Ok(A11yReport {
        url: url.to_string(),
        summary: A11ySummary {
            violations: count(&data, "violations"),
            passes: count(&data, "passes"),
            incomplete: count(&data, "incomplete"),
            inapplicable: count(&data, "inapplicable"),
        },
        violations: data
            .get("violations")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(violation).collect())
            .unwrap_or_default(),
        generated_at,
    })
}

/// `a11y:` + SHA-256 of the normalized URL and tag list.
pub fn cache_key(url: &str, tags: &[String]) -> String {
    let identity = json!({ "url": normalize_url_for_dedupe(url), "tags": tags });
    let digest = Sha256::digest(identity.to_string().as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("a11y:{hex}")
}

pub struct A11yService {
    scanner: Option<Arc<dyn A11yScanner>>,
    cache: ResultCache<A11yReport>,
    ttl_seconds: u64,
    timestamp: Timestamp,
}

impl A11yService {
    pub fn new(
        scanner: Option<Arc<dyn A11yScanner>>,
        cache: ResultCache<A11yReport>,
        ttl_seconds: u64,
    ) -> Self {
        Self {
            scanner,
            cache,
            ttl_seconds,
            timestamp: utc_timestamp(),
        }
    }

    pub async fn scan(&self, url: &str, tags: &[String]) -> Result<A11yReport, ApiError> {
        let Some(scanner) = self.scanner.clone() else {
            return Err(ApiError::NotConfigured {
                what: "Accessibility scanner".to_string(),
                status: 501,
            });
        };
        let key = cache_key(url, tags);
        audit_debug!("Accessibility scan requested url={} key={}", url, key);

        let url = url.to_string();
        let tags = tags.to_vec();
        let timestamp = Arc::clone(&self.timestamp);
        self.cache
            .with_cache(&key, self.ttl_seconds, move || async move {
                let raw = scanner.scan(&url, &tags).await?;
                normalize_axe_result(&url, &raw, timestamp())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::{cache_key, normalize_axe_result};
    use audit_core::Impact;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn counts_fall_back_to_array_lengths() {
        let raw = json!({
            "counts": { "passes": 40 },
            "violations": [{
                "id": "image-alt",
                "impact": "critical",
                "description": "Images need alt text",
                "nodes": [{ "html": "<img>", "target": ["img"], "failureSummary": "Fix" }]
            }],
            "incomplete": [{}, {}],
        });
        let report = normalize_axe_result("https://a.test", &raw, "t".into()).unwrap();
        assert_eq!(report.summary.violations, 1);
        assert_eq!(report.summary.passes, 40);
        assert_eq!(report.summary.incomplete, 2);
        assert_eq!(report.summary.inapplicable, 0);
        let v = &report.violations[0];
        assert_eq!(v.impact, Some(Impact::Critical));
        assert_eq!(v.help, "Images need alt text");
        assert_eq!(v.nodes[0].target, vec!["img".to_string()]);
    }

    #[test]
    fn text_envelope_is_parsed() {
        let raw = json!({
            "content": [{ "type": "text", "text": "{\"violations\":[{\"id\":\"x\"}]}" }]
        });
        let report = normalize_axe_result("https://a.test", &raw, "t".into()).unwrap();
        assert_eq!(report.violations[0].help, "Issue");
        assert_eq!(report.violations[0].impact, None);
    }

    #[test]
    fn invalid_text_payload_is_an_error() {
        let raw = json!("not json");
        assert!(normalize_axe_result("https://a.test", &raw, "t".into()).is_err());
    }

    #[test]
    fn cache_key_ignores_trivial_url_differences() {
        let tags = vec!["wcag2aa".to_string()];
        assert_eq!(
            cache_key("https://Example.com/", &tags),
            cache_key("https://example.com", &tags)
        );
        assert_ne!(cache_key("https://example.com", &tags), cache_key("https://example.com", &[]));
    }
}
